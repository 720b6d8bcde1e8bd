//! # STRATA Core
//!
//! Storage kernel of the STRATA entity component system:
//! - Generational entity handles with ascending index reuse
//! - Sparse-set component pools with dense iteration
//! - String tags and singleton tags
//! - Bitmask filters answering multi-attribute queries in O(words)
//!
//! ## Architecture Rules
//!
//! 1. **One writer** - a single simulation thread owns a [`World`]
//! 2. **Fail quiet on reads** - dead or unknown entities read as absent
//! 3. **Fail loud on invalidated iteration** - a cursor over a pool that
//!    changed shape returns [`CoreError::ConcurrentModification`]
//!
//! ## Example
//!
//! ```rust
//! use strata_core::{Component, EntityFilter, World};
//!
//! #[derive(Debug, PartialEq)]
//! struct Velocity(f32);
//! impl Component for Velocity {}
//!
//! let mut world = World::new();
//! let e = world.create_with((Velocity(2.0),));
//! assert_eq!(world.select(&EntityFilter::new().all::<Velocity>()), vec![e]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bits;
pub mod ecs;
pub mod error;

pub use bits::Bits;
pub use ecs::{
    Bundle, Component, ComponentPool, ComponentRegistry, Entity, EntityFilter, EntityManager,
    EntityManagerSnapshot, ErasedPool, PoolCursor, TagRegistry, World,
};
pub use error::{CoreError, CoreResult};
