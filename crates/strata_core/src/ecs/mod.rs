//! # Entity Component System
//!
//! Storage side of the engine.
//!
//! ## Design Philosophy
//!
//! - Entities are generational indices, never pointers
//! - Components live in per-type sparse sets with dense iteration
//! - Every "which entities have X" question is answered by a bitmask
//! - Reads on dead entities return nothing instead of failing

mod bundle;
mod component;
mod entity;
mod entity_manager;
pub mod filter;
mod registry;
mod snapshot;
mod storage;
mod tags;
mod world;

pub use bundle::Bundle;
pub use component::Component;
pub use entity::Entity;
pub use entity_manager::EntityManager;
pub use filter::EntityFilter;
pub use registry::ComponentRegistry;
pub use snapshot::EntityManagerSnapshot;
pub use storage::{ComponentPool, ErasedPool, PoolCursor};
pub use tags::TagRegistry;
pub use world::World;
