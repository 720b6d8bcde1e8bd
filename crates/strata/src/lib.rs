//! # STRATA
//!
//! Runtime built on the `strata_core` ECS: named system groups, a
//! double-buffered event bus and a fixed-timestep game loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                GameLoop                                 │
//! │          INIT ─> ( INPUT ─> WORK x N ─> OUTPUT )* ─> SHUTDOWN           │
//! │                                  │                                      │
//! │                                  v                                      │
//! │  ┌───────────────────────────── Game ───────────────────────────────┐   │
//! │  │                                                                  │   │
//! │  │  ┌──────────────┐   ┌──────────────────┐   ┌─────────────────┐   │   │
//! │  │  │ World        │   │ SystemScheduler  │   │ EventBus        │   │   │
//! │  │  │  • entities  │   │  • systems       │   │  • consumers    │   │   │
//! │  │  │  • pools     │   │  • groups        │   │  • singletons   │   │   │
//! │  │  │  • tags      │   │                  │   │  • async buffer │   │   │
//! │  │  └──────────────┘   └──────────────────┘   └─────────────────┘   │   │
//! │  │                                                                  │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML engine configuration
//! - `events`: Event bus and ring buffers
//! - `game`: The context handed to systems
//! - `game_loop`: Phases, timing and crash recovery
//! - `system`: Systems and the group scheduler

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod game_loop;
pub mod system;

pub use strata_core as core;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, SystemError, SystemResult};
pub use events::{Event, EventBus, EventConsumer, EventPublisher, OverflowPolicy, RingBuffer};
pub use game::Game;
pub use game_loop::{
    Clock, CrashHandler, GameLoop, GameTime, LoopControl, LoopFailure, LoopSettings, LoopState,
    ManualClock, Phase, SystemClock, UNHANDLED_FAILURE,
};
pub use system::{GroupSnapshot, System, SystemMeta, SystemScheduler};
