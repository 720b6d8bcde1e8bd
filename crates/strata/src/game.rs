//! # Game Context
//!
//! The value every system receives: world, scheduler, event bus, loop
//! timing and a handle to stop the loop. Nothing is global.

use strata_core::World;

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::EventBus;
use crate::game_loop::{GameTime, LoopControl};
use crate::system::SystemScheduler;

/// Everything a system can touch.
///
/// # Example
///
/// ```rust
/// use strata::{EngineConfig, Game, Phase, SystemMeta};
///
/// let mut game = Game::new(&EngineConfig::default());
/// game.systems.register_fn("spawn", |_: &SystemMeta, game: &mut Game| {
///     game.world.create();
///     Ok(())
/// });
/// game.systems.append_to_group(Phase::Work.as_str(), "spawn").unwrap();
///
/// game.update_group(Phase::Work.as_str()).unwrap();
/// assert_eq!(game.world.alive_count(), 1);
/// ```
#[derive(Debug)]
pub struct Game {
    /// Entities, components and tags.
    pub world: World,
    /// Systems and groups.
    pub systems: SystemScheduler<Game>,
    /// Event bus.
    pub events: EventBus,
    time: GameTime,
    control: LoopControl,
}

impl Game {
    /// Creates an empty game.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            world: World::new(),
            systems: SystemScheduler::new(),
            events: EventBus::new(config.event_buffer_capacity),
            time: GameTime::default(),
            control: LoopControl::new(),
        }
    }

    /// Dispatches `group` against this game.
    ///
    /// The group is snapshotted first, so systems may edit the scheduler
    /// while it runs. An unknown group is a no-op.
    ///
    /// # Errors
    ///
    /// The first failure of a system in the group.
    pub fn update_group(&mut self, group: &str) -> EngineResult<()> {
        match self.systems.snapshot_group(group) {
            Some(snapshot) => snapshot.dispatch(self),
            None => Ok(()),
        }
    }

    /// Loop timing as of the current phase.
    #[must_use]
    pub fn time(&self) -> &GameTime {
        &self.time
    }

    pub(crate) fn time_mut(&mut self) -> &mut GameTime {
        &mut self.time
    }

    /// Handle to the loop driving this game.
    #[must_use]
    pub fn control(&self) -> &LoopControl {
        &self.control
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}
