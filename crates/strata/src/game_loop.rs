//! # STRATA Game Loop
//!
//! Fixed-timestep driver over named scheduler groups:
//! ```text
//! Session:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ flush events, INIT                                                  │
//! │                                                                     │
//! │ while state == Run:                                                 │
//! │   ├─ flush events                                                   │
//! │   ├─ INPUT                                                          │
//! │   ├─ WORK  x min(lag / interval, max_frame_skip)                    │
//! │   ├─ OUTPUT                                                         │
//! │   └─ lag += wall time of this iteration                             │
//! │                                                                     │
//! │ SHUTDOWN                                                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failure or panic in any phase ends the session: the failure is stored
//! as the `UNHANDLED_FAILURE` singleton event, handed to the crash handler,
//! the CRASH group runs, and the loop settles in [`LoopState::Stop`].

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::events::{Event, EventPublisher};
use crate::game::Game;

/// Upper bound for [`LoopSettings::updates_per_second`].
pub const MAX_UPDATES_PER_SECOND: u32 = 1000;

/// Name of the singleton event holding the last loop failure.
pub const UNHANDLED_FAILURE: &str = "UNHANDLED_FAILURE";

const LOOP_THREAD_NAME: &str = "strata-game-loop";

// =============================================================================
// Phases and settings
// =============================================================================

/// Scheduler groups dispatched by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Once, at session start.
    Init,
    /// Once per iteration, before WORK.
    Input,
    /// Once per fixed update interval of accumulated lag.
    Work,
    /// Once per iteration, after WORK.
    Output,
    /// Once, when the session ends normally.
    Shutdown,
    /// Once, after a failure.
    Crash,
}

impl Phase {
    /// Group name dispatched for this phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Input => "INPUT",
            Self::Work => "WORK",
            Self::Output => "OUTPUT",
            Self::Shutdown => "SHUTDOWN",
            Self::Crash => "CRASH",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated loop rate settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopSettings {
    updates_per_second: u32,
    max_frame_skip: u32,
}

impl LoopSettings {
    /// Creates loop settings.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidLoopSettings`] unless
    /// `0 < updates_per_second <= 1000` and `max_frame_skip >= 1`.
    pub fn new(updates_per_second: u32, max_frame_skip: u32) -> EngineResult<Self> {
        if updates_per_second == 0 || updates_per_second > MAX_UPDATES_PER_SECOND {
            return Err(EngineError::InvalidLoopSettings(format!(
                "updates_per_second must be in 1..={MAX_UPDATES_PER_SECOND}, \
                 got {updates_per_second}"
            )));
        }
        if max_frame_skip == 0 {
            return Err(EngineError::InvalidLoopSettings(
                "max_frame_skip must be at least 1".into(),
            ));
        }
        Ok(Self {
            updates_per_second,
            max_frame_skip,
        })
    }

    /// Fixed WORK updates per second.
    #[must_use]
    pub const fn updates_per_second(&self) -> u32 {
        self.updates_per_second
    }

    /// Maximum WORK updates per iteration.
    #[must_use]
    pub const fn max_frame_skip(&self) -> u32 {
        self.max_frame_skip
    }

    /// Duration of one fixed update.
    #[must_use]
    pub fn update_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.updates_per_second))
    }
}

// =============================================================================
// State and control
// =============================================================================

/// Loop lifecycle: `Stop -> Run -> Shutdown -> Stop`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LoopState {
    /// No session running.
    Stop = 0,
    /// Session iterating.
    Run = 1,
    /// Session tearing down.
    Shutdown = 2,
}

impl LoopState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Run,
            2 => Self::Shutdown,
            _ => Self::Stop,
        }
    }
}

/// Cloneable handle to a loop's state, usable from systems and other
/// threads.
#[derive(Clone)]
pub struct LoopControl {
    state: Arc<AtomicU8>,
}

impl LoopControl {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(LoopState::Stop as u8)),
        }
    }

    /// Requests a cooperative shutdown. Only a running loop moves to
    /// [`LoopState::Shutdown`]; returns whether it did.
    ///
    /// The request is observed at the next iteration boundary.
    pub fn stop(&self) -> bool {
        self.transition(LoopState::Run, LoopState::Shutdown)
    }

    /// Current loop state.
    #[must_use]
    pub fn current_state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn begin(&self) -> bool {
        self.transition(LoopState::Stop, LoopState::Run)
    }

    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl fmt::Debug for LoopControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopControl")
            .field("state", &self.current_state())
            .finish()
    }
}

// =============================================================================
// Time
// =============================================================================

/// Monotonic time source, measured from an arbitrary origin.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Sets the clock to `to`.
    pub fn set(&self, to: Duration) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

/// Timing snapshot exposed to systems through [`Game::time`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameTime {
    /// Length of one fixed update.
    pub update_interval: Duration,
    /// Wall time of the last completed iteration.
    pub elapsed_frame: Duration,
    /// Wall time of all completed iterations this session.
    pub total_elapsed: Duration,
    /// Lag not yet consumed by WORK updates.
    pub lag: Duration,
    /// Completed iterations this session.
    pub frames: u64,
    /// WORK updates run this session.
    pub work_updates: u64,
    /// WORK updates run in the current iteration.
    pub frame_work_updates: u32,
}

impl GameTime {
    fn new(update_interval: Duration) -> Self {
        Self {
            update_interval,
            lag: update_interval,
            ..Self::default()
        }
    }
}

// =============================================================================
// Failures
// =============================================================================

/// Failure that ended a loop session.
#[derive(Error, Debug)]
pub enum LoopFailure {
    /// A system returned an error.
    #[error("{phase} phase failed: {source}")]
    System {
        /// Phase being dispatched.
        phase: Phase,
        /// Error raised by the scheduler.
        #[source]
        source: EngineError,
    },

    /// A system panicked.
    #[error("{phase} phase panicked: {message}")]
    Panic {
        /// Phase being dispatched.
        phase: Phase,
        /// Panic message.
        message: String,
    },
}

impl LoopFailure {
    /// Phase in which the failure happened.
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::System { phase, .. } | Self::Panic { phase, .. } => *phase,
        }
    }
}

/// Callback receiving a session's failure, the timing at that moment and
/// the game.
pub type CrashHandler = Box<dyn FnMut(&LoopFailure, &GameTime, &mut Game) + Send>;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// =============================================================================
// Game loop
// =============================================================================

/// Fixed-timestep loop driving a [`Game`].
///
/// The game sits behind a mutex that the loop thread holds for a whole
/// session. Talk to a running loop through [`GameLoop::control`] and
/// [`GameLoop::publisher`]; locking [`GameLoop::game`] blocks until the
/// session ends.
pub struct GameLoop {
    settings: LoopSettings,
    game: Arc<Mutex<Game>>,
    control: LoopControl,
    publisher: EventPublisher,
    clock: Arc<dyn Clock>,
    crash_handler: Arc<Mutex<CrashHandler>>,
    worker: Option<JoinHandle<()>>,
}

impl GameLoop {
    /// Creates a loop from a validated configuration.
    ///
    /// # Errors
    ///
    /// Any error of [`EngineConfig::validate`].
    pub fn new(config: &EngineConfig, game: Game) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self::with_settings(config.loop_settings()?, game))
    }

    /// Creates a loop from explicit settings, with the system clock and a
    /// crash handler that logs the failure.
    #[must_use]
    pub fn with_settings(settings: LoopSettings, game: Game) -> Self {
        let default_handler: CrashHandler =
            Box::new(|failure: &LoopFailure, time: &GameTime, _: &mut Game| {
                tracing::error!(%failure, frames = time.frames, "unhandled game loop failure");
            });
        Self {
            settings,
            control: game.control().clone(),
            publisher: game.events.publisher(),
            game: Arc::new(Mutex::new(game)),
            clock: Arc::new(SystemClock::new()),
            crash_handler: Arc::new(Mutex::new(default_handler)),
            worker: None,
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock<K: Clock + 'static>(mut self, clock: K) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the crash handler.
    #[must_use]
    pub fn with_crash_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&LoopFailure, &GameTime, &mut Game) + Send + 'static,
    {
        self.crash_handler = Arc::new(Mutex::new(Box::new(handler)));
        self
    }

    /// Loop rate settings.
    #[must_use]
    pub fn settings(&self) -> LoopSettings {
        self.settings
    }

    /// Shared game. Blocks while a session runs.
    #[must_use]
    pub fn game(&self) -> Arc<Mutex<Game>> {
        Arc::clone(&self.game)
    }

    /// State handle.
    #[must_use]
    pub fn control(&self) -> &LoopControl {
        &self.control
    }

    /// Thread-safe event publisher for the game's bus.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        self.publisher.clone()
    }

    /// Current loop state.
    #[must_use]
    pub fn current_state(&self) -> LoopState {
        self.control.current_state()
    }

    /// Requests a cooperative shutdown. See [`LoopControl::stop`].
    pub fn stop(&self) -> bool {
        self.control.stop()
    }

    /// Runs a whole session on the calling thread.
    ///
    /// Returns `false` without running if the loop was not stopped.
    pub fn run_blocking(&self) -> bool {
        if !self.control.begin() {
            return false;
        }
        self.session().run();
        true
    }

    /// Runs a session on a dedicated thread.
    ///
    /// Returns `Ok(false)` without starting if the loop was not stopped.
    ///
    /// # Errors
    ///
    /// [`EngineError::ThreadSpawn`] if the thread could not be created; the
    /// loop stays stopped.
    pub fn start(&mut self) -> EngineResult<bool> {
        if !self.control.begin() {
            return Ok(false);
        }
        self.join();

        let session = self.session();
        let spawned = thread::Builder::new()
            .name(LOOP_THREAD_NAME.into())
            .spawn(move || session.run());
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(true)
            }
            Err(err) => {
                self.control.set(LoopState::Stop);
                Err(err.into())
            }
        }
    }

    /// Waits for the session thread started by [`GameLoop::start`].
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("game loop thread terminated abnormally");
            }
        }
    }

    fn session(&self) -> Session {
        Session {
            settings: self.settings,
            game: Arc::clone(&self.game),
            control: self.control.clone(),
            clock: Arc::clone(&self.clock),
            crash_handler: Arc::clone(&self.crash_handler),
        }
    }
}

impl Drop for GameLoop {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.control.stop();
            self.join();
        }
    }
}

impl fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameLoop")
            .field("settings", &self.settings)
            .field("state", &self.current_state())
            .field("threaded", &self.worker.is_some())
            .finish_non_exhaustive()
    }
}

struct Session {
    settings: LoopSettings,
    game: Arc<Mutex<Game>>,
    control: LoopControl,
    clock: Arc<dyn Clock>,
    crash_handler: Arc<Mutex<CrashHandler>>,
}

impl Session {
    fn run(self) {
        let mut game = self.game.lock();
        *game.time_mut() = GameTime::new(self.settings.update_interval());
        tracing::info!(
            updates_per_second = self.settings.updates_per_second(),
            max_frame_skip = self.settings.max_frame_skip(),
            "game loop started"
        );

        let mut phase = Phase::Init;
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| self.run_phases(&mut game, &mut phase)));
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(LoopFailure::System { phase, source }),
            Err(payload) => Some(LoopFailure::Panic {
                phase,
                message: panic_message(payload.as_ref()),
            }),
        };
        if let Some(failure) = failure {
            self.recover(&mut game, failure);
        }

        self.control.set(LoopState::Stop);
        tracing::info!(frames = game.time().frames, "game loop stopped");
    }

    fn run_phases(&self, game: &mut Game, phase: &mut Phase) -> EngineResult<()> {
        let interval = self.settings.update_interval();
        let max_frame_skip = self.settings.max_frame_skip();

        game.events.flush();
        dispatch(game, phase, Phase::Init)?;

        while self.control.current_state() == LoopState::Run {
            let frame_start = self.clock.now();
            game.events.flush();
            game.time_mut().frame_work_updates = 0;

            dispatch(game, phase, Phase::Input)?;

            while game.time().lag >= interval && game.time().frame_work_updates < max_frame_skip {
                dispatch(game, phase, Phase::Work)?;
                let time = game.time_mut();
                time.lag -= interval;
                time.work_updates += 1;
                time.frame_work_updates += 1;
            }
            if game.time().lag >= interval {
                tracing::warn!(
                    lag = ?game.time().lag,
                    max_frame_skip,
                    "frame skip cap reached, simulation is behind"
                );
            }

            dispatch(game, phase, Phase::Output)?;

            let elapsed = self.clock.now().saturating_sub(frame_start);
            let time = game.time_mut();
            time.lag += elapsed;
            time.elapsed_frame = elapsed;
            time.total_elapsed += elapsed;
            time.frames += 1;
            tracing::trace!(
                frame = time.frames,
                work_updates = time.frame_work_updates,
                "game loop iteration"
            );
        }

        dispatch(game, phase, Phase::Shutdown)
    }

    fn recover(&self, game: &mut Game, failure: LoopFailure) {
        self.control.set(LoopState::Shutdown);
        tracing::error!(%failure, "game loop crashed");

        let event = Event::new(UNHANDLED_FAILURE, failure);
        game.events.set_singleton_event(event.clone());
        let time = *game.time();

        let handled = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(failure) = event.payload::<LoopFailure>() {
                let mut handler = self.crash_handler.lock();
                (*handler)(failure, &time, game);
            }
            game.update_group(Phase::Crash.as_str())
        }));
        match handled {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(error = %err, "crash group failed"),
            Err(payload) => tracing::error!(
                message = %panic_message(payload.as_ref()),
                "crash handler panicked"
            ),
        }
    }
}

fn dispatch(game: &mut Game, current: &mut Phase, next: Phase) -> EngineResult<()> {
    *current = next;
    game.update_group(next.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemMeta;

    fn game_with(groups: &[(Phase, &'static str)]) -> Game {
        let mut game = Game::default();
        for &(phase, name) in groups {
            game.systems.register_fn(name, move |_: &SystemMeta, game: &mut Game| {
                let marker = game.world.create();
                game.world.attach_tag(marker, name);
                Ok(())
            });
            game.systems.append_to_group(phase.as_str(), name).unwrap();
        }
        game
    }

    fn count(game: &Game, tag: &str) -> usize {
        game.world
            .select(&strata_core::EntityFilter::new().all_tags([tag]))
            .len()
    }

    #[test]
    fn test_settings_validation() {
        assert!(LoopSettings::new(0, 1).is_err());
        assert!(LoopSettings::new(1001, 1).is_err());
        assert!(LoopSettings::new(1000, 0).is_err());
        let settings = LoopSettings::new(50, 3).unwrap();
        assert_eq!(settings.update_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Work.as_str(), "WORK");
        assert_eq!(Phase::Crash.to_string(), "CRASH");
    }

    #[test]
    fn test_control_transitions() {
        let control = LoopControl::new();
        assert_eq!(control.current_state(), LoopState::Stop);
        assert!(!control.stop());
        assert!(control.begin());
        assert!(!control.begin());
        assert!(control.stop());
        assert_eq!(control.current_state(), LoopState::Shutdown);
    }

    #[test]
    fn test_session_phase_order() {
        let mut game = game_with(&[
            (Phase::Init, "init"),
            (Phase::Input, "input"),
            (Phase::Work, "work"),
            (Phase::Output, "output"),
            (Phase::Shutdown, "shutdown"),
        ]);
        game.systems.register_fn("stopper", |_: &SystemMeta, game: &mut Game| {
            if game.time().frames == 1 {
                game.control().stop();
            }
            Ok(())
        });
        game.systems.append_to_group("OUTPUT", "stopper").unwrap();

        let clock = ManualClock::new();
        let settings = LoopSettings::new(50, 3).unwrap();
        let game_loop = GameLoop::with_settings(settings, game).with_clock(clock);
        assert!(game_loop.run_blocking());
        assert_eq!(game_loop.current_state(), LoopState::Stop);

        let game = game_loop.game();
        let game = game.lock();
        assert_eq!(count(&game, "init"), 1);
        assert_eq!(count(&game, "input"), 2);
        assert_eq!(count(&game, "output"), 2);
        assert_eq!(count(&game, "shutdown"), 1);
        // Only the initial interval of lag: the clock never moved.
        assert_eq!(count(&game, "work"), 1);
        assert_eq!(game.time().frames, 2);
    }

    #[test]
    fn test_panic_routes_to_crash_handler() {
        let mut game = game_with(&[(Phase::Crash, "crash"), (Phase::Shutdown, "shutdown")]);
        game.systems.register_fn("explode", |_: &SystemMeta, _: &mut Game| {
            panic!("kaboom");
        });
        game.systems.append_to_group("WORK", "explode").unwrap();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let game_loop = GameLoop::with_settings(LoopSettings::new(10, 1).unwrap(), game)
            .with_clock(ManualClock::new())
            .with_crash_handler(move |failure: &LoopFailure, _: &GameTime, _: &mut Game| {
                *sink.lock() = Some((failure.phase(), failure.to_string()));
            });

        assert!(game_loop.run_blocking());
        assert_eq!(game_loop.current_state(), LoopState::Stop);

        let (phase, message) = seen.lock().clone().unwrap();
        assert_eq!(phase, Phase::Work);
        assert!(message.contains("kaboom"));

        let game = game_loop.game();
        let mut game = game.lock();
        assert_eq!(count(&game, "crash"), 1);
        assert_eq!(count(&game, "shutdown"), 0);
        let failure = game.events.take_singleton_event(UNHANDLED_FAILURE).unwrap();
        assert!(failure.payload::<LoopFailure>().is_some());
    }

    #[test]
    fn test_start_is_noop_unless_stopped() {
        let game_loop = GameLoop::with_settings(LoopSettings::new(10, 1).unwrap(), Game::default());
        assert!(game_loop.control().begin());
        assert!(!game_loop.run_blocking());
        game_loop.control().set(LoopState::Stop);
    }
}
