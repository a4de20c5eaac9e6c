pub mod controller;
pub mod engine;
pub mod state;
pub mod technique;

pub use controller::{SessionController, FADE_OUT_DELAY, FRAME_INTERVAL};
pub use engine::{
    announcement, derive_snapshot, is_complete, CycleTracker, ProgressRing, SessionConfig,
    SessionSnapshot, MAX_RADIUS, MIN_RADIUS,
};
pub use state::{Lifecycle, SessionEvent, SessionState, DEFAULT_DURATION_SECS};
pub use technique::{Phase, PhaseTimings, Technique};
