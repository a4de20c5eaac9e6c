use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use super::engine::{CycleTracker, SessionConfig};
use super::technique::Technique;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    Idle,
    Running,
    Paused,
    /// Finished breathing; the display is fading out.
    Completing,
    Ended,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Lifecycle::Idle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    TogglePause,
    Complete,
    FadeElapsed,
    Reset,
}

impl Lifecycle {
    /// The state `event` leads to, or `None` when the event does not apply.
    pub fn transition(self, event: SessionEvent) -> Option<Lifecycle> {
        use Lifecycle::*;
        match (self, event) {
            (_, SessionEvent::Start) => Some(Running),
            (_, SessionEvent::Reset) => Some(Idle),
            (Running, SessionEvent::TogglePause) => Some(Paused),
            (Paused, SessionEvent::TogglePause) => Some(Running),
            (Running, SessionEvent::Complete) => Some(Completing),
            (Completing, SessionEvent::FadeElapsed) => Some(Ended),
            _ => None,
        }
    }
}

pub const DEFAULT_DURATION_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub lifecycle: Lifecycle,
    pub session_id: Option<String>,
    pub technique: Technique,
    pub duration_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    /// Monotonic start of the run. Fixed until the next start or reset.
    #[serde(skip)]
    pub start_anchor: Option<Instant>,
    #[serde(skip)]
    pub paused_at: Option<Instant>,
    /// Sum of every finished pause in this run.
    #[serde(skip)]
    pub paused_total: Duration,
    /// Where the clock stopped when the session completed.
    #[serde(skip)]
    pub finished_at: Option<Instant>,
    #[serde(skip)]
    cycles: CycleTracker,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Idle,
            session_id: None,
            technique: Technique::default(),
            duration_secs: DEFAULT_DURATION_SECS,
            started_at: None,
            start_anchor: None,
            paused_at: None,
            paused_total: Duration::ZERO,
            finished_at: None,
            cycles: CycleTracker::default(),
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> SessionConfig {
        SessionConfig::new(self.technique, self.duration_secs)
    }

    /// Excluded-pause elapsed time in milliseconds. Zero before the first
    /// start; frozen while paused and after completion.
    pub fn elapsed_ms(&self, now: Instant) -> f64 {
        let Some(start) = self.start_anchor else {
            return 0.0;
        };
        let reading = match self.lifecycle {
            Lifecycle::Paused => self.paused_at,
            Lifecycle::Completing | Lifecycle::Ended => self.finished_at,
            _ => None,
        }
        .unwrap_or(now);

        let active = reading
            .saturating_duration_since(start)
            .saturating_sub(self.paused_total);
        active.as_secs_f64() * 1000.0
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        config: SessionConfig,
        started_at: DateTime<Utc>,
        now: Instant,
    ) {
        *self = Self {
            lifecycle: Lifecycle::Running,
            session_id: Some(session_id),
            technique: config.technique,
            duration_secs: config.duration_secs,
            started_at: Some(started_at),
            start_anchor: Some(now),
            paused_at: None,
            paused_total: Duration::ZERO,
            finished_at: None,
            cycles: CycleTracker::default(),
        };
    }

    /// Pauses a running session or resumes a paused one. Returns false when
    /// the session is in neither state.
    pub fn toggle_pause(&mut self, now: Instant) -> bool {
        let Some(next) = self.lifecycle.transition(SessionEvent::TogglePause) else {
            return false;
        };
        match next {
            Lifecycle::Paused => self.paused_at = Some(now),
            _ => {
                if let Some(paused_at) = self.paused_at.take() {
                    self.paused_total += now.saturating_duration_since(paused_at);
                }
            }
        }
        self.lifecycle = next;
        true
    }

    pub fn complete(&mut self, now: Instant) -> bool {
        let Some(next) = self.lifecycle.transition(SessionEvent::Complete) else {
            return false;
        };
        self.finished_at = Some(now);
        self.lifecycle = next;
        true
    }

    pub fn finish(&mut self) -> bool {
        match self.lifecycle.transition(SessionEvent::FadeElapsed) {
            Some(next) => {
                self.lifecycle = next;
                true
            }
            None => false,
        }
    }

    /// True when `cycle` is a cycle this run has not reported yet.
    pub fn observe_cycle(&mut self, cycle: u64) -> bool {
        self.cycles.observe(cycle)
    }

    /// Back to idle, keeping the chosen technique and duration for display.
    pub fn cancel(&mut self) {
        *self = Self {
            lifecycle: Lifecycle::Idle,
            technique: self.technique,
            duration_secs: self.duration_secs,
            ..Self::default()
        };
    }
}
