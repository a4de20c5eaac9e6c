use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::audio::CompletionCue;

use super::engine::{derive_snapshot, is_complete, SessionConfig, SessionSnapshot};
use super::state::{Lifecycle, SessionState};
use super::technique::Technique;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Roughly one display frame.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
/// How long the finished session fades before it ends.
pub const FADE_OUT_DELAY: Duration = Duration::from_secs(10);

type TaskSlot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Owns the running session. Controls (`start`, `pause_or_resume`, `reset`)
/// are the only writers of lifecycle and timestamps; the frame ticker only
/// derives snapshots and advances the cycle counter.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    snapshot_tx: Arc<watch::Sender<SessionSnapshot>>,
    cue: Arc<dyn CompletionCue>,
    ticker: TaskSlot,
    fade: TaskSlot,
    frame_interval: Duration,
    fade_delay: Duration,
    debug_frames: bool,
}

impl SessionController {
    pub fn new(cue: Arc<dyn CompletionCue>) -> Self {
        let state = SessionState::new();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::idle(&state.config()));

        Self {
            state: Arc::new(Mutex::new(state)),
            snapshot_tx: Arc::new(snapshot_tx),
            cue,
            ticker: Arc::new(Mutex::new(None)),
            fade: Arc::new(Mutex::new(None)),
            frame_interval: FRAME_INTERVAL,
            fade_delay: FADE_OUT_DELAY,
            debug_frames: false,
        }
    }

    pub fn with_debug_frames(mut self, enabled: bool) -> Self {
        self.debug_frames = enabled;
        self
    }

    /// Snapshots published by the controller, one per frame while running.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub async fn get_state(&self) -> SessionState {
        self.state.lock().await.clone()
    }

    /// A snapshot derived from the current clock, independent of the ticker.
    pub async fn get_snapshot(&self) -> SessionSnapshot {
        let guard = self.state.lock().await;
        derive_snapshot(&guard.config(), guard.lifecycle, guard.elapsed_ms(Instant::now()))
    }

    pub async fn elapsed_ms(&self) -> f64 {
        self.state.lock().await.elapsed_ms(Instant::now())
    }

    /// Starts a fresh session, abandoning whatever was running or fading.
    pub async fn start(&self, technique: Technique, duration_secs: u64) -> Result<SessionSnapshot> {
        let config = SessionConfig::new(technique, duration_secs);
        config.validate()?;

        self.cancel_fade().await;
        self.cancel_ticker().await;

        let session_id = Uuid::new_v4().to_string();
        let snapshot = {
            let mut state = self.state.lock().await;
            state.begin_session(session_id.clone(), config, Utc::now(), Instant::now());
            let snapshot = derive_snapshot(&config, Lifecycle::Running, 0.0);
            self.snapshot_tx.send_replace(snapshot.clone());
            snapshot
        };

        log_info!(
            "session {} started: {} for {}s ({} cycles)",
            session_id,
            technique.as_str(),
            duration_secs,
            config.total_cycles()
        );

        self.spawn_ticker().await;
        Ok(snapshot)
    }

    /// Starts again with the technique and duration of the last session.
    pub async fn restart(&self) -> Result<SessionSnapshot> {
        let config = self.state.lock().await.config();
        self.start(config.technique, config.duration_secs).await
    }

    /// Pauses a running session or resumes a paused one. Anything else is
    /// ignored and the current snapshot is returned unchanged.
    pub async fn pause_or_resume(&self) -> SessionSnapshot {
        let now = Instant::now();
        let (applied, snapshot) = {
            let mut state = self.state.lock().await;
            let applied = state.toggle_pause(now);
            let snapshot = derive_snapshot(&state.config(), state.lifecycle, state.elapsed_ms(now));
            if applied {
                self.snapshot_tx.send_replace(snapshot.clone());
            }
            (applied, snapshot)
        };

        if !applied {
            return snapshot;
        }

        match snapshot.lifecycle {
            Lifecycle::Running => {
                log_info!("resumed at {:.0} ms", snapshot.elapsed_ms);
                self.spawn_ticker().await;
            }
            _ => {
                log_info!("paused at {:.0} ms", snapshot.elapsed_ms);
                self.cancel_ticker().await;
            }
        }
        snapshot
    }

    /// Back to idle. Cancels the ticker and any pending fade-out.
    pub async fn reset(&self) -> SessionSnapshot {
        self.cancel_fade().await;
        self.cancel_ticker().await;

        let mut state = self.state.lock().await;
        if let Some(id) = state.session_id.as_deref() {
            log_info!("session {} reset", id);
        }
        state.cancel();
        let snapshot = SessionSnapshot::idle(&state.config());
        self.snapshot_tx.send_replace(snapshot.clone());
        snapshot
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = self.state.clone();
        let snapshot_tx = self.snapshot_tx.clone();
        let cue = self.cue.clone();
        let fade = self.fade.clone();
        let frame_interval = self.frame_interval;
        let fade_delay = self.fade_delay;
        let debug_frames = self.debug_frames;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(frame_interval);
            // late frames are dropped; each frame re-derives from the clock
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let now = Instant::now();

                let (snapshot, new_cycle, completed_id) = {
                    let mut guard = state.lock().await;
                    if guard.lifecycle != Lifecycle::Running {
                        break;
                    }
                    let config = guard.config();
                    let elapsed = guard.elapsed_ms(now);

                    let completed_id = if is_complete(&config, elapsed) {
                        guard.complete(now);
                        guard.session_id.clone()
                    } else {
                        None
                    };
                    let snapshot = derive_snapshot(&config, guard.lifecycle, elapsed);
                    let new_cycle = completed_id.is_none() && guard.observe_cycle(snapshot.cycle_count);
                    snapshot_tx.send_replace(snapshot.clone());
                    (snapshot, new_cycle, completed_id)
                };

                if debug_frames {
                    log_debug!(
                        "frame {:.0} ms {:?} p={:.3} r={:.1} o={:.3}",
                        snapshot.elapsed_ms,
                        snapshot.phase,
                        snapshot.phase_progress,
                        snapshot.radius,
                        snapshot.opacity
                    );
                }

                if new_cycle {
                    log_info!("cycle {} of {}", snapshot.cycle_count + 1, snapshot.total_cycles);
                }

                if let Some(session_id) = completed_id {
                    log_info!(
                        "session {} complete after {} cycles ({:.0} ms)",
                        session_id,
                        snapshot.cycle_count + 1,
                        snapshot.elapsed_ms
                    );

                    if let Err(err) = cue.play_completion_cue() {
                        log_warn!("completion cue failed: {err:#}");
                    }

                    schedule_fade(&state, &snapshot_tx, &fade, fade_delay, session_id).await;
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn cancel_fade(&self) {
        if let Some(handle) = self.fade.lock().await.take() {
            handle.abort();
        }
    }
}

/// One-shot move from completing to ended. The task is aborted by reset and
/// start; it also checks the session id so a late wake-up cannot end a newer
/// session.
async fn schedule_fade(
    state: &Arc<Mutex<SessionState>>,
    snapshot_tx: &Arc<watch::Sender<SessionSnapshot>>,
    fade: &TaskSlot,
    delay: Duration,
    session_id: String,
) {
    let state = state.clone();
    let snapshot_tx = snapshot_tx.clone();

    let handle = tokio::spawn(async move {
        time::sleep(delay).await;

        let mut guard = state.lock().await;
        if guard.session_id.as_deref() != Some(session_id.as_str()) || !guard.finish() {
            return;
        }
        let snapshot = derive_snapshot(&guard.config(), guard.lifecycle, guard.elapsed_ms(Instant::now()));
        snapshot_tx.send_replace(snapshot);
        log_info!("session {} ended", session_id);
    });

    let mut slot = fade.lock().await;
    if let Some(previous) = slot.replace(handle) {
        previous.abort();
    }
}
