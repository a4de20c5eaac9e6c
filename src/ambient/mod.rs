//! Decorative idle animations. Fully separate from session timing: losing or
//! delaying their ticks only affects smoothness.

pub mod oscillators;

pub use oscillators::{AmbientFrame, HighlightSweep, IdlePulse, RestingCircle};

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::breathing::SessionSnapshot;

use oscillators::{compose, should_animate};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub struct AmbientAnimator {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl AmbientAnimator {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    /// Spawns the 50 ms animation loop. Frames are published on the returned
    /// channel.
    pub fn start(
        &mut self,
        reduced_motion: watch::Receiver<bool>,
        session: watch::Receiver<SessionSnapshot>,
    ) -> Result<watch::Receiver<AmbientFrame>> {
        if self.handle.is_some() {
            bail!("ambient animation already running");
        }

        let cancel_token = CancellationToken::new();
        let (frame_tx, frame_rx) = watch::channel(compose(
            &IdlePulse::default(),
            &HighlightSweep::default(),
            *reduced_motion.borrow(),
            session.borrow().lifecycle,
        ));

        let handle = tokio::spawn(ambient_loop(
            frame_tx,
            reduced_motion,
            session,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(frame_rx)
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("ambient animation task failed to join")
        } else {
            Ok(())
        }
    }
}

impl Default for AmbientAnimator {
    fn default() -> Self {
        Self::new()
    }
}

async fn ambient_loop(
    frame_tx: watch::Sender<AmbientFrame>,
    mut reduced_motion: watch::Receiver<bool>,
    session: watch::Receiver<SessionSnapshot>,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pulse = IdlePulse::default();
    let mut sweep = HighlightSweep::default();
    let mut watching_preference = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reduced = *reduced_motion.borrow();
                let lifecycle = session.borrow().lifecycle;
                if should_animate(reduced, lifecycle) {
                    pulse.step();
                    sweep.step();
                }
                frame_tx.send_replace(compose(&pulse, &sweep, reduced, lifecycle));
            }
            changed = reduced_motion.changed(), if watching_preference => {
                if changed.is_err() {
                    watching_preference = false;
                    continue;
                }
                let reduced = *reduced_motion.borrow_and_update();
                log_info!("ambient animation {}", if reduced { "stilled" } else { "resumed" });
                frame_tx.send_replace(compose(&pulse, &sweep, reduced, session.borrow().lifecycle));
            }
            _ = cancel_token.cancelled() => {
                log_info!("ambient animation shutting down");
                break;
            }
        }
    }
}
