pub mod ambient;
pub mod audio;
pub mod breathing;
pub mod settings;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use ambient::AmbientAnimator;
use audio::{CompletionCue, SilentCue};
use breathing::{Lifecycle, SessionController};
use settings::{Settings, SettingsStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

/// Keyboard controls of the terminal driver, one per input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverCommand {
    PauseOrResume,
    Reset,
    Start,
    ToggleReducedMotion,
    ReloadSettings,
    Quit,
}

fn parse_command(line: &str) -> Option<DriverCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" | "resume" => Some(DriverCommand::PauseOrResume),
        "r" | "reset" => Some(DriverCommand::Reset),
        "s" | "start" | "restart" => Some(DriverCommand::Start),
        "m" | "motion" => Some(DriverCommand::ToggleReducedMotion),
        "l" | "reload" => Some(DriverCommand::ReloadSettings),
        "q" | "quit" => Some(DriverCommand::Quit),
        _ => None,
    }
}

fn completion_cue(settings: &Settings) -> Arc<dyn CompletionCue> {
    #[cfg(feature = "audio")]
    {
        if settings.chime_enabled {
            return Arc::new(audio::AudioEngineHandle::new());
        }
    }

    #[cfg(not(feature = "audio"))]
    {
        if settings.chime_enabled {
            log_warn!("built without the `audio` feature; the completion chime is silent");
        }
    }

    Arc::new(SilentCue)
}

/// Runs one guided session in the terminal. Phase labels are logged as they
/// change; the process exits once the session has faded out.
pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("breathe starting up...");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let result = runtime.block_on(drive());
    // a pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();
    result
}

async fn drive() -> Result<()> {
    let settings_store = SettingsStore::from_env()?;
    let settings = settings_store.settings();

    let controller =
        SessionController::new(completion_cue(&settings)).with_debug_frames(settings.debug_frames);
    let mut snapshots = controller.subscribe();

    let mut ambient = AmbientAnimator::new();
    let _frames = ambient.start(settings_store.watch_reduced_motion(), controller.subscribe())?;

    let config = settings.session_config();
    controller.start(config.technique, config.duration_secs).await?;
    log_info!("controls: p = pause/resume, r = reset, s = restart, m = toggle motion, l = reload settings, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut last_label = "";

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.label != last_label {
                    if !snapshot.label.is_empty() {
                        log_info!("{}", snapshot.label);
                    }
                    last_label = snapshot.label;
                }
                if snapshot.lifecycle == Lifecycle::Ended {
                    log_info!("session ended after {:.1}s", snapshot.elapsed_ms / 1000.0);
                    break;
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        stdin_open = false;
                        continue;
                    }
                    Err(err) => {
                        log_warn!("stdin closed: {}", err);
                        stdin_open = false;
                        continue;
                    }
                };
                match parse_command(&line) {
                    Some(DriverCommand::PauseOrResume) => {
                        controller.pause_or_resume().await;
                    }
                    Some(DriverCommand::Reset) => {
                        controller.reset().await;
                        log_info!("reset; press s to start again or q to quit");
                    }
                    Some(DriverCommand::Start) => {
                        controller.restart().await?;
                    }
                    Some(DriverCommand::ToggleReducedMotion) => {
                        settings_store.set_reduced_motion(!settings_store.reduced_motion());
                    }
                    Some(DriverCommand::ReloadSettings) => {
                        if let Err(err) = settings_store.reload() {
                            log_warn!("settings reload failed: {:#}", err);
                        }
                    }
                    Some(DriverCommand::Quit) => break,
                    None => log_warn!("unknown command {:?}", line.trim()),
                }
            }
        }
    }

    controller.reset().await;
    ambient.stop().await?;
    Ok(())
}
