pub mod chime;

use anyhow::Result;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Sound played once when a session reaches its natural end. Playback is
/// best effort: callers log a failure and carry on.
pub trait CompletionCue: Send + Sync {
    fn play_completion_cue(&self) -> Result<()>;
}

/// Cue for builds or settings without sound.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl CompletionCue for SilentCue {
    fn play_completion_cue(&self) -> Result<()> {
        log_info!("session complete (chime disabled)");
        Ok(())
    }
}

#[cfg(feature = "audio")]
pub use engine::AudioEngineHandle;

#[cfg(feature = "audio")]
mod engine {
    use super::chime::Chime;
    use super::CompletionCue;

    use anyhow::anyhow;
    use rodio::{OutputStream, Sink};
    use std::sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    const ENABLE_LOGS: bool = true;

    use crate::log_error;

    enum AudioCommand {
        PlayChime,
    }

    /// Owns a dedicated audio thread, started on first use, that holds the
    /// non-`Send` output stream.
    #[derive(Clone)]
    pub struct AudioEngineHandle {
        tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
    }

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
            if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AudioCommand>();

            thread::Builder::new()
                .name("audio-engine".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    fn ensure_sink(
                        stream: &mut Option<OutputStream>,
                        sink: &mut Option<Sink>,
                    ) -> Result<(), String> {
                        if sink.is_none() {
                            let (s, handle) = OutputStream::try_default()
                                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                            let new_sink = Sink::try_new(&handle)
                                .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                            *stream = Some(s);
                            *sink = Some(new_sink);
                        }
                        Ok(())
                    }

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::PlayChime => {
                                if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                    log_error!("chime skipped: {}", err);
                                    continue;
                                }
                                if let Some(ref s) = sink {
                                    s.append(Chime::new());
                                    s.play();
                                }
                            }
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            let tx_clone = tx.clone();
            *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
            Ok(tx_clone)
        }

        pub fn play_chime(&self) -> Result<(), String> {
            let tx = self.ensure_thread()?;
            tx.send(AudioCommand::PlayChime).map_err(|e| e.to_string())
        }
    }

    impl Default for AudioEngineHandle {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CompletionCue for AudioEngineHandle {
        fn play_completion_cue(&self) -> anyhow::Result<()> {
            self.play_chime().map_err(|e| anyhow!(e))
        }
    }
}
