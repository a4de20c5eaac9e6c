use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};
use tokio::sync::watch;

use crate::breathing::{SessionConfig, Technique, DEFAULT_DURATION_SECS};
use crate::utils::logging::env_flag;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const SETTINGS_PATH_ENV: &str = "BREATHE_SETTINGS";
pub const REDUCED_MOTION_ENV: &str = "BREATHE_REDUCED_MOTION";
pub const DEBUG_ENV: &str = "BREATHE_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub technique: Technique,
    #[serde(rename = "durationSeconds")]
    pub duration_secs: u64,
    pub reduced_motion: bool,
    pub chime_enabled: bool,
    /// Log every frame. Environment only.
    #[serde(skip)]
    pub debug_frames: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            technique: Technique::Balanced,
            duration_secs: DEFAULT_DURATION_SECS,
            reduced_motion: false,
            chime_enabled: true,
            debug_frames: false,
        }
    }
}

impl Settings {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.technique, self.duration_secs)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<bool>) {
        if let Some(reduced) = lookup(REDUCED_MOTION_ENV) {
            self.reduced_motion = reduced;
        }
        if let Some(debug) = lookup(DEBUG_ENV) {
            self.debug_frames = debug;
        }
    }

    fn sanitized(mut self) -> Self {
        if let Err(err) = self.session_config().validate() {
            log_warn!("{err}; using {DEFAULT_DURATION_SECS} seconds");
            self.duration_secs = DEFAULT_DURATION_SECS;
        }
        self
    }
}

/// Read-mostly settings shared by the driver and the decorative animations.
/// Nothing is written back to disk.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<Settings>,
    reduced_motion_tx: watch::Sender<bool>,
}

impl SettingsStore {
    pub fn new(path: Option<PathBuf>) -> Result<Self> {
        let data = Self::read(path.as_ref(), env_flag)?;
        let (reduced_motion_tx, _) = watch::channel(data.reduced_motion);

        Ok(Self {
            path,
            data: RwLock::new(data),
            reduced_motion_tx,
        })
    }

    /// Settings from the file named by `BREATHE_SETTINGS`, if any, plus
    /// environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::new(std::env::var_os(SETTINGS_PATH_ENV).map(PathBuf::from))
    }

    fn read(path: Option<&PathBuf>, lookup: impl Fn(&str) -> Option<bool>) -> Result<Settings> {
        let mut data = match path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings from {}", path.display()))?;
                serde_json::from_str(&contents).unwrap_or_else(|err| {
                    log_warn!("Ignoring malformed settings in {}: {}", path.display(), err);
                    Settings::default()
                })
            }
            _ => Settings::default(),
        };
        data.apply_overrides(lookup);
        Ok(data.sanitized())
    }

    pub fn settings(&self) -> Settings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn reduced_motion(&self) -> bool {
        *self.reduced_motion_tx.borrow()
    }

    pub fn set_reduced_motion(&self, reduced: bool) {
        {
            let mut guard = self
                .data
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.reduced_motion = reduced;
        }
        let changed = self.reduced_motion_tx.send_if_modified(|current| {
            let changed = *current != reduced;
            *current = reduced;
            changed
        });
        if changed {
            log_info!("reduced motion {}", if reduced { "on" } else { "off" });
        }
    }

    /// Receives the reduced-motion preference each time it changes.
    pub fn watch_reduced_motion(&self) -> watch::Receiver<bool> {
        self.reduced_motion_tx.subscribe()
    }

    /// Re-reads the settings file and environment. A changed reduced-motion
    /// preference reaches every `watch_reduced_motion` receiver.
    pub fn reload(&self) -> Result<()> {
        self.reload_with(env_flag)
    }

    fn reload_with(&self, lookup: impl Fn(&str) -> Option<bool>) -> Result<()> {
        let data = Self::read(self.path.as_ref(), lookup)?;
        let reduced = data.reduced_motion;
        {
            let mut guard = self
                .data
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *guard = data;
        }
        self.set_reduced_motion(reduced);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn missing_file_gives_defaults() {
        let data = SettingsStore::read(Some(&PathBuf::from("/nonexistent/breathe.json")), |_| None).unwrap();
        assert_eq!(data, Settings::default());
    }

    #[test]
    fn reads_camel_case_file() {
        let file = write_settings(
            r#"{"technique":"longExhale","durationSeconds":180,"reducedMotion":true}"#,
        );
        let data = SettingsStore::read(Some(&file.path().to_path_buf()), |_| None).unwrap();
        assert_eq!(data.technique, Technique::LongExhale);
        assert_eq!(data.duration_secs, 180);
        assert!(data.reduced_motion);
        assert!(data.chime_enabled);
    }

    #[test]
    fn malformed_file_falls_back() {
        let file = write_settings("{ not json");
        let data = SettingsStore::read(Some(&file.path().to_path_buf()), |_| None).unwrap();
        assert_eq!(data, Settings::default());
    }

    #[test]
    fn out_of_range_duration_is_replaced() {
        let file = write_settings(r#"{"durationSeconds":5}"#);
        let data = SettingsStore::read(Some(&file.path().to_path_buf()), |_| None).unwrap();
        assert_eq!(data.duration_secs, DEFAULT_DURATION_SECS);
    }

    #[test]
    fn environment_overrides_file() {
        let file = write_settings(r#"{"reducedMotion":false}"#);
        let data = SettingsStore::read(Some(&file.path().to_path_buf()), |name| {
            (name == REDUCED_MOTION_ENV || name == DEBUG_ENV).then_some(true)
        })
        .unwrap();
        assert!(data.reduced_motion);
        assert!(data.debug_frames);
    }

    #[test]
    fn reduced_motion_change_is_broadcast() {
        let store = SettingsStore::new(None).unwrap();
        let mut rx = store.watch_reduced_motion();
        let initial = store.reduced_motion();

        store.set_reduced_motion(!initial);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), !initial);
        assert_eq!(store.settings().reduced_motion, !initial);

        // same value again is not a change
        store.set_reduced_motion(!initial);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn reload_picks_up_file_changes() {
        let file = write_settings(r#"{"reducedMotion":false,"durationSeconds":120}"#);
        let store = SettingsStore::new(Some(file.path().to_path_buf())).unwrap();
        store.reload_with(|_| None).unwrap();
        let mut rx = store.watch_reduced_motion();
        assert!(!*rx.borrow_and_update());

        fs::write(
            file.path(),
            r#"{"technique":"longExhale","durationSeconds":240,"reducedMotion":true}"#,
        )
        .unwrap();
        store.reload_with(|_| None).unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        let settings = store.settings();
        assert_eq!(settings.technique, Technique::LongExhale);
        assert_eq!(settings.duration_secs, 240);
    }
}
