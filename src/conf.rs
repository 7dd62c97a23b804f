use crate::transport::DEFAULT_SOCKET_PATH;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlarmKind {
    #[default]
    Sound,
    Bell,
    Silent,
}

impl AlarmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmKind::Sound => "sound",
            AlarmKind::Bell => "bell",
            AlarmKind::Silent => "silent",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Countdown target as a local date-time, e.g. "2026-04-27T06:00"
    #[serde(default = "default_target")]
    pub target: String,

    /// Line shown above the running countdown
    #[serde(default = "default_headline")]
    pub headline: String,

    /// How the end of the countdown is announced
    #[serde(default)]
    pub alarm: AlarmKind,

    /// WAV file played when `alarm = "sound"`
    /// If None, a built-in chime is used
    #[serde(default)]
    pub sound: Option<PathBuf>,

    /// Control socket path; `$UID` and `$RUNTIME_DIRECTORY` are expanded
    #[serde(default = "default_socket_path")]
    pub socket_path: String,
}

fn default_target() -> String {
    "2026-04-27T06:00".to_string()
}

fn default_headline() -> String {
    "Time until target".to_string()
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target: default_target(),
            headline: default_headline(),
            alarm: AlarmKind::Sound,
            sound: None,
            socket_path: default_socket_path(),
        }
    }
}

impl Settings {
    /// Load config from ~/.config/countdown/config.toml
    /// Returns default settings if file doesn't exist or fails to parse
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            log::info!("Could not determine config directory, using defaults");
            return Self::default();
        };

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    log::debug!("Loaded settings from: {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to parse config {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                log::debug!("No config file found at {}, using defaults", path.display());
                Self::default()
            }
        }
    }
}

/// Get the path to the config file: ~/.config/countdown/config.toml
pub fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "countdown").map(|dirs| dirs.config_dir().join("config.toml"))
}
