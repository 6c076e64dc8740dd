//! Host settings stored next to the binary as `settings.json`.

use crate::error::ConfigError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub scripts_dir: PathBuf,
    pub history_max_records: usize,
    /// Threshold given to image queries created from the command line.
    pub default_image_threshold: f32,
    /// Log export directory. Falls back to `<scripts_dir>/logs`.
    pub log_dir: Option<PathBuf>,
    pub last_script_name: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("scripts"),
            history_max_records: 1000,
            default_image_threshold: 0.8,
            log_dir: None,
            last_script_name: None,
        }
    }
}

impl AppSettings {
    /// Missing file gives defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let settings = serde_json::from_str(&json)?;
                log::debug!("Settings loaded from {:?}", path);
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolves a script argument: existing paths win, bare names map to
    /// `<scripts_dir>/<name>.json`.
    pub fn script_path(&self, name: &str) -> PathBuf {
        let direct = PathBuf::from(name);
        if direct.exists() || direct.extension().is_some() || direct.components().count() > 1 {
            direct
        } else {
            self.scripts_dir.join(format!("{}.json", name))
        }
    }

    pub fn log_directory(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.scripts_dir.join("logs"))
    }

    /// Writes `lines` to a timestamped file in the log directory.
    pub fn export_log(&self, lines: &[String]) -> Result<PathBuf, ConfigError> {
        write_log(&self.log_directory(), "log", lines)
    }

    pub fn export_log_to_desktop(&self, lines: &[String]) -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoLogDirectory)?;
        write_log(&home.join("Desktop"), "autotool_log", lines)
    }
}

fn write_log(dir: &Path, prefix: &str, lines: &[String]) -> Result<PathBuf, ConfigError> {
    fs::create_dir_all(dir)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let filename = dir.join(format!("{}_{}.txt", prefix, timestamp));
    fs::write(&filename, lines.join("\n"))?;
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn save_then_load_keeps_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let settings = AppSettings {
            history_max_records: 50,
            last_script_name: Some("daily".into()),
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(AppSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"history_max_records": 10}"#).unwrap();
        let settings = AppSettings::load(&path).unwrap();
        assert_eq!(settings.history_max_records, 10);
        assert_eq!(settings.scripts_dir, PathBuf::from("scripts"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(AppSettings::load(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn bare_names_resolve_into_scripts_dir() {
        let settings = AppSettings::default();
        assert_eq!(settings.script_path("daily"), PathBuf::from("scripts/daily.json"));
        assert_eq!(settings.script_path("other/x.json"), PathBuf::from("other/x.json"));
    }

    #[test]
    fn export_log_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AppSettings {
            log_dir: Some(dir.path().join("logs")),
            ..Default::default()
        };
        let path = settings
            .export_log(&["first".to_string(), "second".to_string()])
            .unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "first\nsecond");
    }
}
