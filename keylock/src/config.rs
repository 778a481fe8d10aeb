use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::env::var_os;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use keylock_gpio::keypad::ScanTiming;
use crate::machine::HoldTiming;
use crate::session::{DEFAULT_PASSWORD, MAX_DIGITS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings read from the JSON config file.
///
/// Missing fields take their default values. The password set on the keypad at runtime is never
/// written back here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// The password the lock starts with.
    pub password: u32,
    pub settle_us: u64,
    pub debounce_ms: u64,
    pub release_ms: u64,
    pub release_poll_ms: u64,
    pub result_hold_ms: u64,
    pub saved_hold_ms: u64,
    pub welcome_hold_ms: u64,
}

impl Config {
    /// Gets the config file path, from `CONFIG_FILE` or `config.json` by default.
    pub fn path() -> PathBuf {
        var_os("CONFIG_FILE")
            .unwrap_or_else(|| OsString::from("config.json"))
            .into()
    }

    /// Loads the config from [Config::path]. Returns `Ok(None)` if there's no file.
    pub fn try_load() -> Result<Option<Self>, ConfigError> {
        let path = Self::path();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = 10u32.pow(MAX_DIGITS as u32) - 1;
        if self.password > max {
            return Err(ConfigError::Invalid(format!(
                "password must have at most {} digits",
                MAX_DIGITS
            )));
        }
        if self.release_poll_ms == 0 {
            return Err(ConfigError::Invalid("release_poll_ms must not be 0".to_string()));
        }
        Ok(())
    }

    pub fn scan_timing(&self) -> ScanTiming {
        ScanTiming {
            settle: Duration::from_micros(self.settle_us),
            debounce: Duration::from_millis(self.debounce_ms),
            release: Duration::from_millis(self.release_ms),
            release_poll: Duration::from_millis(self.release_poll_ms),
        }
    }

    pub fn hold_timing(&self) -> HoldTiming {
        HoldTiming {
            result: Duration::from_millis(self.result_hold_ms),
            saved: Duration::from_millis(self.saved_hold_ms),
            welcome: Duration::from_millis(self.welcome_hold_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let scan = ScanTiming::default();
        let holds = HoldTiming::default();
        Config {
            password: DEFAULT_PASSWORD,
            settle_us: scan.settle.as_micros() as u64,
            debounce_ms: scan.debounce.as_millis() as u64,
            release_ms: scan.release.as_millis() as u64,
            release_poll_ms: scan.release_poll.as_millis() as u64,
            result_hold_ms: holds.result.as_millis() as u64,
            saved_hold_ms: holds.saved.as_millis() as u64,
            welcome_hold_ms: holds.welcome.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_to_timings() {
        let config = Config::default();
        assert_eq!(config.password, 1234);
        assert_eq!(config.scan_timing(), ScanTiming::default());
        assert_eq!(config.hold_timing(), HoldTiming::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = serde_json::from_str(r#"{ "password": 4321 }"#).unwrap();
        assert_eq!(config.password, 4321);
        assert_eq!(config.debounce_ms, Config::default().debounce_ms);
    }

    #[test]
    fn seven_digit_password_is_rejected() {
        let config = Config {
            password: 1_000_000,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        let config = Config {
            password: 999_999,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("keylock-config-{}.json", std::process::id()));
        let config = Config {
            password: 2580,
            result_hold_ms: 900,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("keylock-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ password: ").unwrap();
        let loaded = Config::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(loaded, Err(ConfigError::Json(_))));
    }
}
