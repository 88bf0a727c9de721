//! Bootstrap configuration loaded from a TOML file, with command-line
//! overrides layered on top.
//!
//! Unlike the teacher's database-first settings layer, this receiver has
//! no persisted state to load configuration *from* (§6: "no persistence of
//! RDS state across process restarts"), so configuration here is a plain
//! file-plus-CLI-overrides resolution, not a TOML-then-database merge.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ReceiverError, Result};

fn default_device() -> PathBuf {
    PathBuf::from("/dev/swradio0")
}

fn default_sampling_rate() -> u32 {
    1_000_000
}

fn default_gain_db() -> f32 {
    20.0
}

/// Bootstrap configuration as read from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// SDR device path, e.g. `/dev/swradio0`.
    #[serde(default = "default_device")]
    pub device: PathBuf,

    /// Tuner sampling rate, Hz.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: u32,

    /// Tuner gain, dB.
    #[serde(default = "default_gain_db")]
    pub gain_db: f32,

    /// Worker thread count for the pipeline scheduler. Defaults to the
    /// number of available CPUs if absent.
    pub worker_threads: Option<usize>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        TomlConfig {
            device: default_device(),
            sampling_rate: default_sampling_rate(),
            gain_db: default_gain_db(),
            worker_threads: None,
        }
    }
}

/// Resolved runtime configuration: the TOML file's values with CLI
/// overrides applied.
#[derive(Debug, Clone)]
pub struct Config {
    pub device: PathBuf,
    pub sampling_rate: u32,
    pub gain_db: f32,
    pub worker_threads: usize,
}

impl Config {
    /// Loads configuration from `config_path` if it exists, falling back
    /// to defaults if the file is absent (unlike the teacher, a missing
    /// config file isn't fatal here -- there's no database to fall back
    /// on, so "use built-in defaults" is the only sane behavior for a CLI
    /// tool most users will run without ever writing a config file).
    pub fn load(
        config_path: &PathBuf,
        device_override: Option<PathBuf>,
        gain_override: Option<f32>,
    ) -> Result<Self> {
        let toml_config = if config_path.exists() {
            let toml_str = std::fs::read_to_string(config_path).map_err(ReceiverError::Io)?;
            toml::from_str(&toml_str)
                .map_err(|e| ReceiverError::Config(format!("failed to parse {}: {e}", config_path.display())))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            device: device_override.unwrap_or(toml_config.device),
            sampling_rate: toml_config.sampling_rate,
            gain_db: gain_override.unwrap_or(toml_config.gain_db),
            worker_threads: toml_config
                .worker_threads
                .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = Config::load(&PathBuf::from("/nonexistent/fmrds.toml"), None, None).unwrap();
        assert_eq!(config.sampling_rate, 1_000_000);
        assert_eq!(config.device, PathBuf::from("/dev/swradio0"));
    }

    #[test]
    fn overrides_take_priority_over_file_defaults() {
        let config = Config::load(
            &PathBuf::from("/nonexistent/fmrds.toml"),
            Some(PathBuf::from("/dev/swradio1")),
            Some(30.0),
        )
        .unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/swradio1"));
        assert_eq!(config.gain_db, 30.0);
    }

    #[test]
    fn parses_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        write!(file, "device = \"/dev/swradio2\"\nsampling_rate = 2000000\ngain_db = 15.0\n").unwrap();

        let config = Config::load(&file.path().to_path_buf(), None, None).unwrap();
        assert_eq!(config.device, PathBuf::from("/dev/swradio2"));
        assert_eq!(config.sampling_rate, 2_000_000);
        assert_eq!(config.gain_db, 15.0);
    }
}
