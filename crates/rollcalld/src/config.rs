use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Daemon configuration.
///
/// Built from compiled defaults, then an optional TOML file, then
/// `ROLLCALL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory for captured check-in and enrollment images.
    pub image_dir: PathBuf,
    /// Maximum Euclidean distance admitted as a match (inclusive).
    pub match_threshold: f32,
    /// Expected descriptor length from the embedding model.
    pub descriptor_dim: usize,
    /// Timeout in seconds for any single store operation.
    pub persist_timeout_secs: u64,
    /// Serve on the session bus instead of the system bus.
    pub session_bus: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            db_path: data_dir.join("attendance.db"),
            image_dir: data_dir.join("captures"),
            match_threshold: 0.4,
            descriptor_dim: 128,
            persist_timeout_secs: 5,
            session_bus: false,
        }
    }
}

impl Config {
    /// Load configuration from the config file (if any) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("ROLLCALL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_config_path());

        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `ROLLCALL_*` overrides. Unparseable numbers keep the current value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROLLCALL_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROLLCALL_IMAGE_DIR") {
            self.image_dir = PathBuf::from(v);
        }
        self.match_threshold = parsed(&lookup, "ROLLCALL_MATCH_THRESHOLD", self.match_threshold);
        self.descriptor_dim = parsed(&lookup, "ROLLCALL_DESCRIPTOR_DIM", self.descriptor_dim);
        self.persist_timeout_secs =
            parsed(&lookup, "ROLLCALL_PERSIST_TIMEOUT_SECS", self.persist_timeout_secs);
        if let Some(v) = lookup("ROLLCALL_SESSION_BUS") {
            self.session_bus = v != "0" && !v.eq_ignore_ascii_case("false");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || self.match_threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "match_threshold",
                reason: format!("must be a positive number, got {}", self.match_threshold),
            });
        }
        if self.descriptor_dim == 0 {
            return Err(ConfigError::Invalid {
                key: "descriptor_dim",
                reason: "must be at least 1".into(),
            });
        }
        if self.persist_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "persist_timeout_secs",
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(())
    }

    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_secs)
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable override");
            current
        }),
        None => current,
    }
}

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}

fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
        .join("rollcall")
}

fn default_config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("rollcall/rollcalld.toml")
}
