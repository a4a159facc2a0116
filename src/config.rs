//! Loader settings: per-category retry policy, credentials mode, sampler size.
//!
//! Settings are plain serde structs so they can be assembled in code or read
//! from a JSON file. Missing fields fall back to defaults.
//!
//! ```
//! use segment_loader::config::LoaderSettings;
//! use segment_loader::request::MediaCategory;
//!
//! let settings = LoaderSettings::from_json_str(r#"{ "audio": { "retry_attempts": 1 } }"#).unwrap();
//! assert_eq!(settings.for_category(MediaCategory::Audio).retry_attempts, 1);
//! assert_eq!(settings.for_category(MediaCategory::Video).retry_attempts, 3);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::request::MediaCategory;

/// Default retry attempts after the initial fetch.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default delay between attempts for media categories (1 second).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default delay between attempts for non-media requests (manifests, xlink).
const DEFAULT_OTHER_RETRY_DELAY_MS: u64 = 500;

/// Default number of throughput samples kept per category.
pub const DEFAULT_HISTORY_CAPACITY: usize = 4;

/// Highest accepted retry attempt count.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Highest accepted retry delay (60 seconds).
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Errors reading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Io {
        /// Path of the settings file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The settings document is not valid JSON for [`LoaderSettings`].
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its accepted range.
    #[error("invalid value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Dotted field path, e.g. `video.retry_attempts`.
        field: String,
        /// The rejected value.
        value: u64,
        /// Human-readable accepted range.
        expected: &'static str,
    },
}

/// Whether cross-origin requests carry credentials (cookies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsMode {
    /// Send requests without cookies.
    #[default]
    Omit,
    /// Send stored cookies with requests.
    Include,
}

/// Retry and credentials settings for one media category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategorySettings {
    /// Attempts allowed after the first one fails.
    pub retry_attempts: u32,
    /// Delay before each retry, in milliseconds.
    pub retry_delay_ms: u64,
    /// Credentials mode passed to the transport.
    pub credentials: CredentialsMode,
}

impl Default for CategorySettings {
    fn default() -> Self {
        Self {
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            credentials: CredentialsMode::Omit,
        }
    }
}

impl CategorySettings {
    /// Returns the retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn validate(&self, category: MediaCategory) -> Result<(), ConfigError> {
        if self.retry_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::OutOfRange {
                field: format!("{category}.retry_attempts"),
                value: u64::from(self.retry_attempts),
                expected: "0..=10",
            });
        }
        if self.retry_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::OutOfRange {
                field: format!("{category}.retry_delay_ms"),
                value: self.retry_delay_ms,
                expected: "0..=60000",
            });
        }
        Ok(())
    }
}

/// Throughput sampler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputSettings {
    /// Samples kept per category (at least 1).
    pub history_capacity: usize,
}

impl Default for ThroughputSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// Complete loader configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Video segment settings.
    pub video: CategorySettings,
    /// Audio segment settings.
    pub audio: CategorySettings,
    /// Text segment settings.
    pub text: CategorySettings,
    /// Settings for everything else.
    pub other: CategorySettings,
    /// Throughput sampler settings.
    pub throughput: ThroughputSettings,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            video: CategorySettings::default(),
            audio: CategorySettings::default(),
            text: CategorySettings::default(),
            other: CategorySettings {
                retry_delay_ms: DEFAULT_OTHER_RETRY_DELAY_MS,
                ..CategorySettings::default()
            },
            throughput: ThroughputSettings::default(),
        }
    }
}

impl LoaderSettings {
    /// Returns the settings of one category.
    #[must_use]
    pub fn for_category(&self, category: MediaCategory) -> &CategorySettings {
        match category {
            MediaCategory::Video => &self.video,
            MediaCategory::Audio => &self.audio,
            MediaCategory::Text => &self.text,
            MediaCategory::Other => &self.other,
        }
    }

    /// Returns the settings of one category for modification.
    pub fn for_category_mut(&mut self, category: MediaCategory) -> &mut CategorySettings {
        match category {
            MediaCategory::Video => &mut self.video,
            MediaCategory::Audio => &mut self.audio,
            MediaCategory::Text => &mut self.text,
            MediaCategory::Other => &mut self.other,
        }
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for category in MediaCategory::ALL {
            self.for_category(category).validate(category)?;
        }
        if self.throughput.history_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "throughput.history_capacity".to_string(),
                value: 0,
                expected: "1..",
            });
        }
        Ok(())
    }

    /// Parses and validates settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or [`ConfigError::OutOfRange`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads, parses and validates a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// errors of [`from_json_str`](Self::from_json_str).
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&raw)?;
        debug!(path = %path.display(), "loaded loader settings");
        Ok(settings)
    }
}
