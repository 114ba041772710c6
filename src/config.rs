//! Configuration loaded from `~/.config/linkparse/config.toml`.
//!
//! The loaded [`Config`] is an immutable snapshot: parsers copy what they
//! need at construction and never re-read it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::Platform;

pub const DEFAULT_CACHE_CAPACITY: usize = 50;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_FXTWITTER_API: &str = "https://api.fxtwitter.com";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platforms whose parsers are never registered.
    pub disabled_platforms: Vec<Platform>,
    /// Maximum number of cached results. `0` disables caching.
    pub cache_capacity: usize,
    /// Request timeout used when a platform does not set its own.
    pub timeout_secs: u64,
    pub xiaohongshu: XiaohongshuConfig,
    pub twitter: TwitterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            disabled_platforms: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            xiaohongshu: XiaohongshuConfig::default(),
            twitter: TwitterConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XiaohongshuConfig {
    /// Raw `Cookie` header value copied from a logged-in browser session.
    pub cookie: Option<String>,
    /// Send the cookie and route every link through the `/explore/` page.
    pub use_cookie: bool,
    pub timeout_secs: Option<u64>,
}

impl XiaohongshuConfig {
    /// Cookie to send, only when cookie mode is on and a cookie is set.
    pub fn active_cookie(&self) -> Option<&str> {
        if !self.use_cookie {
            return None;
        }
        self.cookie.as_deref().filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Base URL of the FxTwitter-compatible status API.
    pub api_base: String,
    pub timeout_secs: Option<u64>,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_FXTWITTER_API.to_string(),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Whether `platform` was disabled by the operator.
    pub fn is_disabled(&self, platform: Platform) -> bool {
        self.disabled_platforms.contains(&platform)
    }

    /// Effective request timeout for `platform`.
    ///
    /// A zero timeout would fail every request, so `0` means "unset": a
    /// platform falls back to the global value, the global value to
    /// [`DEFAULT_TIMEOUT_SECS`].
    pub fn timeout_for(&self, platform: Platform) -> Duration {
        let platform_secs = match platform {
            Platform::Xiaohongshu => self.xiaohongshu.timeout_secs,
            Platform::Twitter => self.twitter.timeout_secs,
        };
        let secs = platform_secs
            .filter(|s| *s > 0)
            .or(Some(self.timeout_secs).filter(|s| *s > 0))
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid linkparse configuration")
    }

    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file yields [`Config::default`]; an explicitly given
    /// path must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("linkparse")
        .join("config.toml")
}
