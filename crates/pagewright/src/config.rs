//! Runner configuration.
//!
//! Settings are layered with figment, lowest priority first:
//!
//! 1. built-in defaults
//! 2. `pagewright.toml` in the working directory, or an explicit file
//! 3. `PAGEWRIGHT_*` environment variables (`PAGEWRIGHT_ENV=hml`,
//!    `PAGEWRIGHT_BASE_URL=http://localhost:8080`, ...)
//!
//! The target site is picked by environment name (`dev`, `hml`, `prod`) unless
//! `base_url` is set, in which case it always wins.

use crate::browser::TestBrowserConfig;
use crate::evidence::EvidenceService;
use figment::{
    providers::{Env, Format as _, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE: &str = "pagewright.toml";

/// Prefix of environment variables that override the config file.
pub const ENV_PREFIX: &str = "PAGEWRIGHT_";

/// Worker id used when tests are not sharded.
pub const LOCAL_WORKER: &str = "local";

/// Configuration problems, reported before any browser is started.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The selected environment has no URL mapping.
    #[error("unknown environment '{name}', expected one of: {known}")]
    UnknownEnvironment {
        /// Requested environment name
        name: String,
        /// Comma-separated list of configured environments
        known: String,
    },

    /// Neither an explicit base URL nor a non-empty mapping was found.
    #[error("no base URL configured for environment '{0}'")]
    MissingBaseUrl(String),

    /// A setting could not be parsed or is out of range.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the offending setting
        field: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Everything a test run needs to know before launching the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Target environment name, matched case-insensitively.
    pub env: String,
    /// Explicit base URL. Takes priority over `environments`.
    pub base_url: Option<String>,
    /// Environment name to base URL.
    pub environments: BTreeMap<String, String>,
    /// Root of the evidence tree.
    pub evidence_dir: PathBuf,
    /// Dump console messages when a test fails.
    pub capture_console: bool,
    /// Export the action trace when a test fails.
    pub capture_trace: bool,
    /// Run Chrome without a window.
    pub headless: bool,
    /// Browser window size as `[width, height]`.
    pub window_size: [u32; 2],
    /// Timeout for waits, actions and assertions called without one.
    pub default_timeout_ms: u64,
    /// Interval between condition checks.
    pub poll_interval_ms: u64,
    /// Shard identifier used in evidence names.
    pub worker_id: Option<String>,
    /// Log level for this crate when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let environments = ["dev", "hml", "prod"]
            .into_iter()
            .map(|name| (name.to_string(), "https://www.google.com".to_string()))
            .collect();

        Self {
            env: "dev".to_string(),
            base_url: None,
            environments,
            evidence_dir: PathBuf::from("evidence"),
            capture_console: true,
            capture_trace: true,
            headless: true,
            window_size: [1920, 1080],
            default_timeout_ms: 30_000,
            poll_interval_ms: 100,
            worker_id: None,
            log_level: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Loads defaults, then `config_path` (or `pagewright.toml` when it exists),
    /// then `PAGEWRIGHT_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if a source has the wrong shape or a timing
    /// value is zero.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let config_file = config_path.map(Path::to_path_buf).or_else(|| {
            let default_path = Path::new(CONFIG_FILE);
            default_path.exists().then(|| default_path.to_path_buf())
        });
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Self = figment.extract().map_err(|e| ConfigError::InvalidValue {
            field: if e.path.is_empty() {
                "configuration".to_string()
            } else {
                e.path.join(".")
            },
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "default_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the site under test.
    ///
    /// # Errors
    ///
    /// `UnknownEnvironment` if `env` has no mapping and no explicit URL is
    /// set; `MissingBaseUrl` if the mapping is empty.
    pub fn resolve_base_url(&self) -> Result<BaseUrl, ConfigError> {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(BaseUrl::new(url));
        }

        let env = self.env.to_lowercase();
        let url = self
            .environments
            .get(&env)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: env.clone(),
                known: self
                    .environments
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        if url.trim().is_empty() {
            return Err(ConfigError::MissingBaseUrl(env));
        }
        Ok(BaseUrl::new(url))
    }

    /// Shard identifier, `local` when unset.
    #[must_use]
    pub fn worker_id(&self) -> &str {
        self.worker_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(LOCAL_WORKER)
    }

    /// `default_timeout_ms` as a duration.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// `poll_interval_ms` as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Browser launch settings derived from this config.
    #[must_use]
    pub fn browser(&self) -> TestBrowserConfig {
        let config = TestBrowserConfig::new().with_window_size(self.window_size[0], self.window_size[1]);
        if self.headless {
            config
        } else {
            config.visible()
        }
    }

    /// Evidence service rooted at `evidence_dir`.
    #[must_use]
    pub fn evidence(&self) -> EvidenceService {
        EvidenceService::new(&self.evidence_dir)
            .with_console_capture(self.capture_console)
            .with_trace_capture(self.capture_trace)
    }
}

/// Root URL of the site under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    /// Wraps a URL, dropping trailing slashes.
    pub fn new(url: impl AsRef<str>) -> Self {
        Self(url.as_ref().trim().trim_end_matches('/').to_string())
    }

    /// The URL without a trailing slash.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves `path` against the base. Absolute URLs pass through.
    ///
    /// ```
    /// # use pagewright::BaseUrl;
    /// let base = BaseUrl::new("http://localhost:3000/");
    /// assert_eq!(base.join("/app/login"), "http://localhost:3000/app/login");
    /// assert_eq!(base.join("https://other.test/"), "https://other.test/");
    /// ```
    #[must_use]
    pub fn join(&self, path: &str) -> String {
        if path.contains("://") || path.starts_with("data:") || path.starts_with("about:") {
            return path.to_string();
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{}/", self.0)
        } else {
            format!("{}/{path}", self.0)
        }
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
