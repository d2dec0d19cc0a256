use crate::Result;
use crate::facts::DEFAULT_API_BASE_URL;
use crate::scoring::ScoringWeights;
use camino::Utf8Path;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Configuration file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "gh-census.toml";

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: u8 = 100;

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_owned()
}

const fn default_rate_limit_per_window() -> u32 {
    5000
}

const fn default_rate_limit_window_secs() -> u64 {
    3600
}

const fn default_max_wait_secs() -> u64 {
    900
}

const fn default_max_retries() -> u32 {
    4
}

const fn default_backoff_base_ms() -> u64 {
    500
}

const fn default_backoff_max_ms() -> u64 {
    30_000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_page_size() -> u8 {
    MAX_PAGE_SIZE
}

const fn default_max_pages() -> u32 {
    100
}

const fn default_fetch_readme() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root of the GitHub REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Capacity of the request budget
    #[serde(default = "default_rate_limit_per_window")]
    pub rate_limit_per_window: u32,

    /// Time over which the request budget fully refills
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,

    /// Ceiling on rate-limit waits for a single request
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Attempts per request for transient failures, counting the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff step
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Cap on the backoff between attempts
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Repositories requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Pagination stops after this many pages
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Whether to check each repository for a README
    #[serde(default = "default_fetch_readme")]
    pub fetch_readme: bool,

    #[serde(default)]
    pub scoring_weights: ScoringWeights,
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `gh-census.toml` in `base_dir` is used if present.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_owned(), text)
        } else {
            let path = base_dir.join(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).into_app_err_with(|| format!("api_base_url '{}' is not a valid URL", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(app_err!("api_base_url must use http or https, got '{}'", url.scheme()));
        }

        if self.rate_limit_per_window == 0 {
            return Err(app_err!("rate_limit_per_window must be at least 1"));
        }

        if self.rate_limit_window_secs == 0 {
            return Err(app_err!("rate_limit_window_secs must be at least 1"));
        }

        if self.max_retries == 0 {
            return Err(app_err!("max_retries must be at least 1"));
        }

        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(app_err!(
                "backoff_max_ms ({}) must not be less than backoff_base_ms ({})",
                self.backoff_max_ms,
                self.backoff_base_ms
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(app_err!("request_timeout_secs must be at least 1"));
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(app_err!("page_size must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size));
        }

        if self.max_pages == 0 {
            return Err(app_err!("max_pages must be at least 1"));
        }

        self.scoring_weights.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
