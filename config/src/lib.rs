//! Configuration for the emergency-proposal subsystem.
//!
//! Read from `~/.council/config.toml` (or the path in `COUNCIL_CONFIG`).
//! Every section is optional; a missing file means defaults everywhere.
//!
//! ```toml
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 250
//! max_delay_ms = 4000
//! jitter_factor = 0.25
//!
//! [registry]
//! staleness_secs = 30
//!
//! [content_store]
//! api_url = "http://127.0.0.1:5001"
//! gateway_url = "https://ipfs.io"
//! api_token = "${PINNING_TOKEN}"
//! timeout_secs = 20
//!
//! [keys]
//! verify_determinism = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use council_utils::RetryPolicy;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "COUNCIL_CONFIG";

const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080";

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct CouncilConfig {
    pub retry: Option<RetryConfig>,
    pub registry: Option<RegistryConfig>,
    pub content_store: Option<ContentStoreConfig>,
    pub keys: Option<KeysConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Backoff for remote reads.
#[derive(Debug, Default, Deserialize)]
pub struct RetryConfig {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter_factor: Option<f64>,
}

/// Registry cache settings.
#[derive(Debug, Default, Deserialize)]
pub struct RegistryConfig {
    /// Seconds before a cached registry read must be refetched.
    pub staleness_secs: Option<u64>,
}

/// HTTP content store (IPFS API + gateway).
#[derive(Default, Deserialize)]
pub struct ContentStoreConfig {
    pub api_url: Option<String>,
    pub gateway_url: Option<String>,
    /// Bearer token for pinning services. Supports `${ENV_VAR}` expansion.
    pub api_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking the pinning token in logs.
impl std::fmt::Debug for ContentStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStoreConfig")
            .field("api_url", &self.api_url)
            .field("gateway_url", &self.gateway_url)
            .field(
                "api_token",
                &if self.api_token.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Key derivation settings.
#[derive(Debug, Deserialize)]
pub struct KeysConfig {
    /// Sign twice and compare before registering a derived key on-chain.
    #[serde(default = "default_true")]
    pub verify_determinism: bool,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            verify_determinism: true,
        }
    }
}

impl CouncilConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        Self::parse(&content).map_err(|err| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, err);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            }
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Retry policy with config overrides applied over the defaults.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(retry) = &self.retry {
            if let Some(max_retries) = retry.max_retries {
                policy.max_retries = max_retries;
            }
            if let Some(ms) = retry.initial_delay_ms {
                policy.initial_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_delay_ms {
                policy.max_delay = Duration::from_millis(ms);
            }
            if let Some(jitter) = retry.jitter_factor {
                policy.jitter_factor = jitter.clamp(0.0, 1.0);
            }
        }
        if let Some(secs) = self.registry.as_ref().and_then(|r| r.staleness_secs) {
            policy.staleness_bound = Duration::from_secs(secs);
        }
        policy
    }

    #[must_use]
    pub fn content_api_url(&self) -> String {
        self.content_store
            .as_ref()
            .and_then(|c| c.api_url.as_deref())
            .map_or_else(|| DEFAULT_API_URL.to_string(), expand_env_vars)
    }

    #[must_use]
    pub fn content_gateway_url(&self) -> String {
        self.content_store
            .as_ref()
            .and_then(|c| c.gateway_url.as_deref())
            .map_or_else(|| DEFAULT_GATEWAY_URL.to_string(), expand_env_vars)
    }

    /// Pinning token after env expansion. Empty expansions count as unset.
    #[must_use]
    pub fn content_api_token(&self) -> Option<String> {
        self.content_store
            .as_ref()
            .and_then(|c| c.api_token.as_deref())
            .map(expand_env_vars)
            .filter(|token| !token.trim().is_empty())
    }

    #[must_use]
    pub fn content_timeout(&self) -> Duration {
        let secs = self
            .content_store
            .as_ref()
            .and_then(|c| c.timeout_secs)
            .unwrap_or(20);
        Duration::from_secs(secs)
    }

    #[must_use]
    pub fn verify_key_determinism(&self) -> bool {
        self.keys.as_ref().is_none_or(|k| k.verify_determinism)
    }
}

/// Replace `${VAR}` references with their environment values.
///
/// Unset variables expand to the empty string; an unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".council").join("config.toml"))
}
