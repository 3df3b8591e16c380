//! Client configuration
//!
//! Settings are read from a TOML file. Every field is optional; a missing file yields
//! the defaults.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Environment variable naming the settings file
pub const CONFIG_ENV_VAR: &str = "D1_CLIENT_CONFIG";
/// Environment variable overriding `cn_base_url`
pub const CN_BASE_URL_ENV_VAR: &str = "D1_CN_BASE_URL";
/// Settings file used when neither a path nor the environment names one
pub const DEFAULT_CONFIG_PATH: &str = "config/d1_client.toml";

pub const DEFAULT_CN_BASE_URL: &str = "https://cn.dataone.org/cn";

// Named per-operation timeout properties
pub const MN_CREATE_TIMEOUT: &str = "D1Client.MNode.create.timeout";
pub const MN_UPDATE_TIMEOUT: &str = "D1Client.MNode.update.timeout";
pub const MN_REPLICATE_TIMEOUT: &str = "D1Client.MNode.replicate.timeout";
pub const D1NODE_GET_TIMEOUT: &str = "D1Client.D1Node.get.timeout";
pub const CN_CREATE_TIMEOUT: &str = "D1Client.CNode.create.timeout";

/// Everything the client reads from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of the Coordinating Node environment
    pub cn_base_url: String,
    /// Key of a registered alternate CN constructor
    pub cn_factory: Option<String>,
    /// Timeout in milliseconds for calls without a more specific one
    pub default_timeout_ms: Option<i64>,
    /// Named per-operation timeouts in milliseconds
    pub timeouts: HashMap<String, i64>,
    pub local_cache_enabled: bool,
    pub local_cache_capacity: usize,
    /// Static headers sent with every request
    pub headers: BTreeMap<String, String>,
    /// Number of threads whose latest request is kept for diagnostics
    pub diagnostics_capacity: usize,
    /// PEM bundle used for the default session's client certificate
    pub certificate_path: Option<PathBuf>,
    /// Subject the default certificate is presented under
    pub certificate_subject: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "User-Agent".to_string(),
            format!("d1_client/{}", env!("CARGO_PKG_VERSION")),
        );
        Self {
            cn_base_url: DEFAULT_CN_BASE_URL.to_string(),
            cn_factory: None,
            default_timeout_ms: None,
            timeouts: HashMap::new(),
            local_cache_enabled: false,
            local_cache_capacity: 100,
            headers,
            diagnostics_capacity: crate::rest::DEFAULT_DIAGNOSTICS_CAPACITY,
            certificate_path: None,
            certificate_subject: None,
        }
    }
}

impl ClientSettings {
    pub fn with_cn_base_url(mut self, url: &str) -> Self {
        self.cn_base_url = url.to_string();
        self
    }

    pub fn with_cn_factory(mut self, key: &str) -> Self {
        self.cn_factory = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, property: &str, timeout_ms: i64) -> Self {
        self.timeouts.insert(property.to_string(), timeout_ms);
        self
    }

    pub fn with_default_timeout(mut self, timeout_ms: i64) -> Self {
        self.default_timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_local_cache(mut self, capacity: usize) -> Self {
        self.local_cache_enabled = true;
        self.local_cache_capacity = capacity;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Timeout configured for a named operation property
    pub fn timeout(&self, property: &str) -> Option<i64> {
        self.timeouts.get(property).copied()
    }

    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Check values that would otherwise fail on first use
    pub fn validate(&self) -> Result<(), ClientError> {
        reqwest::Url::parse(&self.cn_base_url)
            .map_err(|e| ClientError::Configuration(format!("cn_base_url '{}': {}", self.cn_base_url, e)))?;
        if self.local_cache_enabled && self.local_cache_capacity == 0 {
            return Err(ClientError::Configuration(
                "local_cache_capacity must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ClientError> {
        toml::from_str(text).map_err(|e| ClientError::Configuration(e.to_string()))
    }
}

/// Load settings from `path`, or the file named by `D1_CLIENT_CONFIG`, or
/// `config/d1_client.toml`.
///
/// A missing file yields [`ClientSettings::default`]. `D1_CN_BASE_URL` overrides the
/// CN base URL either way.
pub fn load_settings(path: Option<&str>) -> Result<ClientSettings, ClientError> {
    let config_path = path
        .map(|p| p.to_string())
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let settings = match std::fs::read_to_string(&config_path) {
        Ok(text) => match ClientSettings::from_toml(&text) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to parse client settings {}: {}", config_path, e);
                return Err(e);
            }
        },
        Err(_) => {
            log::debug!("No client settings at {}, using defaults", config_path);
            ClientSettings::default()
        }
    };

    let settings = apply_overrides(settings, std::env::var(CN_BASE_URL_ENV_VAR).ok());
    settings.validate()?;
    Ok(settings)
}

fn apply_overrides(mut settings: ClientSettings, cn_base_url: Option<String>) -> ClientSettings {
    if let Some(url) = cn_base_url.filter(|u| !u.trim().is_empty()) {
        settings.cn_base_url = url.trim().to_string();
    }
    settings
}
