//! Provider configuration
//!
//! All settings are fixed when a provider is constructed. Nothing is read from
//! the process environment here; the binary layers flags and env vars on top
//! of an optional TOML file and hands the result to the provider.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_EXECUTABLE: &str = "filecoin-pin";
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_VERSION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Public gateways tried in this order when retrieving content.
pub const DEFAULT_GATEWAYS: [&str; 4] = [
    "https://ipfs.io",
    "https://gateway.pinata.cloud",
    "https://cloudflare-ipfs.com",
    "https://dweb.link",
];

/// Settings for the filecoin-pin backed provider
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Path to (or name of) the filecoin-pin executable
    pub executable_path: PathBuf,
    /// Pass `--auto-fund` so the tool tops up payment runway before uploading
    pub auto_fund: bool,
    /// Pass `--bare` to add the file without a directory wrapper
    pub bare: bool,
    /// Pass `--verbose` to the tool
    pub verbose: bool,
    /// Signing key handed to the tool as `--private-key`
    #[serde(skip_serializing)]
    pub credential: Option<String>,
    /// Upper bound on a single `add` invocation
    pub upload_timeout_secs: u64,
    /// Upper bound on the `--version` probe run at construction
    pub version_timeout_secs: u64,
    pub retrieval: RetrievalConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            executable_path: PathBuf::from(DEFAULT_EXECUTABLE),
            auto_fund: true,
            bare: false,
            verbose: false,
            credential: None,
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            version_timeout_secs: DEFAULT_VERSION_TIMEOUT_SECS,
            retrieval: RetrievalConfig::default(),
        }
    }
}

// The credential must never end up in logs.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("executable_path", &self.executable_path)
            .field("auto_fund", &self.auto_fund)
            .field("bare", &self.bare)
            .field("verbose", &self.verbose)
            .field(
                "credential",
                &self.credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field("upload_timeout_secs", &self.upload_timeout_secs)
            .field("version_timeout_secs", &self.version_timeout_secs)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

impl ProviderConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| Error::ConfigError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<()> {
        if self.executable_path.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "executablePath must not be empty".to_string(),
            ));
        }
        if self.upload_timeout_secs == 0 || self.version_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.credential, Some(key) if key.trim().is_empty()) {
            return Err(Error::ConfigError(
                "credential must not be blank when set".to_string(),
            ));
        }
        self.retrieval.validate()
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_secs(self.version_timeout_secs)
    }
}

/// Gateway fallback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Gateway base URLs, tried in order. Content is fetched from `<base>/ipfs/<cid>`.
    pub gateways: Vec<String>,
    /// Per-gateway request timeout
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            timeout_secs: DEFAULT_GATEWAY_TIMEOUT_SECS,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::ConfigError(
                "gateway timeout must be greater than zero".to_string(),
            ));
        }
        if self.gateways.is_empty() {
            return Err(Error::ConfigError(
                "at least one gateway is required".to_string(),
            ));
        }
        for gateway in &self.gateways {
            let url = Url::parse(gateway)
                .map_err(|e| Error::ConfigError(format!("Invalid gateway URL {gateway}: {e}")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::ConfigError(format!(
                    "Gateway {gateway} must use http or https"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
