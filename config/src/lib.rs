//! Hongbao Configuration
//!
//! Shared configuration crate for the CLI, the dev registry and the
//! packet lifecycle.
//!
//! Handles loading configuration from:
//! 1. HB_CONFIG env var (explicit path)
//! 2. ./hongbao.toml (current directory)
//! 3. ~/.hongbao/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<HongbaoConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const LOCAL_CONFIG_FILE_NAME: &str = "hongbao.toml";
const CONFIG_DIR_NAME: &str = ".hongbao";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_REGISTRY_URL: &str = "http://127.0.0.1:8787";
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 10;
const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8899";
const DEFAULT_COMMITMENT: &str = "confirmed";
const DEFAULT_LEDGER_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LINK_BASE_URL: &str = "http://localhost:3000/";
const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DEV_BIND: &str = "127.0.0.1:8787";
const DEFAULT_KEYPER_THRESHOLD: usize = 2;
const DEFAULT_KEYPERS: usize = 3;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HongbaoConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub lifecycle: LifecycleTomlConfig,
    #[serde(default)]
    pub dev_registry: DevRegistryConfig,
}

/// Key-release registry endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// Server-side time-lock endpoint for first-generation links.
    /// Falls back to `url` when unset.
    #[serde(default)]
    pub legacy_url: Option<String>,
    #[serde(default = "default_registry_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.into(),
            legacy_url: None,
            timeout_secs: DEFAULT_REGISTRY_TIMEOUT_SECS,
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn legacy_url(&self) -> &str {
        self.legacy_url.as_deref().unwrap_or(&self.url)
    }
}

fn default_registry_url() -> String {
    DEFAULT_REGISTRY_URL.into()
}
fn default_registry_timeout() -> u64 {
    DEFAULT_REGISTRY_TIMEOUT_SECS
}

/// Ledger (Solana RPC) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// processed | confirmed | finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
    /// Sender keypair file used to fund packets
    #[serde(default)]
    pub keypair_path: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.into(),
            commitment: DEFAULT_COMMITMENT.into(),
            timeout_secs: DEFAULT_LEDGER_TIMEOUT_SECS,
            keypair_path: None,
        }
    }
}

impl LedgerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.into()
}
fn default_commitment() -> String {
    DEFAULT_COMMITMENT.into()
}
fn default_ledger_timeout() -> u64 {
    DEFAULT_LEDGER_TIMEOUT_SECS
}

/// Shareable link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_link_base_url")]
    pub base_url: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LINK_BASE_URL.into(),
        }
    }
}

fn default_link_base_url() -> String {
    DEFAULT_LINK_BASE_URL.into()
}

/// Lifecycle configuration (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleTomlConfig {
    /// Upper bound on every registry and ledger call
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for LifecycleTomlConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}

impl LifecycleTomlConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

fn default_call_timeout() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}

/// In-process key-release registry (`hongbao registry`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevRegistryConfig {
    #[serde(default = "default_dev_bind")]
    pub bind: String,
    #[serde(default = "default_keyper_threshold")]
    pub threshold: usize,
    #[serde(default = "default_keypers")]
    pub keypers: usize,
}

impl Default for DevRegistryConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_DEV_BIND.into(),
            threshold: DEFAULT_KEYPER_THRESHOLD,
            keypers: DEFAULT_KEYPERS,
        }
    }
}

fn default_dev_bind() -> String {
    DEFAULT_DEV_BIND.into()
}
fn default_keyper_threshold() -> usize {
    DEFAULT_KEYPER_THRESHOLD
}
fn default_keypers() -> usize {
    DEFAULT_KEYPERS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparsable {}={}", key, v),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl HongbaoConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::read(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn read(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check HB_CONFIG env var
        if let Ok(path) = env::var("HB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("HB_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./hongbao.toml (current directory)
        let local_path = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.hongbao/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Registry
        env_string("HB_REGISTRY_URL", &mut self.registry.url);
        env_option_string("HB_LEGACY_REGISTRY_URL", &mut self.registry.legacy_url);
        env_parse("HB_REGISTRY_TIMEOUT_SECS", &mut self.registry.timeout_secs);

        // Ledger
        env_string("SOLANA_RPC_URL", &mut self.ledger.rpc_url);
        env_parse("HB_LEDGER_TIMEOUT_SECS", &mut self.ledger.timeout_secs);
        env_option_string("HB_KEYPAIR", &mut self.ledger.keypair_path);

        // Link
        env_string("HB_LINK_BASE_URL", &mut self.link.base_url);

        // Lifecycle
        env_parse("HB_CALL_TIMEOUT_SECS", &mut self.lifecycle.call_timeout_secs);

        // Dev registry
        env_string("HB_DEV_REGISTRY_BIND", &mut self.dev_registry.bind);
        env_parse("HB_KEYPERS", &mut self.dev_registry.keypers);
        env_parse("HB_KEYPER_THRESHOLD", &mut self.dev_registry.threshold);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.registry.legacy_url = Some(DEFAULT_REGISTRY_URL.into());
        sample.ledger.keypair_path = Some("~/.config/solana/hongbao/id.json".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Render this configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static HongbaoConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static HongbaoConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: HongbaoConfig) -> Result<(), HongbaoConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `HongbaoConfig::global()`.
#[inline]
pub fn global_config() -> &'static HongbaoConfig {
    HongbaoConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HongbaoConfig::default();
        assert_eq!(config.registry.url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.registry.legacy_url(), DEFAULT_REGISTRY_URL);
        assert_eq!(config.ledger.commitment, DEFAULT_COMMITMENT);
        assert_eq!(config.dev_registry.threshold, DEFAULT_KEYPER_THRESHOLD);
        assert_eq!(config.lifecycle.call_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_generate_sample() {
        let sample = HongbaoConfig::generate_sample();
        assert!(sample.contains("[registry]"));
        assert!(sample.contains("[ledger]"));
        assert!(sample.contains("[link]"));
        assert!(sample.contains("[lifecycle]"));
        assert!(sample.contains("[dev_registry]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = HongbaoConfig::generate_sample();
        let parsed: HongbaoConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.registry.url, DEFAULT_REGISTRY_URL);
        assert!(parsed.ledger.keypair_path.is_some());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: HongbaoConfig = toml::from_str(
            r#"
            [registry]
            url = "https://registry.example"
            legacy_url = "https://legacy.example"

            [dev_registry]
            keypers = 5
            "#,
        )
        .unwrap();
        assert_eq!(parsed.registry.url, "https://registry.example");
        assert_eq!(parsed.registry.legacy_url(), "https://legacy.example");
        assert_eq!(parsed.registry.timeout_secs, DEFAULT_REGISTRY_TIMEOUT_SECS);
        assert_eq!(parsed.dev_registry.keypers, 5);
        assert_eq!(parsed.dev_registry.threshold, DEFAULT_KEYPER_THRESHOLD);
        assert_eq!(parsed.link.base_url, DEFAULT_LINK_BASE_URL);
    }
}
