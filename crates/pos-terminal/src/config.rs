//! # Terminal Configuration
//!
//! Configuration for one checkout terminal.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     POS_BACKEND_URL=https://pos.example.com                            │
//! │     POS_TRANSACTION_POLICY=per_purchase                                │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/scanregister/terminal.toml (Linux)                       │
//! │     ~/Library/Application Support/com.scanregister.pos/terminal.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [backend]
//! base_url = "https://tech0-gen8-step4-pos-app-40.azurewebsites.net"
//! request_timeout_secs = 10
//!
//! [terminal]
//! operator_code = "EMP01"
//! store_code = "30"
//! terminal_no = "90"
//!
//! [checkout]
//! tax_rate_bps = 1000
//! auto_add = true
//! transaction_policy = "per_visit"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use pos_core::{TaxRate, TerminalIdentity, DEFAULT_TAX_RATE_BPS};

use crate::error::{TerminalError, TerminalResult};

// =============================================================================
// Transaction Policy
// =============================================================================

/// When the screen opens a new remote transaction.
///
/// ## Policy Comparison
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │                      Transaction Policy                                 │
/// │                                                                         │
/// │  PER_VISIT (Default)                 │  PER_PURCHASE                    │
/// │  ───────────────────                 │  ────────────                    │
/// │  • One transaction per screen        │  • Fresh transaction after       │
/// │    activation                        │    every successful purchase     │
/// │  • Every purchase on this screen     │  • Each purchase has its own     │
/// │    appends to the same id            │    server total                  │
/// │                                                                         │
/// │  mount ─► open ─► buy ─► buy         │  mount ─► open ─► buy ─► open    │
/// │            id=7    7      7          │            id=7    7      id=8   │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPolicy {
    /// Open once on mount and reuse the id for every purchase.
    #[default]
    PerVisit,

    /// Open a fresh transaction after each committed purchase.
    PerPurchase,
}

impl std::fmt::Display for TransactionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionPolicy::PerVisit => write!(f, "per_visit"),
            TransactionPolicy::PerPurchase => write!(f, "per_purchase"),
        }
    }
}

impl std::str::FromStr for TransactionPolicy {
    type Err = TerminalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per_visit" | "visit" | "session" => Ok(TransactionPolicy::PerVisit),
            "per_purchase" | "purchase" => Ok(TransactionPolicy::PerPurchase),
            other => Err(TerminalError::InvalidConfig(format!(
                "Unknown transaction policy: '{}'. Valid options: per_visit, per_purchase",
                other
            ))),
        }
    }
}

// =============================================================================
// Backend Settings
// =============================================================================

/// Where the transaction/product service lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the transaction service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Upper bound on any single remote call (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://tech0-gen8-step4-pos-app-40.azurewebsites.net".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Terminal Settings
// =============================================================================

/// Fixed identifiers stamped onto each new transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalSettings {
    #[serde(default = "default_operator_code")]
    pub operator_code: String,

    #[serde(default = "default_store_code")]
    pub store_code: String,

    #[serde(default = "default_terminal_no")]
    pub terminal_no: String,
}

fn default_operator_code() -> String {
    "EMP01".to_string()
}

fn default_store_code() -> String {
    "30".to_string()
}

fn default_terminal_no() -> String {
    "90".to_string()
}

impl Default for TerminalSettings {
    fn default() -> Self {
        TerminalSettings {
            operator_code: default_operator_code(),
            store_code: default_store_code(),
            terminal_no: default_terminal_no(),
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Checkout behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Tax applied to the authoritative total, in basis points.
    #[serde(default = "default_tax_rate")]
    pub tax_rate_bps: u32,

    /// Add a found product to the cart as soon as the lookup completes.
    /// When false the operator confirms with the "add" button.
    #[serde(default = "default_true")]
    pub auto_add: bool,

    /// When to open a fresh remote transaction.
    #[serde(default)]
    pub transaction_policy: TransactionPolicy,
}

fn default_tax_rate() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_true() -> bool {
    true
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            tax_rate_bps: default_tax_rate(),
            auto_add: true,
            transaction_policy: TransactionPolicy::default(),
        }
    }
}

// =============================================================================
// Main Terminal Configuration
// =============================================================================

/// Complete terminal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default)]
    pub backend: BackendSettings,

    #[serde(default)]
    pub terminal: TerminalSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,
}

impl TerminalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (terminal.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> TerminalResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading terminal config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load terminal config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> TerminalResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| TerminalError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TerminalError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| TerminalError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Terminal config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> TerminalResult<()> {
        let url = url::Url::parse(&self.backend.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(TerminalError::InvalidUrl(format!(
                "Backend URL must start with http:// or https://, got: {}",
                self.backend.base_url
            )));
        }

        if self.backend.request_timeout_secs == 0 {
            return Err(TerminalError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        for (field, value) in [
            ("operator_code", &self.terminal.operator_code),
            ("store_code", &self.terminal.store_code),
            ("terminal_no", &self.terminal.terminal_no),
        ] {
            if value.trim().is_empty() {
                return Err(TerminalError::InvalidConfig(format!("{} must not be empty", field)));
            }
        }

        if self.checkout.tax_rate_bps > 10_000 {
            return Err(TerminalError::InvalidConfig(
                "tax_rate_bps must be between 0 and 10000".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("POS_BACKEND_URL") {
            debug!(url = %url, "Overriding backend URL from environment");
            self.backend.base_url = url;
        }

        if let Ok(secs) = std::env::var("POS_REQUEST_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.backend.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid POS_REQUEST_TIMEOUT_SECS"),
            }
        }

        if let Ok(code) = std::env::var("POS_OPERATOR_CODE") {
            self.terminal.operator_code = code;
        }

        if let Ok(code) = std::env::var("POS_STORE_CODE") {
            self.terminal.store_code = code;
        }

        if let Ok(no) = std::env::var("POS_TERMINAL_NO") {
            self.terminal.terminal_no = no;
        }

        if let Ok(bps) = std::env::var("POS_TAX_RATE_BPS") {
            match bps.parse::<u32>() {
                Ok(b) => self.checkout.tax_rate_bps = b,
                Err(_) => warn!(value = %bps, "Ignoring invalid POS_TAX_RATE_BPS"),
            }
        }

        if let Ok(flag) = std::env::var("POS_AUTO_ADD") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.checkout.auto_add = true,
                "0" | "false" | "no" | "off" => self.checkout.auto_add = false,
                _ => warn!(value = %flag, "Ignoring invalid POS_AUTO_ADD"),
            }
        }

        if let Ok(policy) = std::env::var("POS_TRANSACTION_POLICY") {
            match policy.parse() {
                Ok(parsed) => {
                    debug!(policy = %policy, "Overriding transaction policy from environment");
                    self.checkout.transaction_policy = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring POS_TRANSACTION_POLICY"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "scanregister", "pos")
            .map(|dirs| dirs.config_dir().join("terminal.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the identifiers sent with each new transaction.
    pub fn identity(&self) -> TerminalIdentity {
        TerminalIdentity {
            operator_code: self.terminal.operator_code.clone(),
            store_code: self.terminal.store_code.clone(),
            terminal_no: self.terminal.terminal_no.clone(),
        }
    }

    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.checkout.tax_rate_bps)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout_secs)
    }

    pub fn transaction_policy(&self) -> TransactionPolicy {
        self.checkout.transaction_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "per_visit".parse::<TransactionPolicy>().unwrap(),
            TransactionPolicy::PerVisit
        );
        assert_eq!(
            "PER_PURCHASE".parse::<TransactionPolicy>().unwrap(),
            TransactionPolicy::PerPurchase
        );
        assert!("sometimes".parse::<TransactionPolicy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = TerminalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.terminal.operator_code, "EMP01");
        assert_eq!(config.terminal.store_code, "30");
        assert_eq!(config.terminal.terminal_no, "90");
        assert_eq!(config.tax_rate().bps(), 1000);
        assert!(config.checkout.auto_add);
        assert_eq!(config.transaction_policy(), TransactionPolicy::PerVisit);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_config_validation() {
        let mut config = TerminalConfig::default();

        config.backend.base_url = "ftp://files.example.com".into();
        assert!(config.validate().is_err());

        config.backend.base_url = "not a url".into();
        assert!(config.validate().is_err());

        config.backend.base_url = "http://localhost:8000".into();
        assert!(config.validate().is_ok());

        config.backend.request_timeout_secs = 0;
        assert!(config.validate().is_err());
        config.backend.request_timeout_secs = 5;

        config.terminal.store_code = "  ".into();
        assert!(config.validate().is_err());
        config.terminal.store_code = "30".into();

        config.checkout.tax_rate_bps = 20_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TerminalConfig = toml::from_str(
            r#"
            [checkout]
            auto_add = false
            transaction_policy = "per_purchase"
            "#,
        )
        .unwrap();

        assert!(!config.checkout.auto_add);
        assert_eq!(config.transaction_policy(), TransactionPolicy::PerPurchase);
        assert_eq!(config.checkout.tax_rate_bps, 1000);
        assert_eq!(config.terminal.operator_code, "EMP01");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "pos-terminal-config-{}.toml",
            uuid::Uuid::new_v4()
        ));

        let mut config = TerminalConfig::default();
        config.backend.base_url = "http://127.0.0.1:9000".into();
        config.terminal.terminal_no = "12".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[backend]"));
        assert!(contents.contains("[checkout]"));

        let loaded: TerminalConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.backend.base_url, "http://127.0.0.1:9000");
        assert_eq!(loaded.terminal.terminal_no, "12");

        let _ = std::fs::remove_file(path);
    }
}
