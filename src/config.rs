//! Configuration file management.
//!
//! Everything the engine needs (wallets, credentials, endpoints, policies) is
//! read once from a TOML file and handed to constructors explicitly.

use crate::domain::integration::IntegrationError;
use crate::domain::retry::RetryConfig;
use crate::domain::split::SplitPolicy;
use crate::domain::wallet::WalletId;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const ENDPOINT_MAX_LEN: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub split: SplitPolicy,
    #[serde(default)]
    pub wallets: WalletConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub partner: PartnerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Ambassador referral code to payout wallet.
    #[serde(default)]
    pub ambassadors: HashMap<String, WalletId>,
    #[serde(default)]
    pub log: LogConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Receives the platform maintenance share.
    #[serde(default = "default_platform_wallet")]
    pub platform: WalletId,
    /// Wallets that can never be registered by an ambassador, in addition
    /// to `platform`.
    #[serde(default)]
    pub reserved: Vec<WalletId>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            platform: default_platform_wallet(),
            reserved: Vec::new(),
        }
    }
}

impl WalletConfig {
    pub fn reserved_wallets(&self) -> Vec<WalletId> {
        let mut all = self.reserved.clone();
        all.push(self.platform.clone());
        all
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
}

/// How requests to the partner API are authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum PartnerAuth {
    ApiKey {
        api_key: String,
    },
    Bearer {
        bearer_token: String,
    },
    Basic {
        basic_username: String,
        basic_password: String,
    },
}

impl Default for PartnerAuth {
    fn default() -> Self {
        Self::ApiKey {
            api_key: String::new(),
        }
    }
}

/// Partner registration API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub sandbox_endpoint: Option<String>,
    #[serde(default = "default_true")]
    pub is_sandbox: bool,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(flatten)]
    pub auth: PartnerAuth,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Default for PartnerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            sandbox_endpoint: None,
            is_sandbox: true,
            method: HttpMethod::default(),
            auth: PartnerAuth::default(),
            timeout_secs: default_timeout_secs(),
            is_active: true,
        }
    }
}

impl PartnerConfig {
    /// Sandbox endpoint when sandboxing is on and one is configured.
    pub fn effective_endpoint(&self) -> &str {
        match (&self.sandbox_endpoint, self.is_sandbox) {
            (Some(sandbox), true) => sandbox,
            _ => &self.endpoint,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), IntegrationError> {
        if !self.is_active {
            return Err(IntegrationError::config("Integration is disabled"));
        }
        validate_endpoint(&self.endpoint)?;
        if let Some(sandbox) = &self.sandbox_endpoint {
            validate_endpoint(sandbox)?;
        }
        let missing = match &self.auth {
            PartnerAuth::ApiKey { api_key } => api_key.is_empty(),
            PartnerAuth::Bearer { bearer_token } => bearer_token.is_empty(),
            PartnerAuth::Basic {
                basic_username,
                basic_password,
            } => basic_username.is_empty() || basic_password.is_empty(),
        };
        if missing {
            return Err(IntegrationError::config(
                "Credentials are required for the selected auth type",
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> std::result::Result<(), IntegrationError> {
    let scheme_ok = endpoint.starts_with("https://") || endpoint.starts_with("http://");
    if !scheme_ok || endpoint.len() > ENDPOINT_MAX_LEN {
        return Err(IntegrationError::config(format!(
            "Invalid partner endpoint: {endpoint:?}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_platform_wallet() -> WalletId {
    WalletId::new("f9c7d1dd-9e52-4e81-8194-8b666f276405")
}

fn default_gateway_url() -> String {
    "https://sandbox.asaas.com/api/v3".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
