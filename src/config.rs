use std::path::{Path, PathBuf};
use std::time::Duration;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::client::ConfirmationPolicy;
use crate::error::{LuminError, Result};
use crate::units::parse_address;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LuminConfig {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub contract: ContractConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
    /// Gas limit for transactions; the node estimates when unset.
    #[serde(default)]
    pub gas: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContractConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default = "default_abi_path")]
    pub abi_path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

fn default_receipt_poll_ms() -> u64 {
    500
}

fn default_abi_path() -> PathBuf {
    PathBuf::from("build/contracts/EnergyManagement.json")
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("application.log"))
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            request_timeout_secs: default_request_timeout_secs(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            receipt_poll_ms: default_receipt_poll_ms(),
            gas: None,
        }
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            abi_path: default_abi_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_file: default_log_file(),
        }
    }
}

impl NodeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn confirmation(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            timeout: Duration::from_secs(self.receipt_timeout_secs),
            poll_interval: Duration::from_millis(self.receipt_poll_ms.max(1)),
        }
    }
}

impl ContractConfig {
    pub fn address(&self) -> Result<Address> {
        if self.address.trim().is_empty() {
            return Err(LuminError::Config("contract.address is not set".to_string()));
        }
        parse_address(&self.address).map_err(|e| LuminError::Config(format!("contract.address: {}", e)))
    }
}

impl LuminConfig {
    /// Reads `path`, or writes a default file there when it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| LuminError::Config(format!("Error reading {}: {}", path.display(), e)))?;
            Self::from_toml(&s)
                .map_err(|e| LuminError::Config(format!("Error parsing {}: {}", path.display(), e)))
        } else {
            eprintln!("Config file not found at '{}'. Creating default.", path.display());
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                let _ = std::fs::write(path, s);
            }
            Ok(config)
        }
    }

    pub fn from_toml(s: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
}
