//! Contract ABI loading from a Truffle build artifact.

use std::path::Path;

use ethers::abi::Abi;
use serde_json::Value;

use crate::error::{LuminError, Result};

/// Accepts a full artifact (`{"abi": [...], ...}`) or a bare ABI array.
pub fn abi_from_json(json: &str) -> Result<Abi> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| LuminError::Config(format!("contract artifact is not JSON: {}", e)))?;
    let abi = match value {
        Value::Object(mut artifact) => artifact
            .remove("abi")
            .ok_or_else(|| LuminError::Config("contract artifact has no \"abi\" entry".to_string()))?,
        other => other,
    };
    serde_json::from_value(abi).map_err(|e| LuminError::Config(format!("invalid contract ABI: {}", e)))
}

pub fn load_abi(path: &Path) -> Result<Abi> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| LuminError::Config(format!("Error reading {}: {}", path.display(), e)))?;
    abi_from_json(&json).map_err(|e| match e {
        LuminError::Config(msg) => LuminError::Config(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Fails with the first function in `names` the ABI does not declare.
pub fn require_functions(abi: &Abi, names: &[&str]) -> Result<()> {
    match names.iter().find(|name| !abi.functions.contains_key(**name)) {
        Some(missing) => Err(LuminError::Config(format!(
            "contract ABI is missing function '{}'",
            missing
        ))),
        None => Ok(()),
    }
}

/// The EnergyManagement ABI subset the client uses, as Truffle emits it.
#[cfg(test)]
pub const TEST_ABI: &str = r#"[
  {"type": "event", "name": "EnergySold", "anonymous": false, "inputs": [
    {"name": "seller", "type": "address", "indexed": true},
    {"name": "amount", "type": "uint256", "indexed": false}
  ]},
  {"type": "function", "name": "users", "stateMutability": "view",
   "inputs": [{"name": "", "type": "address"}],
   "outputs": [
    {"name": "name", "type": "string"},
    {"name": "fullName", "type": "string"},
    {"name": "passwordHash", "type": "bytes32"},
    {"name": "userAddress", "type": "address"},
    {"name": "isManager", "type": "bool"}
  ]},
  {"type": "function", "name": "displayPanels", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "tuple[]", "components": [
    {"name": "id", "type": "uint256"},
    {"name": "capacity", "type": "uint256"},
    {"name": "location", "type": "string"},
    {"name": "owner", "type": "address"},
    {"name": "installedAt", "type": "uint256"},
    {"name": "energyBalance", "type": "uint256"},
    {"name": "efficiency", "type": "uint256"}
  ]}]},
  {"type": "function", "name": "displayManagedPanels", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "tuple[]", "components": [
    {"name": "id", "type": "uint256"},
    {"name": "capacity", "type": "uint256"},
    {"name": "location", "type": "string"},
    {"name": "owner", "type": "address"},
    {"name": "installedAt", "type": "uint256"},
    {"name": "energyBalance", "type": "uint256"},
    {"name": "efficiency", "type": "uint256"}
  ]}]},
  {"type": "function", "name": "getAvailableEnergySales", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "tuple[]", "components": [
    {"name": "creator", "type": "string"},
    {"name": "seller", "type": "address"},
    {"name": "amount", "type": "uint256"},
    {"name": "price", "type": "uint256"}
  ]}]},
  {"type": "function", "name": "displayTransactions", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "tuple[]", "components": [
    {"name": "from", "type": "address"},
    {"name": "to", "type": "address"},
    {"name": "produced", "type": "uint256"},
    {"name": "consumed", "type": "uint256"},
    {"name": "tokenAmount", "type": "uint256"},
    {"name": "timestamp", "type": "uint256"}
  ]}]},
  {"type": "function", "name": "displayManagedTransactions", "stateMutability": "view", "inputs": [],
   "outputs": [{"name": "", "type": "tuple[]", "components": [
    {"name": "from", "type": "address"},
    {"name": "to", "type": "address"},
    {"name": "produced", "type": "uint256"},
    {"name": "consumed", "type": "uint256"},
    {"name": "tokenAmount", "type": "uint256"},
    {"name": "timestamp", "type": "uint256"}
  ]}]},
  {"type": "function", "name": "buyEnergy", "stateMutability": "payable",
   "inputs": [{"name": "saleIndex", "type": "uint256"}, {"name": "amount", "type": "uint256"}],
   "outputs": []},
  {"type": "function", "name": "postEnergyForSale", "stateMutability": "nonpayable",
   "inputs": [{"name": "amount", "type": "uint256"}, {"name": "price", "type": "uint256"}],
   "outputs": []},
  {"type": "function", "name": "reduceEnergyBalance", "stateMutability": "nonpayable",
   "inputs": [{"name": "panelId", "type": "uint256"}, {"name": "amount", "type": "uint256"}],
   "outputs": []},
  {"type": "function", "name": "allocateEnergyToPanel", "stateMutability": "nonpayable",
   "inputs": [{"name": "panelId", "type": "uint256"}, {"name": "amount", "type": "uint256"}],
   "outputs": []}
]"#;
