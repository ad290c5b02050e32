// Client module
pub mod artifact;
pub mod contract;
pub mod provider;
#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub mod transport;

pub use contract::{wait_for_receipt, ConfirmationPolicy, EnergyContract, Node, RpcEnergyContract, REQUIRED_FUNCTIONS};
pub use ethers::types::TxHash;

use std::sync::Arc;

use tracing::info;

use crate::config::LuminConfig;
use crate::error::Result;

/// The node and contract handles every component is given explicitly.
#[derive(Clone)]
pub struct Services {
    pub node: Arc<dyn Node>,
    pub contract: Arc<dyn EnergyContract>,
}

impl Services {
    pub fn new(node: Arc<dyn Node>, contract: Arc<dyn EnergyContract>) -> Self {
        Self { node, contract }
    }

    /// Load the ABI, validate the contract address and check the node is reachable.
    /// Any failure here is fatal for startup.
    pub async fn connect(config: &LuminConfig) -> Result<Self> {
        let abi = artifact::load_abi(&config.contract.abi_path)?;
        artifact::require_functions(&abi, REQUIRED_FUNCTIONS)?;
        let address = config.contract.address()?;

        let provider = Arc::new(provider::http_provider(&config.node)?);
        let version = provider::client_version(provider.as_ref()).await?;
        info!(node = %config.node.rpc_url, %version, contract = ?address, "connected");

        let contract = RpcEnergyContract::new(
            provider.clone(),
            abi,
            address,
            config.node.confirmation(),
            config.node.gas,
        );
        Ok(Self::new(provider, Arc::new(contract)))
    }
}
