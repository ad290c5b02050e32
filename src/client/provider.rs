//! The node side: an ethers `Provider` over HTTP.

use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::{Address, U256};

use super::Node;
use crate::config::NodeConfig;
use crate::error::{LuminError, Result};

pub fn http_provider(config: &NodeConfig) -> Result<Provider<Http>> {
    let url: reqwest::Url = config
        .rpc_url
        .parse()
        .map_err(|e| LuminError::Config(format!("node.rpc_url '{}': {}", config.rpc_url, e)))?;
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| LuminError::Connectivity(e.to_string()))?;
    Ok(Provider::new(Http::new_with_client(url, client)).interval(config.confirmation().poll_interval))
}

/// `web3_clientVersion`, used as the startup reachability check.
pub async fn client_version<P: JsonRpcClient>(provider: &Provider<P>) -> Result<String> {
    provider
        .client_version()
        .await
        .map_err(|e| LuminError::Connectivity(format!("node unreachable: {}", e)))
}

#[async_trait]
impl<P: JsonRpcClient + 'static> Node for Provider<P> {
    async fn accounts(&self) -> Result<Vec<Address>> {
        self.get_accounts()
            .await
            .map_err(|e| LuminError::Connectivity(format!("eth_accounts: {}", e)))
    }

    async fn balance(&self, address: &Address) -> Result<U256> {
        self.get_balance(*address, None)
            .await
            .map_err(|e| LuminError::Connectivity(format!("eth_getBalance: {}", e)))
    }
}
