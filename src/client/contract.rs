//! The injected collaborators: the node (accounts, balances) and the
//! EnergyManagement contract, plus their ethers-backed implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::{Abi, Token, Tokenize};
use ethers::contract::{Contract, FunctionCall};
use ethers::providers::{JsonRpcClient, Middleware, Provider};
use ethers::types::{Address, TransactionReceipt, TxHash, U256, U64};
use tracing::{debug, info};

use crate::error::{LuminError, Result};
use crate::models::{records, Panel, Sale, TransactionRecord, User};

/// Contract functions the client cannot run without.
pub const REQUIRED_FUNCTIONS: &[&str] = &[
    "users",
    "displayPanels",
    "displayManagedPanels",
    "displayManagedTransactions",
    "getAvailableEnergySales",
    "displayTransactions",
    "buyEnergy",
    "postEnergyForSale",
    "reduceEnergyBalance",
    "allocateEnergyToPanel",
];

#[async_trait]
pub trait Node: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>>;
    /// Balance in wei.
    async fn balance(&self, address: &Address) -> Result<U256>;
}

/// Reads are `eth_call`s; every state-changing method returns only once its
/// transaction is confirmed.
#[async_trait]
pub trait EnergyContract: Send + Sync {
    async fn user(&self, address: &Address) -> Result<User>;
    async fn panels(&self, caller: &Address) -> Result<Vec<Panel>>;
    async fn managed_panels(&self, caller: &Address) -> Result<Vec<Panel>>;
    async fn managed_transactions(&self, caller: &Address) -> Result<Vec<TransactionRecord>>;
    async fn available_sales(&self) -> Result<Vec<Sale>>;
    async fn transactions(&self, caller: &Address) -> Result<Vec<TransactionRecord>>;

    async fn buy_energy(&self, caller: &Address, sale_index: usize, amount: u64, value: U256) -> Result<TxHash>;
    async fn post_energy_for_sale(&self, caller: &Address, amount: u64, price: U256) -> Result<TxHash>;
    async fn reduce_energy_balance(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash>;
    async fn allocate_energy_to_panel(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash>;
}

#[derive(Debug, Clone, Copy)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

/// Poll for a receipt until it appears or the policy's timeout elapses.
/// A receipt with status 0 is a revert.
pub async fn wait_for_receipt<M: Middleware>(
    client: &M,
    tx_hash: TxHash,
    policy: &ConfirmationPolicy,
) -> Result<TransactionReceipt> {
    let poll = async {
        loop {
            let receipt = client
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| LuminError::Rpc(format!("eth_getTransactionReceipt: {}", e)))?;
            if let Some(receipt) = receipt {
                return Ok::<_, LuminError>(receipt);
            }
            tokio::time::sleep(policy.poll_interval).await;
        }
    };
    let receipt = tokio::time::timeout(policy.timeout, poll)
        .await
        .map_err(|_| LuminError::Timeout(format!("{:#x}", tx_hash)))??;

    if receipt.status == Some(U64::zero()) {
        return Err(LuminError::Transaction(format!("{:#x} reverted", tx_hash)));
    }
    Ok(receipt)
}

pub struct RpcEnergyContract<P: JsonRpcClient + 'static> {
    provider: Arc<Provider<P>>,
    contract: Contract<Provider<P>>,
    confirmation: ConfirmationPolicy,
    gas: Option<u64>,
}

impl<P: JsonRpcClient + 'static> RpcEnergyContract<P> {
    pub fn new(
        provider: Arc<Provider<P>>,
        abi: Abi,
        address: Address,
        confirmation: ConfirmationPolicy,
        gas: Option<u64>,
    ) -> Self {
        let contract = Contract::new(address, abi, provider.clone());
        Self { provider, contract, confirmation, gas }
    }

    /// `eth_call` of `name`, with every output returned as one token.
    async fn read<T: Tokenize + Send>(&self, caller: Option<&Address>, name: &str, what: &str, args: T) -> Result<Token> {
        let mut call = self
            .contract
            .method::<_, Token>(name, args)
            .map_err(|e| LuminError::Abi(format!("{}: {}", name, e)))?
            .legacy();
        if let Some(caller) = caller {
            call = call.from(*caller);
        }
        call.call().await.map_err(|e| LuminError::data_fetch(what, e))
    }

    async fn list(&self, caller: Option<&Address>, name: &str, what: &str) -> Result<Vec<Vec<Token>>> {
        let list = self.read(caller, name, what, ()).await?;
        records(list, name).map_err(|e| LuminError::data_fetch(what, e))
    }

    async fn panel_list(&self, caller: &Address, name: &str) -> Result<Vec<Panel>> {
        self.list(Some(caller), name, "panels")
            .await?
            .into_iter()
            .map(Panel::from_tokens)
            .collect::<Result<_>>()
            .map_err(|e| LuminError::data_fetch("panels", e))
    }

    async fn transaction_list(&self, caller: &Address, name: &str) -> Result<Vec<TransactionRecord>> {
        self.list(Some(caller), name, "transactions")
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, fields)| TransactionRecord::from_tokens(i, fields))
            .collect::<Result<_>>()
            .map_err(|e| LuminError::data_fetch("transactions", e))
    }

    async fn transact<T: Tokenize + Send>(&self, caller: &Address, name: &str, args: T, value: U256) -> Result<TxHash> {
        let mut call: FunctionCall<_, _, ()> = self
            .contract
            .method(name, args)
            .map_err(|e| LuminError::Abi(format!("{}: {}", name, e)))?
            .legacy()
            .from(*caller);
        if !value.is_zero() {
            call = call.value(value);
        }
        if let Some(gas) = self.gas {
            call = call.gas(gas);
        }

        let pending = call
            .send()
            .await
            .map_err(|e| LuminError::Transaction(format!("{}: {}", name, e)))?;
        let tx_hash = *pending;
        debug!(function = name, ?tx_hash, "submitted, waiting for receipt");

        let receipt = wait_for_receipt(self.provider.as_ref(), tx_hash, &self.confirmation)
            .await
            .map_err(|e| match e {
                LuminError::Timeout(_) | LuminError::Transaction(_) => e,
                other => LuminError::Transaction(format!("{}: {}", name, other)),
            })?;
        info!(
            function = name,
            ?tx_hash,
            block = ?receipt.block_number,
            "transaction confirmed"
        );
        Ok(receipt.transaction_hash)
    }
}

#[async_trait]
impl<P: JsonRpcClient + 'static> EnergyContract for RpcEnergyContract<P> {
    async fn user(&self, address: &Address) -> Result<User> {
        let token = self.read(None, "users", "user record", *address).await?;
        User::from_token(token).map_err(|e| LuminError::data_fetch("user record", e))
    }

    async fn panels(&self, caller: &Address) -> Result<Vec<Panel>> {
        self.panel_list(caller, "displayPanels").await
    }

    async fn managed_panels(&self, caller: &Address) -> Result<Vec<Panel>> {
        self.panel_list(caller, "displayManagedPanels").await
    }

    async fn managed_transactions(&self, caller: &Address) -> Result<Vec<TransactionRecord>> {
        self.transaction_list(caller, "displayManagedTransactions").await
    }

    async fn available_sales(&self) -> Result<Vec<Sale>> {
        self.list(None, "getAvailableEnergySales", "energy offers")
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, fields)| Sale::from_tokens(i, fields))
            .collect::<Result<_>>()
            .map_err(|e| LuminError::data_fetch("energy offers", e))
    }

    async fn transactions(&self, caller: &Address) -> Result<Vec<TransactionRecord>> {
        self.transaction_list(caller, "displayTransactions").await
    }

    async fn buy_energy(&self, caller: &Address, sale_index: usize, amount: u64, value: U256) -> Result<TxHash> {
        let args = (U256::from(sale_index), U256::from(amount));
        self.transact(caller, "buyEnergy", args, value).await
    }

    async fn post_energy_for_sale(&self, caller: &Address, amount: u64, price: U256) -> Result<TxHash> {
        self.transact(caller, "postEnergyForSale", (U256::from(amount), price), U256::zero()).await
    }

    async fn reduce_energy_balance(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash> {
        let args = (U256::from(panel_id), U256::from(amount));
        self.transact(caller, "reduceEnergyBalance", args, U256::zero()).await
    }

    async fn allocate_energy_to_panel(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash> {
        let args = (U256::from(panel_id), U256::from(amount));
        self.transact(caller, "allocateEnergyToPanel", args, U256::zero()).await
    }
}
