//! In-memory chain used by the tests. Applies the same state changes the
//! contract would and records every submitted transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, U256};

use super::{EnergyContract, Node, TxHash};
use crate::auth::password_hash;
use crate::error::{LuminError, Result};
use crate::models::{Panel, Sale, TransactionRecord, User};
use crate::units::checksum;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    Buy { caller: Address, sale_index: usize, amount: u64, value: U256 },
    Post { caller: Address, amount: u64, price: U256 },
    Reduce { caller: Address, panel_id: u64, amount: u64 },
    Allocate { caller: Address, panel_id: u64, amount: u64 },
}

#[derive(Default)]
struct ChainState {
    accounts: Vec<Address>,
    users: HashMap<Address, User>,
    panels: HashMap<Address, Vec<Panel>>,
    sales: Vec<Sale>,
    transactions: HashMap<Address, Vec<TransactionRecord>>,
    balances: HashMap<Address, U256>,
    submitted: Vec<Submitted>,
    failing: HashSet<&'static str>,
    clock: u64,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(&self, f: impl FnOnce(&mut ChainState)) {
        f(&mut self.state.lock().expect("mock chain poisoned"));
    }

    pub fn with_account(self, address: Address, balance: U256) -> Self {
        self.with_state(|s| {
            if !s.accounts.contains(&address) {
                s.accounts.push(address);
            }
            s.balances.insert(address, balance);
        });
        self
    }

    pub fn with_user(self, address: Address, name: &str, password: &str, is_manager: bool) -> Self {
        self.with_state(|s| {
            if !s.accounts.contains(&address) {
                s.accounts.push(address);
            }
            s.users.insert(
                address,
                User {
                    name: name.to_string(),
                    full_name: format!("{} Full", name),
                    password_hash: password_hash(password),
                    is_manager,
                },
            );
        });
        self
    }

    pub fn with_panel(self, owner: Address, id: u64, capacity: u64, balance: u64, efficiency: u64) -> Self {
        self.with_state(|s| {
            s.panels.entry(owner).or_default().push(Panel {
                id,
                capacity,
                location: format!("Location {}", id),
                owner: Some(checksum(&owner)),
                energy_balance: balance,
                efficiency,
            });
        });
        self
    }

    pub fn with_sale(self, seller: Address, amount: u64, price: U256) -> Self {
        self.with_state(|s| {
            let index = s.sales.len();
            s.sales.push(Sale { index, creator: checksum(&seller), seller, amount, price });
        });
        self
    }

    pub fn with_transaction(self, owner: Address, produced: u64, consumed: u64, token_amount: U256) -> Self {
        self.with_state(|s| {
            s.clock += 1;
            let list = s.transactions.entry(owner).or_default();
            list.push(TransactionRecord {
                index: list.len(),
                from: checksum(&owner),
                to: checksum(&owner),
                produced,
                consumed,
                token_amount,
                timestamp: 1_700_000_000 + s.clock,
            });
        });
        self
    }

    /// Make every subsequent call of `method` fail.
    pub fn fail(&self, method: &'static str) {
        self.with_state(|s| {
            s.failing.insert(method);
        });
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.state.lock().expect("mock chain poisoned").submitted.clone()
    }

    pub fn panels_of(&self, owner: &Address) -> Vec<Panel> {
        let state = self.state.lock().expect("mock chain poisoned");
        state.panels.get(owner).cloned().unwrap_or_default()
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.state.lock().expect("mock chain poisoned").sales.clone()
    }

    fn check(state: &ChainState, method: &'static str) -> Result<()> {
        if state.failing.contains(method) {
            return Err(LuminError::Rpc(format!("{}: injected failure", method)));
        }
        Ok(())
    }

    fn submit(state: &mut ChainState, tx: Submitted) -> TxHash {
        state.submitted.push(tx);
        TxHash::from_low_u64_be(state.submitted.len() as u64)
    }

    fn panel_mut<'a>(state: &'a mut ChainState, owner: &Address, panel_id: u64) -> Result<&'a mut Panel> {
        state
            .panels
            .get_mut(owner)
            .and_then(|list| list.iter_mut().find(|p| p.id == panel_id))
            .ok_or_else(|| LuminError::Transaction(format!("panel {} is not owned by caller", panel_id)))
    }
}

#[async_trait]
impl Node for MockChain {
    async fn accounts(&self) -> Result<Vec<Address>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "accounts").map_err(|e| LuminError::Connectivity(e.to_string()))?;
        Ok(state.accounts.clone())
    }

    async fn balance(&self, address: &Address) -> Result<U256> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "balance")?;
        Ok(state.balances.get(address).copied().unwrap_or_default())
    }
}

#[async_trait]
impl EnergyContract for MockChain {
    async fn user(&self, address: &Address) -> Result<User> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "users").map_err(|e| LuminError::data_fetch("user record", e))?;
        // unregistered addresses read back as an all-default record
        Ok(state.users.get(address).cloned().unwrap_or(User {
            name: String::new(),
            full_name: String::new(),
            password_hash: [0u8; 32],
            is_manager: false,
        }))
    }

    async fn panels(&self, caller: &Address) -> Result<Vec<Panel>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "displayPanels").map_err(|e| LuminError::data_fetch("panels", e))?;
        Ok(state.panels.get(caller).cloned().unwrap_or_default())
    }

    async fn managed_panels(&self, _caller: &Address) -> Result<Vec<Panel>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "displayManagedPanels").map_err(|e| LuminError::data_fetch("panels", e))?;
        let mut all: Vec<Panel> = state.panels.values().flatten().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    async fn managed_transactions(&self, _caller: &Address) -> Result<Vec<TransactionRecord>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "displayManagedTransactions").map_err(|e| LuminError::data_fetch("transactions", e))?;
        let mut all = Vec::new();
        for account in &state.accounts {
            if let Some(list) = state.transactions.get(account) {
                all.extend(list.iter().cloned());
            }
        }
        for (i, record) in all.iter_mut().enumerate() {
            record.index = i;
        }
        Ok(all)
    }

    async fn available_sales(&self) -> Result<Vec<Sale>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "getAvailableEnergySales").map_err(|e| LuminError::data_fetch("energy offers", e))?;
        Ok(state.sales.clone())
    }

    async fn transactions(&self, caller: &Address) -> Result<Vec<TransactionRecord>> {
        let state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "displayTransactions").map_err(|e| LuminError::data_fetch("transactions", e))?;
        Ok(state.transactions.get(caller).cloned().unwrap_or_default())
    }

    async fn buy_energy(&self, caller: &Address, sale_index: usize, amount: u64, value: U256) -> Result<TxHash> {
        let mut state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "buyEnergy").map_err(|e| LuminError::Transaction(e.to_string()))?;
        let sale = state
            .sales
            .get(sale_index)
            .cloned()
            .ok_or_else(|| LuminError::Transaction(format!("no sale at index {}", sale_index)))?;
        if value != sale.price || amount != sale.amount {
            return Err(LuminError::Transaction("buyEnergy reverted: payment mismatch".to_string()));
        }

        state.sales.remove(sale_index);
        for (i, s) in state.sales.iter_mut().enumerate() {
            s.index = i;
        }
        let buyer = state.balances.entry(*caller).or_default();
        *buyer = buyer.saturating_sub(value);
        *state.balances.entry(sale.seller).or_default() += value;
        state.clock += 1;
        let timestamp = 1_700_000_000 + state.clock;
        for (owner, produced, consumed) in [(sale.seller, amount, 0), (*caller, 0, amount)] {
            let list = state.transactions.entry(owner).or_default();
            list.push(TransactionRecord {
                index: list.len(),
                from: checksum(&sale.seller),
                to: checksum(caller),
                produced,
                consumed,
                token_amount: value,
                timestamp,
            });
        }
        Ok(Self::submit(&mut state, Submitted::Buy { caller: *caller, sale_index, amount, value }))
    }

    async fn post_energy_for_sale(&self, caller: &Address, amount: u64, price: U256) -> Result<TxHash> {
        let mut state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "postEnergyForSale").map_err(|e| LuminError::Transaction(e.to_string()))?;
        let index = state.sales.len();
        state.sales.push(Sale { index, creator: checksum(caller), seller: *caller, amount, price });
        Ok(Self::submit(&mut state, Submitted::Post { caller: *caller, amount, price }))
    }

    async fn reduce_energy_balance(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash> {
        let mut state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "reduceEnergyBalance").map_err(|e| LuminError::Transaction(e.to_string()))?;
        let panel = Self::panel_mut(&mut state, caller, panel_id)?;
        if panel.energy_balance < amount {
            return Err(LuminError::Transaction("reduceEnergyBalance reverted".to_string()));
        }
        panel.energy_balance -= amount;
        Ok(Self::submit(&mut state, Submitted::Reduce { caller: *caller, panel_id, amount }))
    }

    async fn allocate_energy_to_panel(&self, caller: &Address, panel_id: u64, amount: u64) -> Result<TxHash> {
        let mut state = self.state.lock().expect("mock chain poisoned");
        Self::check(&state, "allocateEnergyToPanel").map_err(|e| LuminError::Transaction(e.to_string()))?;
        let panel = Self::panel_mut(&mut state, caller, panel_id)?;
        if panel.energy_balance + amount > panel.capacity {
            return Err(LuminError::Transaction("allocateEnergyToPanel reverted: over capacity".to_string()));
        }
        panel.energy_balance += amount;
        Ok(Self::submit(&mut state, Submitted::Allocate { caller: *caller, panel_id, amount }))
    }
}
