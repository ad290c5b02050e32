//! Logged-in state. The current session is a single replaceable value:
//! `None` when logged out, rebuilt from scratch on every login.

use ethers::types::{Address, U256};
use tracing::{error, info};

use crate::actions::{self, Prompt, PostedSale, Purchase, SaleRequest};
use crate::auth::{self, Authenticated, Role};
use crate::client::Services;
use crate::error::{LuminError, Result};
use crate::models::{Panel, Sale, TransactionRecord, User};
use crate::views::{sort_sales, SortKey};

/// Result of the most recent fetch. A failed refresh replaces earlier data
/// so stale rows are never shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot<T> {
    Pending,
    Loaded(T),
    Failed(String),
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot::Pending
    }
}

impl<T> Snapshot<T> {
    fn capture(result: Result<T>, what: &str) -> Self {
        match result {
            Ok(value) => Snapshot::Loaded(value),
            Err(e) => {
                error!(what, error = %e, "refresh failed");
                match e {
                    LuminError::DataFetch { cause, .. } => Snapshot::Failed(cause),
                    other => Snapshot::Failed(other.to_string()),
                }
            }
        }
    }

    /// The loaded value, or a `DataFetch` error naming `what` when the last
    /// fetch failed or never ran.
    pub fn require(&self, what: &str) -> Result<&T> {
        match self {
            Snapshot::Loaded(value) => Ok(value),
            Snapshot::Pending => Err(LuminError::data_fetch(what, "not loaded yet")),
            Snapshot::Failed(cause) => Err(LuminError::data_fetch(what, cause)),
        }
    }

    pub fn loaded(&self) -> Option<&T> {
        match self {
            Snapshot::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

pub struct Session {
    services: Services,
    pub address: Address,
    pub is_manager: bool,
    pub profile: Snapshot<User>,
    /// wei
    pub balance: Snapshot<U256>,
    /// The caller's panels, or every managed panel for a manager.
    pub panels: Snapshot<Vec<Panel>>,
    pub sales: Snapshot<Vec<Sale>>,
    /// The caller's history, or every managed user's for a manager.
    pub history: Snapshot<Vec<TransactionRecord>>,
    pub sort: Option<SortKey>,
}

impl Session {
    pub fn new(services: Services, who: Authenticated) -> Self {
        Self {
            services,
            address: who.address,
            is_manager: who.is_manager,
            profile: Snapshot::default(),
            balance: Snapshot::default(),
            panels: Snapshot::default(),
            sales: Snapshot::default(),
            history: Snapshot::default(),
            sort: None,
        }
    }

    pub async fn refresh(&mut self) {
        if self.is_manager {
            self.refresh_panels().await;
            self.refresh_history().await;
        } else {
            self.refresh_profile().await;
            self.refresh_balance().await;
            self.refresh_panels().await;
            self.refresh_sales().await;
            self.refresh_history().await;
        }
    }

    pub async fn refresh_profile(&mut self) {
        let result = self.services.contract.user(&self.address).await;
        self.profile = Snapshot::capture(result, "profile");
    }

    pub async fn refresh_balance(&mut self) {
        let result = self.services.node.balance(&self.address).await;
        self.balance = Snapshot::capture(result, "balance");
    }

    pub async fn refresh_panels(&mut self) {
        let contract = &self.services.contract;
        let result = if self.is_manager {
            contract.managed_panels(&self.address).await
        } else {
            contract.panels(&self.address).await
        };
        self.panels = Snapshot::capture(result, "panels");
    }

    pub async fn refresh_sales(&mut self) {
        let mut result = self.services.contract.available_sales().await;
        if let (Ok(sales), Some(key)) = (result.as_mut(), self.sort) {
            sort_sales(sales, key);
        }
        self.sales = Snapshot::capture(result, "energy offers");
    }

    pub async fn refresh_history(&mut self) {
        let contract = &self.services.contract;
        let result = if self.is_manager {
            contract.managed_transactions(&self.address).await
        } else {
            contract.transactions(&self.address).await
        };
        self.history = Snapshot::capture(result, "transactions");
    }

    /// Re-fetch the offers and order them by `key`.
    pub async fn sort_offers(&mut self, key: SortKey) {
        self.sort = Some(key);
        self.refresh_sales().await;
    }

    /// `row` indexes the offer list as currently displayed.
    pub async fn buy(&mut self, row: Option<usize>, prompt: &mut dyn Prompt) -> Result<Purchase> {
        let contract = self.services.contract.clone();
        let sales = self.sales.require("energy offers")?;
        let result = actions::buy_energy(contract.as_ref(), &self.address, sales, row, prompt).await;

        if needs_refresh(&result) {
            self.refresh_balance().await;
            self.refresh_sales().await;
            self.refresh_panels().await;
            self.refresh_history().await;
        }
        result
    }

    pub async fn sell(&mut self, request: SaleRequest) -> Result<PostedSale> {
        let contract = self.services.contract.clone();
        let panels = self.panels.require("panels")?;
        let result = actions::sell_energy(contract.as_ref(), &self.address, panels, request).await;

        if needs_refresh(&result) {
            self.refresh_sales().await;
            self.refresh_panels().await;
        }
        result
    }
}

/// Anything past local validation may have changed chain state.
fn needs_refresh<T>(result: &Result<T>) -> bool {
    match result {
        Ok(_) => true,
        Err(e) => !e.is_precondition(),
    }
}

/// Holds the injected services and at most one live session.
pub struct Client {
    services: Services,
    session: Option<Session>,
}

impl Client {
    pub fn new(services: Services) -> Self {
        Self { services, session: None }
    }

    /// Replaces any current session. On failure the client is logged out.
    pub async fn login(&mut self, role: Role, username: &str, password: &str) -> Result<&mut Session> {
        self.session = None;
        let who = auth::authenticate(
            self.services.node.as_ref(),
            self.services.contract.as_ref(),
            role,
            username,
            password,
        )
        .await?;

        let mut session = Session::new(self.services.clone(), who);
        session.refresh().await;
        Ok(self.session.insert(session))
    }

    /// Drops the session and every cached read model with it.
    pub fn logout(&mut self) -> Option<Address> {
        let address = self.session.take().map(|s| s.address);
        if let Some(address) = &address {
            info!(?address, "logged out");
        }
        address
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn require_session(&mut self) -> Result<&mut Session> {
        self.session
            .as_mut()
            .ok_or_else(|| LuminError::InvalidInput("not logged in".to_string()))
    }
}
