//! Buy, sell and allocate: validate against the last fetched read model,
//! then submit and wait for each transaction in turn.

use ethers::types::{Address, U256};
use tracing::{error, info, warn};

use crate::client::{EnergyContract, TxHash};
use crate::error::{LuminError, Result};
use crate::models::{Panel, Sale};

/// Interactive input needed in the middle of an action.
pub trait Prompt: Send {
    /// How much of `max` kWh to put into `panel`. `None` skips the panel.
    fn allocation(&mut self, panel: &Panel, max: u64) -> Option<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelAllocation {
    pub panel_id: u64,
    pub amount: u64,
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    pub allocated: Vec<PanelAllocation>,
    /// kWh left over after every panel was offered some.
    pub unallocated: u64,
    pub no_panels: bool,
    /// Set when an allocation transaction failed and the loop stopped.
    pub failure: Option<String>,
}

impl Allocation {
    pub fn total_allocated(&self) -> u64 {
        self.allocated.iter().map(|a| a.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub sale: Sale,
    pub tx_hash: TxHash,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleRequest {
    pub panel_id: u64,
    /// kWh
    pub amount: u64,
    /// wei, total for the whole amount
    pub price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedSale {
    pub offer_tx: TxHash,
    pub reduce_tx: TxHash,
}

/// Resolve the selected row and refuse self-trades.
pub fn select_offer<'a>(caller: &Address, sales: &'a [Sale], row: Option<usize>) -> Result<&'a Sale> {
    let sale = row.and_then(|r| sales.get(r)).ok_or(LuminError::NoSelection)?;
    if sale.seller == *caller {
        return Err(LuminError::SelfTrade);
    }
    Ok(sale)
}

/// Buy the whole offer, paying exactly its stored price, then spread the
/// purchased energy over the caller's panels.
pub async fn buy_energy(
    contract: &dyn EnergyContract,
    caller: &Address,
    sales: &[Sale],
    row: Option<usize>,
    prompt: &mut dyn Prompt,
) -> Result<Purchase> {
    let sale = select_offer(caller, sales, row)?.clone();

    let tx_hash = contract
        .buy_energy(caller, sale.index, sale.amount, sale.price)
        .await
        .inspect_err(|e| error!(sale = sale.index, error = %e, "purchase failed"))?;
    info!(sale = sale.index, amount = sale.amount, ?tx_hash, "energy purchased");

    let allocation = match contract.panels(caller).await {
        Ok(panels) => allocate_energy(contract, caller, &panels, sale.amount, prompt).await,
        Err(e) => {
            error!(error = %e, "could not load panels for allocation");
            Allocation {
                unallocated: sale.amount,
                failure: Some(e.to_string()),
                ..Allocation::default()
            }
        }
    };
    if allocation.unallocated > 0 {
        warn!(unallocated = allocation.unallocated, "purchased energy left unallocated");
    }

    Ok(Purchase { sale, tx_hash, allocation })
}

/// Offer each panel up to `min(remaining, capacity - balance)` and submit one
/// allocation per positive answer. Stops once nothing remains.
pub async fn allocate_energy(
    contract: &dyn EnergyContract,
    caller: &Address,
    panels: &[Panel],
    amount: u64,
    prompt: &mut dyn Prompt,
) -> Allocation {
    let mut allocation = Allocation {
        unallocated: amount,
        no_panels: panels.is_empty(),
        ..Allocation::default()
    };

    for panel in panels {
        if allocation.unallocated == 0 {
            break;
        }
        let max = allocation.unallocated.min(panel.remaining_capacity());
        if max == 0 {
            continue;
        }
        let chosen = match prompt.allocation(panel, max) {
            Some(n) => n.min(max),
            None => continue,
        };
        if chosen == 0 {
            continue;
        }

        match contract.allocate_energy_to_panel(caller, panel.id, chosen).await {
            Ok(tx_hash) => {
                info!(panel = panel.id, amount = chosen, ?tx_hash, "energy allocated");
                allocation.unallocated -= chosen;
                allocation.allocated.push(PanelAllocation { panel_id: panel.id, amount: chosen, tx_hash });
            }
            Err(e) => {
                error!(panel = panel.id, amount = chosen, error = %e, "allocation failed");
                allocation.failure = Some(e.to_string());
                break;
            }
        }
    }

    allocation
}

pub fn validate_sale<'a>(panels: &'a [Panel], request: &SaleRequest) -> Result<&'a Panel> {
    if request.amount == 0 || request.price.is_zero() {
        return Err(LuminError::InvalidInput(
            "Please enter valid amounts for energy and price.".to_string(),
        ));
    }
    if panels.is_empty() {
        return Err(LuminError::InvalidInput(
            "You do not have any panels to sell energy from.".to_string(),
        ));
    }
    let panel = panels
        .iter()
        .find(|p| p.id == request.panel_id)
        .ok_or_else(|| LuminError::InvalidInput(format!("panel {} is not yours", request.panel_id)))?;
    if request.amount > panel.energy_balance {
        return Err(LuminError::InsufficientEnergy {
            available: panel.energy_balance,
            requested: request.amount,
        });
    }
    Ok(panel)
}

/// Post the offer, then reduce the panel's balance. The two calls are not
/// atomic: if the second fails the offer stays open without backing.
pub async fn sell_energy(
    contract: &dyn EnergyContract,
    caller: &Address,
    panels: &[Panel],
    request: SaleRequest,
) -> Result<PostedSale> {
    let panel = validate_sale(panels, &request)?;

    let offer_tx = contract
        .post_energy_for_sale(caller, request.amount, request.price)
        .await
        .inspect_err(|e| error!(amount = request.amount, error = %e, "posting offer failed"))?;
    info!(amount = request.amount, price = %request.price, ?offer_tx, "offer posted");

    let reduce_tx = contract
        .reduce_energy_balance(caller, panel.id, request.amount)
        .await
        .map_err(|e| {
            error!(panel = panel.id, ?offer_tx, error = %e, "offer posted but balance not reduced");
            LuminError::Transaction(format!(
                "offer posted in {:#x} but reducing panel {} balance failed: {}",
                offer_tx, panel.id, e
            ))
        })?;
    info!(panel = panel.id, amount = request.amount, ?reduce_tx, "panel balance reduced");

    Ok(PostedSale { offer_tx, reduce_tx })
}
