//! Display projections over the last fetched contract data. Nothing in here
//! talks to the chain.

use std::fmt;

use chrono::DateTime;
use clap::ValueEnum;

use crate::models::{Panel, Sale, TransactionRecord};
use crate::units::format_ether;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelStatus {
    Active,
    Moderate,
    LowEfficiency,
}

impl PanelStatus {
    pub fn from_efficiency(efficiency: u64) -> Self {
        match efficiency {
            80.. => PanelStatus::Active,
            50..=79 => PanelStatus::Moderate,
            _ => PanelStatus::LowEfficiency,
        }
    }
}

impl fmt::Display for PanelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelStatus::Active => write!(f, "Active"),
            PanelStatus::Moderate => write!(f, "Moderate"),
            PanelStatus::LowEfficiency => write!(f, "Low Efficiency"),
        }
    }
}

/// Fill level in whole percent, 0 for a zero-capacity panel, never above 100.
pub fn energy_percentage(panel: &Panel) -> u8 {
    if panel.capacity == 0 {
        return 0;
    }
    let pct = (panel.energy_balance as u128 * 100) / panel.capacity as u128;
    pct.min(100) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelView {
    pub panel: Panel,
    pub energy_percentage: u8,
    pub status: PanelStatus,
}

impl PanelView {
    pub fn new(panel: Panel) -> Self {
        Self {
            energy_percentage: energy_percentage(&panel),
            status: PanelStatus::from_efficiency(panel.efficiency),
            panel,
        }
    }

    /// Label shown in the panel selector.
    pub fn option_label(&self) -> String {
        format!("ID: {}, Location: {}", self.panel.id, self.panel.location)
    }

    pub fn info_line(&self) -> String {
        format!(
            "Panel ID: {}, Capacity: {} kWh, Energy Balance: {} kWh, Efficiency: {}%",
            self.panel.id, self.panel.capacity, self.panel.energy_balance, self.panel.efficiency
        )
    }
}

pub fn project_panels(panels: &[Panel]) -> Vec<PanelView> {
    panels.iter().cloned().map(PanelView::new).collect()
}

pub fn panel_line(panel: &Panel) -> String {
    format!(
        "Panel ID: {}, Capacity: {} kWh, Location: {}, Energy Balance: {} kWh, Efficiency: {}%",
        panel.id, panel.capacity, panel.location, panel.energy_balance, panel.efficiency
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    PriceAsc,
    PriceDesc,
    AmountAsc,
    AmountDesc,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::PriceAsc,
        SortKey::PriceDesc,
        SortKey::AmountAsc,
        SortKey::AmountDesc,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::PriceAsc => "Lowest Price to Highest",
            SortKey::PriceDesc => "Highest Price to Lowest",
            SortKey::AmountAsc => "Lowest Amount to Highest",
            SortKey::AmountDesc => "Highest Amount to Lowest",
        }
    }
}

/// Stable: offers with equal keys keep their contract order.
pub fn sort_sales(sales: &mut [Sale], key: SortKey) {
    match key {
        SortKey::PriceAsc => sales.sort_by(|a, b| a.price.cmp(&b.price)),
        SortKey::PriceDesc => sales.sort_by(|a, b| b.price.cmp(&a.price)),
        SortKey::AmountAsc => sales.sort_by(|a, b| a.amount.cmp(&b.amount)),
        SortKey::AmountDesc => sales.sort_by(|a, b| b.amount.cmp(&a.amount)),
    }
}

pub fn offer_line(sale: &Sale) -> String {
    format!(
        "Seller: {}, Amount: {} kWh, Price: {} ETH",
        sale.creator,
        sale.amount,
        format_ether(sale.price)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Produced,
    Consumed,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryKind::Produced => write!(f, "Produced"),
            HistoryKind::Consumed => write!(f, "Consumed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub index: usize,
    pub kind: HistoryKind,
    /// kWh
    pub amount: u64,
    /// ether
    pub tokens: String,
    pub timestamp: u64,
}

impl HistoryRow {
    pub fn new(record: &TransactionRecord) -> Self {
        let (kind, amount) = if record.produced > 0 {
            (HistoryKind::Produced, record.produced)
        } else {
            (HistoryKind::Consumed, record.consumed)
        };
        Self {
            index: record.index,
            kind,
            amount,
            tokens: format_ether(record.token_amount),
            timestamp: record.timestamp,
        }
    }
}

pub fn project_history(records: &[TransactionRecord]) -> Vec<HistoryRow> {
    records.iter().map(HistoryRow::new).collect()
}

/// `2023-11-14 22:13:20 UTC`, or the raw value when out of range.
pub fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

pub fn transaction_line(record: &TransactionRecord) -> String {
    format!(
        "Transaction ID: {}, From: {}, To: {}, Produced: {} kWh, Consumed: {} kWh, Tokens: {}, Timestamp: {}",
        record.index,
        record.from,
        record.to,
        record.produced,
        record.consumed,
        format_ether(record.token_amount),
        record.timestamp
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// The query is not a usable key.
    Invalid,
}

pub fn find_panel<'a>(panels: &'a [Panel], query: &str) -> Lookup<&'a Panel> {
    let query = query.trim();
    if query.is_empty() {
        return Lookup::Invalid;
    }
    match panels.iter().find(|p| p.id.to_string() == query) {
        Some(panel) => Lookup::Found(panel),
        None => Lookup::NotFound,
    }
}

pub fn find_transaction<'a>(records: &'a [TransactionRecord], query: &str) -> Lookup<&'a TransactionRecord> {
    let query = query.trim();
    if query.is_empty() || !query.chars().all(|c| c.is_ascii_digit()) {
        return Lookup::Invalid;
    }
    match query.parse::<usize>().ok().and_then(|i| records.get(i)) {
        Some(record) => Lookup::Found(record),
        None => Lookup::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ether;
    use ethers::types::{Address, U256};

    fn panel(id: u64, capacity: u64, balance: u64, efficiency: u64) -> Panel {
        Panel {
            id,
            capacity,
            location: format!("Location {}", id),
            owner: None,
            energy_balance: balance,
            efficiency,
        }
    }

    fn sale(index: usize, amount: u64, price: u64) -> Sale {
        Sale {
            index,
            creator: format!("seller-{}", index),
            seller: Address::repeat_byte(index as u8 + 1),
            amount,
            price: U256::from(price),
        }
    }

    #[test]
    fn test_energy_percentage_bounds() {
        assert_eq!(energy_percentage(&panel(1, 0, 0, 90)), 0);
        assert_eq!(energy_percentage(&panel(1, 0, 50, 90)), 0);
        assert_eq!(energy_percentage(&panel(1, 500, 100, 90)), 20);
        assert_eq!(energy_percentage(&panel(1, 3, 1, 90)), 33);
        assert_eq!(energy_percentage(&panel(1, 500, 500, 90)), 100);
        // balance above capacity is clamped
        assert_eq!(energy_percentage(&panel(1, 100, 250, 90)), 100);
        assert_eq!(energy_percentage(&panel(1, u64::MAX, u64::MAX, 90)), 100);
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(PanelStatus::from_efficiency(100), PanelStatus::Active);
        assert_eq!(PanelStatus::from_efficiency(80), PanelStatus::Active);
        assert_eq!(PanelStatus::from_efficiency(79), PanelStatus::Moderate);
        assert_eq!(PanelStatus::from_efficiency(50), PanelStatus::Moderate);
        assert_eq!(PanelStatus::from_efficiency(49), PanelStatus::LowEfficiency);
        assert_eq!(PanelStatus::from_efficiency(0), PanelStatus::LowEfficiency);
        assert_eq!(PanelStatus::LowEfficiency.to_string(), "Low Efficiency");
    }

    #[test]
    fn test_panel_view_lines() {
        let view = PanelView::new(panel(5, 600, 300, 70));
        assert_eq!(view.option_label(), "ID: 5, Location: Location 5");
        assert_eq!(view.energy_percentage, 50);
        assert_eq!(view.status, PanelStatus::Moderate);
        assert_eq!(
            view.info_line(),
            "Panel ID: 5, Capacity: 600 kWh, Energy Balance: 300 kWh, Efficiency: 70%"
        );
    }

    #[test]
    fn test_price_sort_directions_are_reverses() {
        let mut sales = vec![sale(0, 10, 300), sale(1, 20, 100), sale(2, 30, 200)];
        sort_sales(&mut sales, SortKey::PriceAsc);
        let asc: Vec<usize> = sales.iter().map(|s| s.index).collect();
        assert_eq!(asc, vec![1, 2, 0]);

        sort_sales(&mut sales, SortKey::PriceDesc);
        let desc: Vec<usize> = sales.iter().map(|s| s.index).collect();
        let mut reversed = asc.clone();
        reversed.reverse();
        assert_eq!(desc, reversed);
    }

    #[test]
    fn test_sort_is_stable_for_equal_keys() {
        let mut sales = vec![sale(0, 10, 5), sale(1, 30, 5), sale(2, 20, 1), sale(3, 30, 5)];
        sort_sales(&mut sales, SortKey::PriceDesc);
        let order: Vec<usize> = sales.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 1, 3, 2]);

        sort_sales(&mut sales, SortKey::AmountDesc);
        let order: Vec<usize> = sales.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![1, 3, 2, 0]);

        sort_sales(&mut sales, SortKey::AmountAsc);
        let order: Vec<usize> = sales.iter().map(|s| s.index).collect();
        assert_eq!(order, vec![0, 2, 1, 3]);
    }

    #[test]
    fn test_offer_line_in_ether() {
        let line = offer_line(&sale(0, 200, 100_000_000_000_000_000));
        assert_eq!(line, "Seller: seller-0, Amount: 200 kWh, Price: 0.1 ETH");
    }

    #[test]
    fn test_history_classification() {
        let record = |index, produced, consumed| TransactionRecord {
            index,
            from: "a".to_string(),
            to: "b".to_string(),
            produced,
            consumed,
            token_amount: ether("2"),
            timestamp: 1_700_000_000,
        };
        let rows = project_history(&[record(0, 10, 0), record(1, 0, 7), record(2, 0, 0)]);
        assert_eq!(rows[0].kind, HistoryKind::Produced);
        assert_eq!(rows[0].amount, 10);
        assert_eq!(rows[1].kind, HistoryKind::Consumed);
        assert_eq!(rows[1].amount, 7);
        assert_eq!(rows[2].kind, HistoryKind::Consumed);
        assert_eq!(rows[0].tokens, "2");
        assert_eq!(format_timestamp(rows[0].timestamp), "2023-11-14 22:13:20 UTC");
    }

    #[test]
    fn test_search() {
        let panels = vec![panel(1, 500, 100, 95), panel(4, 800, 400, 88)];
        assert_eq!(find_panel(&panels, " 4 "), Lookup::Found(&panels[1]));
        assert_eq!(find_panel(&panels, "7"), Lookup::NotFound);
        assert_eq!(find_panel(&panels, ""), Lookup::Invalid);

        let records: Vec<TransactionRecord> = (0..3)
            .map(|i| TransactionRecord {
                index: i,
                from: String::new(),
                to: String::new(),
                produced: 0,
                consumed: 1,
                token_amount: U256::zero(),
                timestamp: 0,
            })
            .collect();
        assert_eq!(find_transaction(&records, "2"), Lookup::Found(&records[2]));
        assert_eq!(find_transaction(&records, "3"), Lookup::NotFound);
        assert_eq!(find_transaction(&records, "-1"), Lookup::Invalid);
        assert_eq!(find_transaction(&records, "abc"), Lookup::Invalid);
    }
}
