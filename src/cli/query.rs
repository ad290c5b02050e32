//! One-shot read commands. Output goes to the given writer.

use std::io::Write;

use serde::Serialize;

use super::Commands;
use crate::client::Services;
use crate::error::Result;
use crate::units::{checksum, format_ether, parse_address};
use crate::views::{format_timestamp, offer_line, panel_line, project_history, sort_sales};

pub async fn handle_command(cmd: Commands, services: &Services, out: &mut dyn Write) -> Result<()> {
    match cmd {
        Commands::Offers { sort, json } => {
            let mut sales = services.contract.available_sales().await?;
            if let Some(key) = sort {
                sort_sales(&mut sales, key);
            }
            if json {
                return write_json(out, &sales);
            }
            if sales.is_empty() {
                writeln!(out, "No energy offers available.")?;
            }
            for (row, sale) in sales.iter().enumerate() {
                writeln!(out, "{:>3}. {}", row + 1, offer_line(sale))?;
            }
        }
        Commands::Panels { address, json } => {
            let address = parse_address(&address)?;
            let panels = services.contract.panels(&address).await?;
            if json {
                return write_json(out, &panels);
            }
            if panels.is_empty() {
                writeln!(out, "No Panels Registered")?;
            }
            for panel in &panels {
                writeln!(out, "{}", panel_line(panel))?;
            }
        }
        Commands::History { address, json } => {
            let address = parse_address(&address)?;
            let records = services.contract.transactions(&address).await?;
            if json {
                return write_json(out, &records);
            }
            if records.is_empty() {
                writeln!(out, "No transactions yet.")?;
            }
            for row in project_history(&records) {
                writeln!(
                    out,
                    "{} | {} | {} kWh | {} ETH | {}",
                    row.index,
                    row.kind,
                    row.amount,
                    row.tokens,
                    format_timestamp(row.timestamp)
                )?;
            }
        }
        Commands::Accounts => {
            for address in services.node.accounts().await? {
                let balance = services.node.balance(&address).await?;
                writeln!(out, "{}  {} ETH", checksum(&address), format_ether(balance))?;
            }
        }
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    writeln!(out, "{}", text)?;
    Ok(())
}
