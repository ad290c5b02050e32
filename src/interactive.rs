//! Terminal front end: a login prompt, then the user dashboard or the
//! manager dashboard until logout or quit.

use std::io::{self, Write};
use std::str::FromStr;

use tracing::error;

use crate::actions::{Prompt, SaleRequest};
use crate::auth::Role;
use crate::error::{LuminError, Result};
use crate::models::Panel;
use crate::session::{Client, Session, Snapshot};
use crate::units::{checksum, format_ether, parse_ether};
use crate::views::{
    find_panel, find_transaction, format_timestamp, offer_line, panel_line, project_history,
    project_panels, transaction_line, Lookup, PanelView, SortKey,
};

enum LoginChoice {
    Role(Role),
    Quit,
}

enum MenuExit {
    Logout,
    Quit,
}

pub async fn run(client: &mut Client) -> Result<()> {
    print_banner();
    loop {
        if !login(client).await {
            println!("Goodbye.");
            return Ok(());
        }

        let is_manager = client.session().map(|s| s.is_manager).unwrap_or(false);
        let session = client.require_session()?;
        let exit = if is_manager {
            manager_menu(session).await
        } else {
            user_menu(session).await
        };

        client.logout();
        match exit {
            MenuExit::Logout => println!("\nLogged out."),
            MenuExit::Quit => {
                println!("Goodbye.");
                return Ok(());
            }
        }
    }
}

fn print_banner() {
    println!("========================================");
    println!("       LUMIN P2P ENERGY TRADING         ");
    println!("========================================");
}

/// Read one trimmed line. `None` on end of input or a read error.
fn read_line(prompt: &str) -> Option<String> {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut input = String::new();
    match io::stdin().read_line(&mut input) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(input.trim().to_string()),
    }
}

fn parse_login_choice(input: &str) -> Result<LoginChoice> {
    match input.trim() {
        "q" | "Q" => Ok(LoginChoice::Quit),
        "1" => Ok(LoginChoice::Role(Role::Manager)),
        "2" => Ok(LoginChoice::Role(Role::User)),
        other => Role::from_str(other).map(LoginChoice::Role),
    }
}

/// Returns false when the user asked to quit.
async fn login(client: &mut Client) -> bool {
    loop {
        println!("\n--- Login ---");
        println!("Role: 1. Manager  2. User  (q to quit)");
        let Some(input) = read_line("Select role: ") else { return false };
        let role = match parse_login_choice(&input) {
            Ok(LoginChoice::Quit) => return false,
            Ok(LoginChoice::Role(role)) => role,
            Err(e) => {
                println!("❌ {}", e);
                continue;
            }
        };

        let Some(username) = read_line("Username: ") else { return false };
        let password = match rpassword::prompt_password("Password: ") {
            Ok(password) => password,
            Err(e) => {
                println!("❌ Could not read password: {}", e);
                continue;
            }
        };

        match client.login(role, &username, &password).await {
            Ok(session) => {
                let name = session
                    .profile
                    .loaded()
                    .map(|u| u.full_name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| username.clone());
                println!("✓ Welcome, {}", name);
                return true;
            }
            Err(e) => {
                error!(error = %e, "login failed");
                println!("❌ {}", e);
            }
        }
    }
}

/// Prints why a snapshot has nothing to show; returns the data otherwise.
fn show<'a, T>(snapshot: &'a Snapshot<T>, what: &str) -> Option<&'a T> {
    match snapshot {
        Snapshot::Loaded(value) => Some(value),
        Snapshot::Pending => {
            println!("{} not loaded yet.", what);
            None
        }
        Snapshot::Failed(cause) => {
            println!("❌ Failed to load {}: {}", what, cause);
            None
        }
    }
}

async fn user_menu(session: &mut Session) -> MenuExit {
    let mut selected = first_panel(session);
    print_dashboard(session, selected);

    loop {
        println!("\n--- Menu ---");
        println!("1. Dashboard");
        println!("2. Select Panel");
        println!("3. Energy Offers");
        println!("4. Sort Offers");
        println!("5. Buy Energy");
        println!("6. Sell Energy");
        println!("7. Transaction History");
        println!("8. Refresh");
        println!("9. Logout");
        println!("0. Quit");
        let Some(choice) = read_line("Select: ") else { return MenuExit::Quit };

        match choice.as_str() {
            "1" => print_dashboard(session, selected),
            "2" => {
                if let Some(id) = select_panel(session) {
                    selected = Some(id);
                    print_dashboard(session, selected);
                }
            }
            "3" => print_offers(session),
            "4" => sort_offers(session).await,
            "5" => buy(session).await,
            "6" => sell(session, selected).await,
            "7" => print_history(session),
            "8" => {
                session.refresh().await;
                if selected.is_none() {
                    selected = first_panel(session);
                }
                println!("✓ Refreshed.");
            }
            "9" => return MenuExit::Logout,
            "0" | "q" => return MenuExit::Quit,
            _ => println!("Invalid option."),
        }
    }
}

fn first_panel(session: &Session) -> Option<u64> {
    session.panels.loaded().and_then(|p| p.first()).map(|p| p.id)
}

fn print_dashboard(session: &Session, selected: Option<u64>) {
    println!("\n=== Dashboard ===");
    let full_name = session
        .profile
        .loaded()
        .map(|u| u.full_name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("N/A");
    println!("Name:    {}", full_name);
    println!("Address: {}", checksum(&session.address));
    if let Some(balance) = show(&session.balance, "balance") {
        println!("Balance: {} ETH", format_ether(*balance));
    }

    let Some(panels) = show(&session.panels, "panels") else { return };
    if panels.is_empty() {
        println!("No Panels Registered");
        return;
    }
    let views = project_panels(panels);
    println!("Panels:");
    for view in &views {
        let marker = if Some(view.panel.id) == selected { "*" } else { " " };
        println!(" {} {}", marker, view.option_label());
    }
    if let Some(view) = views.iter().find(|v| Some(v.panel.id) == selected) {
        print_panel_view(view);
    }
}

fn print_panel_view(view: &PanelView) {
    println!("\n{}", view.info_line());
    println!("Energy Level: {}%", view.energy_percentage);
    println!("Status: {}", view.status);
}

fn select_panel(session: &Session) -> Option<u64> {
    let panels = show(&session.panels, "panels")?;
    if panels.is_empty() {
        println!("No Panels Registered");
        return None;
    }
    for view in project_panels(panels) {
        println!("  {}", view.option_label());
    }
    let input = read_line("Panel ID: ")?;
    match find_panel(panels, &input) {
        Lookup::Found(panel) => Some(panel.id),
        Lookup::NotFound | Lookup::Invalid => {
            println!("Panel not found");
            None
        }
    }
}

fn print_offers(session: &Session) {
    println!("\n=== Energy Offers ===");
    if let Some(key) = session.sort {
        println!("(sorted: {})", key.label());
    }
    let Some(sales) = show(&session.sales, "energy offers") else { return };
    if sales.is_empty() {
        println!("No energy offers available.");
        return;
    }
    for (row, sale) in sales.iter().enumerate() {
        println!("{:>3}. {}", row + 1, offer_line(sale));
    }
}

async fn sort_offers(session: &mut Session) {
    for (i, key) in SortKey::ALL.iter().enumerate() {
        println!("{}. {}", i + 1, key.label());
    }
    let Some(input) = read_line("Sort by: ") else { return };
    match parse_row(&input).and_then(|i| SortKey::ALL.get(i).copied()) {
        Some(key) => {
            session.sort_offers(key).await;
            print_offers(session);
        }
        None => println!("Invalid option."),
    }
}

/// 1-based row as displayed, to a 0-based position.
fn parse_row(input: &str) -> Option<usize> {
    input.trim().parse::<usize>().ok().and_then(|n| n.checked_sub(1))
}

async fn buy(session: &mut Session) {
    print_offers(session);
    let Some(input) = read_line("Offer number to buy: ") else { return };

    match session.buy(parse_row(&input), &mut StdinPrompt).await {
        Ok(purchase) => {
            println!(
                "✓ Bought {} kWh for {} ETH (tx {:#x})",
                purchase.sale.amount,
                format_ether(purchase.sale.price),
                purchase.tx_hash
            );
            let allocation = &purchase.allocation;
            for a in &allocation.allocated {
                println!("  {} kWh -> panel {} (tx {:#x})", a.amount, a.panel_id, a.tx_hash);
            }
            if allocation.no_panels {
                println!("You have no panels; {} kWh remains unallocated.", allocation.unallocated);
            } else if let Some(failure) = &allocation.failure {
                println!("❌ Allocation stopped: {}", failure);
                println!("{} kWh remains unallocated.", allocation.unallocated);
            } else if allocation.unallocated > 0 {
                println!("{} kWh remains unallocated.", allocation.unallocated);
            }
        }
        Err(e) => report(&e),
    }
}

/// The panel a sale draws from: the selected one if it is still listed,
/// otherwise the first.
fn sell_panel(panels: &Snapshot<Vec<Panel>>, selected: Option<u64>) -> Result<u64> {
    let panels = panels.require("panels")?;
    panels
        .iter()
        .find(|p| Some(p.id) == selected)
        .or_else(|| panels.first())
        .map(|p| p.id)
        .ok_or_else(|| LuminError::InvalidInput("You do not have any panels to sell energy from.".to_string()))
}

async fn sell(session: &mut Session, selected: Option<u64>) {
    let panel_id = match sell_panel(&session.panels, selected) {
        Ok(id) => id,
        Err(e) => return report(&e),
    };
    println!("\n=== Sell Energy (panel {}) ===", panel_id);
    let Some(amount) = read_line("Amount (kWh): ") else { return };
    let Some(price) = read_line("Price (ETH): ") else { return };

    let request = match parse_sale_request(panel_id, &amount, &price) {
        Ok(request) => request,
        Err(e) => return report(&e),
    };
    match session.sell(request).await {
        Ok(posted) => println!(
            "✓ Offer posted (tx {:#x}), panel balance reduced (tx {:#x})",
            posted.offer_tx, posted.reduce_tx
        ),
        Err(e) => report(&e),
    }
}

fn parse_sale_request(panel_id: u64, amount: &str, price: &str) -> Result<SaleRequest> {
    let invalid = || LuminError::InvalidInput("Please enter valid amounts for energy and price.".to_string());
    let amount = amount.trim().parse::<u64>().map_err(|_| invalid())?;
    let price = parse_ether(price).map_err(|_| invalid())?;
    Ok(SaleRequest { panel_id, amount, price })
}

fn print_history(session: &Session) {
    println!("\n=== Transaction History ===");
    let Some(records) = show(&session.history, "transactions") else { return };
    if records.is_empty() {
        println!("No transactions yet.");
        return;
    }
    println!("{:>4} | {:<8} | {:>10} | {:>14} | Timestamp", "#", "Type", "Amount", "Tokens (ETH)");
    for row in project_history(records) {
        println!(
            "{:>4} | {:<8} | {:>6} kWh | {:>14} | {} ({})",
            row.index,
            row.kind,
            row.amount,
            row.tokens,
            format_timestamp(row.timestamp),
            row.timestamp
        );
    }
}

async fn manager_menu(session: &mut Session) -> MenuExit {
    loop {
        println!("\n--- Manager Dashboard ---");
        println!("1. Managed Panels");
        println!("2. Managed Transactions");
        println!("3. Search Panel");
        println!("4. Search Transaction");
        println!("5. Refresh");
        println!("6. Logout");
        println!("0. Quit");
        let Some(choice) = read_line("Select: ") else { return MenuExit::Quit };

        match choice.as_str() {
            "1" => {
                if let Some(panels) = show(&session.panels, "panels") {
                    if panels.is_empty() {
                        println!("No Panels Registered");
                    }
                    panels.iter().for_each(|p| println!("{}", panel_line(p)));
                }
            }
            "2" => {
                if let Some(records) = show(&session.history, "transactions") {
                    if records.is_empty() {
                        println!("No transactions yet.");
                    }
                    records.iter().for_each(|r| println!("{}", transaction_line(r)));
                }
            }
            "3" => {
                let Some(panels) = show(&session.panels, "panels") else { continue };
                let Some(query) = read_line("Panel ID: ") else { continue };
                match find_panel(panels, &query) {
                    Lookup::Found(panel) => println!("{}", panel_line(panel)),
                    Lookup::NotFound | Lookup::Invalid => println!("Panel not found"),
                }
            }
            "4" => {
                let Some(records) = show(&session.history, "transactions") else { continue };
                let Some(query) = read_line("Transaction index: ") else { continue };
                match find_transaction(records, &query) {
                    Lookup::Found(record) => println!("{}", transaction_line(record)),
                    Lookup::NotFound => println!("Transaction not found"),
                    Lookup::Invalid => println!("Invalid transaction index"),
                }
            }
            "5" => {
                session.refresh().await;
                println!("✓ Refreshed.");
            }
            "6" => return MenuExit::Logout,
            "0" | "q" => return MenuExit::Quit,
            _ => println!("Invalid option."),
        }
    }
}

fn report(e: &LuminError) {
    if !e.is_precondition() {
        error!(error = %e, "action failed");
    }
    println!("❌ {}", e);
}

/// Asks on stdin how much of a purchase goes into each panel.
struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn allocation(&mut self, panel: &Panel, max: u64) -> Option<u64> {
        let prompt = format!(
            "Allocate to panel {} ({}), up to {} kWh [Enter = {}, s = skip]: ",
            panel.id, panel.location, max, max
        );
        let input = read_line(&prompt)?;
        parse_allocation(&input, max)
    }
}

fn parse_allocation(input: &str, max: u64) -> Option<u64> {
    match input.trim() {
        "" => Some(max),
        "s" | "skip" => None,
        other => match other.parse::<u64>() {
            Ok(amount) => Some(amount.min(max)),
            Err(_) => {
                println!("Invalid amount, skipping panel.");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::ether;

    #[test]
    fn test_login_choice() {
        assert!(matches!(parse_login_choice("1"), Ok(LoginChoice::Role(Role::Manager))));
        assert!(matches!(parse_login_choice("2"), Ok(LoginChoice::Role(Role::User))));
        assert!(matches!(parse_login_choice(""), Ok(LoginChoice::Role(Role::Unselected))));
        assert!(matches!(parse_login_choice("user"), Ok(LoginChoice::Role(Role::User))));
        assert!(matches!(parse_login_choice("q"), Ok(LoginChoice::Quit)));
        assert!(parse_login_choice("7").is_err());
    }

    #[test]
    fn test_rows_are_one_based() {
        assert_eq!(parse_row("1"), Some(0));
        assert_eq!(parse_row(" 3 "), Some(2));
        assert_eq!(parse_row("0"), None);
        assert_eq!(parse_row(""), None);
        assert_eq!(parse_row("first"), None);
    }

    #[test]
    fn test_sale_request_price_in_ether() {
        let request = parse_sale_request(4, "150", "1.5").unwrap();
        assert_eq!(request, SaleRequest { panel_id: 4, amount: 150, price: ether("1.5") });

        assert!(matches!(parse_sale_request(4, "ten", "1"), Err(LuminError::InvalidInput(_))));
        assert!(matches!(parse_sale_request(4, "10", ""), Err(LuminError::InvalidInput(_))));
        assert!(matches!(parse_sale_request(4, "10", "-1"), Err(LuminError::InvalidInput(_))));
    }

    fn panel(id: u64) -> Panel {
        Panel {
            id,
            capacity: 100,
            location: format!("Location {}", id),
            owner: None,
            energy_balance: 10,
            efficiency: 90,
        }
    }

    #[test]
    fn test_sell_without_panels_stops_before_prompting() {
        let err = sell_panel(&Snapshot::Loaded(vec![]), None).unwrap_err();
        assert!(err.to_string().contains("You do not have any panels"));

        let err = sell_panel(&Snapshot::Failed("connection refused".to_string()), Some(1)).unwrap_err();
        assert_eq!(err.to_string(), "Failed to load panels: connection refused");
        assert!(sell_panel(&Snapshot::Pending, None).is_err());
    }

    #[test]
    fn test_sell_uses_selected_or_first_panel() {
        let panels = Snapshot::Loaded(vec![panel(1), panel(4)]);
        assert_eq!(sell_panel(&panels, Some(4)).unwrap(), 4);
        assert_eq!(sell_panel(&panels, None).unwrap(), 1);
        assert_eq!(sell_panel(&panels, Some(9)).unwrap(), 1);
    }

    #[test]
    fn test_allocation_answers() {
        assert_eq!(parse_allocation("", 7), Some(7));
        assert_eq!(parse_allocation("3", 7), Some(3));
        assert_eq!(parse_allocation("30", 7), Some(7));
        assert_eq!(parse_allocation("s", 7), None);
        assert_eq!(parse_allocation("lots", 7), None);
    }
}
