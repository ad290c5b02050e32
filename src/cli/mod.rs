pub mod query;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::views::SortKey;

#[derive(Parser)]
#[command(name = "lumin")]
#[command(about = "Peer-to-peer solar energy trading client", long_about = None)]
pub struct Cli {
    /// Config file, created with defaults when missing
    #[arg(long, default_value = "lumin.toml")]
    pub config: PathBuf,
    /// Overrides node.rpc_url
    #[arg(long)]
    pub rpc_url: Option<String>,
    /// Overrides contract.address
    #[arg(long)]
    pub contract: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the open energy offers
    Offers {
        #[arg(long, value_enum)]
        sort: Option<SortKey>,
        #[arg(long)]
        json: bool,
    },
    /// List the panels registered to an address
    Panels {
        #[arg(long)]
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the transaction history of an address
    History {
        #[arg(long)]
        address: String,
        #[arg(long)]
        json: bool,
    },
    /// List node accounts with their balances
    Accounts,
}
