//! Login against on-chain user records.

use std::fmt;
use std::str::FromStr;

use ethers::types::Address;
use ethers::utils::keccak256;
use tracing::{debug, info};

use crate::client::{EnergyContract, Node};
use crate::error::{AuthFailure, LuminError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The "Select Role" placeholder.
    Unselected,
    Manager,
    User,
}

impl Role {
    pub fn is_manager(&self) -> bool {
        matches!(self, Role::Manager)
    }
}

impl FromStr for Role {
    type Err = LuminError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "select role" => Ok(Role::Unselected),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(LuminError::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unselected => write!(f, "Select Role"),
            Role::Manager => write!(f, "Manager"),
            Role::User => write!(f, "User"),
        }
    }
}

/// keccak-256 of the UTF-8 password, the form the contract stores.
pub fn password_hash(password: &str) -> [u8; 32] {
    keccak256(password.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated {
    pub address: Address,
    pub is_manager: bool,
}

/// Scan the node's accounts for a record whose name and password hash match.
/// The first such record decides: its manager flag must agree with `role`.
pub async fn authenticate(
    node: &dyn Node,
    contract: &dyn EnergyContract,
    role: Role,
    username: &str,
    password: &str,
) -> Result<Authenticated> {
    if role == Role::Unselected {
        return Err(LuminError::Authentication(AuthFailure::RoleNotSelected));
    }

    let hash = password_hash(password);
    let accounts = node.accounts().await.map_err(connectivity)?;
    debug!(accounts = accounts.len(), "scanning accounts for login");

    for address in accounts {
        let user = contract.user(&address).await.map_err(connectivity)?;
        if user.name != username || user.password_hash != hash {
            continue;
        }
        if user.is_manager != role.is_manager() {
            return Err(LuminError::Authentication(AuthFailure::RoleMismatch));
        }
        info!(?address, manager = user.is_manager, "login succeeded");
        return Ok(Authenticated { address, is_manager: user.is_manager });
    }

    Err(LuminError::Authentication(AuthFailure::NoMatch))
}

fn connectivity(e: LuminError) -> LuminError {
    match e {
        LuminError::Connectivity(_) => e,
        other => LuminError::Connectivity(other.to_string()),
    }
}
