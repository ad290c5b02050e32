use std::fmt;

use thiserror::Error;

/// Why a login attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    RoleNotSelected,
    NoMatch,
    RoleMismatch,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::RoleNotSelected => write!(f, "please select a role before logging in"),
            AuthFailure::NoMatch => write!(f, "invalid username or password"),
            AuthFailure::RoleMismatch => write!(f, "selected role does not match the user's role"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LuminError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication failed: {0}")]
    Authentication(AuthFailure),
    #[error("Connectivity error: {0}")]
    Connectivity(String),
    #[error("Node returned an error: {0}")]
    Rpc(String),
    #[error("Failed to load {what}: {cause}")]
    DataFetch { what: String, cause: String },
    #[error("You cannot buy energy from yourself")]
    SelfTrade,
    #[error("Please select an energy offer to purchase")]
    NoSelection,
    #[error("The selected panel only has {available} kWh available ({requested} kWh requested)")]
    InsufficientEnergy { available: u64, requested: u64 },
    #[error("Transaction failed: {0}")]
    Transaction(String),
    #[error("Timed out waiting for confirmation of {0}")]
    Timeout(String),
    #[error("ABI error: {0}")]
    Abi(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LuminError {
    pub fn data_fetch(what: impl Into<String>, cause: impl fmt::Display) -> Self {
        LuminError::DataFetch { what: what.into(), cause: cause.to_string() }
    }

    /// Local precondition failures: nothing was submitted to the chain.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            LuminError::SelfTrade
                | LuminError::NoSelection
                | LuminError::InsufficientEnergy { .. }
                | LuminError::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LuminError>;
