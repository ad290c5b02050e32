//! User-facing strings for chain values: ether amounts and addresses.

use ethers::types::{Address, U256};
use ethers::utils;

use crate::error::{LuminError, Result};

/// Ether with trailing zeros dropped: `2`, `0.25`.
pub fn format_ether(wei: U256) -> String {
    let full = utils::format_ether(wei);
    match full.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                whole.to_string()
            } else {
                format!("{}.{}", whole, fraction)
            }
        }
        None => full,
    }
}

/// Parse an ether amount typed by the user into wei.
pub fn parse_ether(input: &str) -> Result<U256> {
    let input = input.trim();
    // parse_units accepts a sign and would wrap negatives into huge values
    if input.is_empty() || input.starts_with('-') || input.starts_with('+') {
        return Err(LuminError::InvalidInput(format!("'{}' is not an ether amount", input)));
    }
    utils::parse_ether(input)
        .map_err(|e| LuminError::InvalidInput(format!("'{}' is not an ether amount: {}", input, e)))
}

pub fn parse_address(input: &str) -> Result<Address> {
    input
        .trim()
        .parse::<Address>()
        .map_err(|e| LuminError::InvalidInput(format!("'{}' is not an address: {}", input.trim(), e)))
}

/// EIP-55 form. `Address`'s own Display elides the middle.
pub fn checksum(address: &Address) -> String {
    utils::to_checksum(address, None)
}

#[cfg(test)]
pub fn ether(amount: &str) -> U256 {
    utils::parse_ether(amount).unwrap()
}
