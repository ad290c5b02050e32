//! Named records decoded from the contract's positional tuples.
//!
//! Field positions follow the EnergyManagement getters:
//! - `users(address)`: name, full name, password hash, _, is manager, ...
//! - panels: id, capacity, location, owner, _, energy balance, efficiency
//! - sales: creator info, seller, amount (kWh), price (wei)
//! - transactions: from, to, produced, consumed, token amount (wei), timestamp

use std::fmt::Display;

use ethers::abi::Token;
use ethers::types::{Address, U256};
use serde::Serialize;

use crate::error::{LuminError, Result};
use crate::units::checksum;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub full_name: String,
    pub password_hash: [u8; 32],
    pub is_manager: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Panel {
    pub id: u64,
    /// kWh
    pub capacity: u64,
    pub location: String,
    pub owner: Option<String>,
    /// kWh
    pub energy_balance: u64,
    /// percent
    pub efficiency: u64,
}

impl Panel {
    pub fn remaining_capacity(&self) -> u64 {
        self.capacity.saturating_sub(self.energy_balance)
    }
}

/// An open offer. `index` is the offer's position in the contract's list at
/// fetch time and is what `buyEnergy` is addressed by; it is not stable
/// across concurrent purchases by other accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sale {
    pub index: usize,
    pub creator: String,
    #[serde(serialize_with = "serialize_checksum")]
    pub seller: Address,
    /// kWh
    pub amount: u64,
    /// wei, total for the whole amount
    #[serde(serialize_with = "serialize_display")]
    pub price: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    pub index: usize,
    pub from: String,
    pub to: String,
    pub produced: u64,
    pub consumed: u64,
    /// wei
    #[serde(serialize_with = "serialize_display")]
    pub token_amount: U256,
    pub timestamp: u64,
}

fn serialize_display<T: Display, S: serde::Serializer>(value: &T, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(value)
}

fn serialize_checksum<S: serde::Serializer>(value: &Address, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&checksum(value))
}

impl User {
    /// Accepts the getter's outputs either flattened into a tuple or as one struct.
    pub fn from_token(token: Token) -> Result<Self> {
        let mut fields = fields_of(token, "user")?;
        if fields.len() == 1 && matches!(fields[0], Token::Tuple(_)) {
            fields = fields_of(fields.remove(0), "user")?;
        }
        let password_hash: [u8; 32] = field(&fields, 2, "password hash")?
            .into_fixed_bytes()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| bad_field("password hash"))?;

        Ok(User {
            name: string_at(&fields, 0, "name")?,
            full_name: string_at(&fields, 1, "full name")?,
            password_hash,
            is_manager: field(&fields, 4, "manager flag")?
                .into_bool()
                .ok_or_else(|| bad_field("manager flag"))?,
        })
    }
}

impl Panel {
    pub fn from_tokens(fields: Vec<Token>) -> Result<Self> {
        Ok(Panel {
            id: u64_at(&fields, 0, "panel id")?,
            capacity: u64_at(&fields, 1, "capacity")?,
            location: string_at(&fields, 2, "location")?,
            owner: fields.get(3).cloned().and_then(Token::into_address).map(|a| checksum(&a)),
            energy_balance: u64_at(&fields, 5, "energy balance")?,
            efficiency: u64_at(&fields, 6, "efficiency")?,
        })
    }
}

impl Sale {
    pub fn from_tokens(index: usize, fields: Vec<Token>) -> Result<Self> {
        Ok(Sale {
            index,
            creator: label_at(&fields, 0, "creator")?,
            seller: field(&fields, 1, "seller")?
                .into_address()
                .ok_or_else(|| bad_field("seller"))?,
            amount: u64_at(&fields, 2, "amount")?,
            price: uint_at(&fields, 3, "price")?,
        })
    }
}

impl TransactionRecord {
    pub fn from_tokens(index: usize, fields: Vec<Token>) -> Result<Self> {
        Ok(TransactionRecord {
            index,
            from: label_at(&fields, 0, "from")?,
            to: label_at(&fields, 1, "to")?,
            produced: u64_at(&fields, 2, "produced")?,
            consumed: u64_at(&fields, 3, "consumed")?,
            token_amount: uint_at(&fields, 4, "token amount")?,
            timestamp: u64_at(&fields, 5, "timestamp")?,
        })
    }
}

/// Split a `tuple[]` return value into per-record field lists.
pub fn records(list: Token, what: &str) -> Result<Vec<Vec<Token>>> {
    let items = list
        .into_array()
        .ok_or_else(|| LuminError::Abi(format!("{}: output is not a list", what)))?;
    items.into_iter().map(|item| fields_of(item, what)).collect()
}

fn fields_of(token: Token, what: &str) -> Result<Vec<Token>> {
    token
        .into_tuple()
        .ok_or_else(|| LuminError::Abi(format!("{}: entry is not a record", what)))
}

fn field(fields: &[Token], index: usize, what: &str) -> Result<Token> {
    fields
        .get(index)
        .cloned()
        .ok_or_else(|| LuminError::Abi(format!("record has no {} (field {})", what, index)))
}

fn string_at(fields: &[Token], index: usize, what: &str) -> Result<String> {
    field(fields, index, what)?.into_string().ok_or_else(|| bad_field(what))
}

/// Text for a field that may be a name or an address.
fn label_at(fields: &[Token], index: usize, what: &str) -> Result<String> {
    Ok(match field(fields, index, what)? {
        Token::String(s) => s,
        Token::Address(a) => checksum(&a),
        other => other.to_string(),
    })
}

fn uint_at(fields: &[Token], index: usize, what: &str) -> Result<U256> {
    field(fields, index, what)?.into_uint().ok_or_else(|| bad_field(what))
}

fn u64_at(fields: &[Token], index: usize, what: &str) -> Result<u64> {
    let value = uint_at(fields, index, what)?;
    if value > U256::from(u64::MAX) {
        return Err(bad_field(what));
    }
    Ok(value.as_u64())
}

fn bad_field(what: &str) -> LuminError {
    LuminError::Abi(format!("{} has an unexpected type or size", what))
}
