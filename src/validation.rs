//! Format checks for Bitcoin addresses and transaction hashes. No network
//! calls occur here; everything that fails is rejected before it can reach
//! the indexer.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static BASE58_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[13][a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("static regex"));

static BECH32_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^bc1[a-z0-9]{39,59}$").expect("static regex"));

// A bech32 string that differs from BECH32_ADDRESS only by case: used to
// give mixed-case bech32 input a clear validation error instead of folding
// it, per the design notes.
static BECH32_ANY_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^bc1[a-z0-9]{39,59}$").expect("static regex"));

static TX_HASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{64}$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identifier {
    Address,
    Tx,
}

pub fn is_valid_address(s: &str) -> bool {
    BASE58_ADDRESS.is_match(s) || BECH32_ADDRESS.is_match(s)
}

pub fn is_valid_tx_hash(s: &str) -> bool {
    TX_HASH.is_match(s)
}

/// Validates `s` as an address, returning a `VALIDATION` error with a
/// specific reason when it fails; mixed-case bech32 gets its own message
/// rather than being silently case-folded.
pub fn validate_address(s: &str) -> Result<()> {
    if is_valid_address(s) {
        return Ok(());
    }
    if BECH32_ANY_CASE.is_match(s) && !BECH32_ADDRESS.is_match(s) {
        return Err(Error::Validation(format!(
            "bech32 address must be all lowercase: {s}"
        )));
    }
    Err(Error::Validation(format!("not a valid bitcoin address: {s}")))
}

pub fn validate_tx_hash(s: &str) -> Result<()> {
    if is_valid_tx_hash(s) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "not a valid 64-hex transaction hash: {s}"
        )))
    }
}

pub fn classify_identifier(s: &str) -> Result<Identifier> {
    if is_valid_address(s) {
        Ok(Identifier::Address)
    } else if is_valid_tx_hash(s) {
        Ok(Identifier::Tx)
    } else {
        Err(Error::Validation(format!(
            "not a valid address or transaction hash: {s}"
        )))
    }
}

/// Direction of a transaction screen. Accepts both spellings the upstream
/// schemas disagree on and normalizes them here, per the open question in
/// the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inputs,
    Outputs,
    Both,
}

pub fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "inputs" | "incoming" => Ok(Direction::Inputs),
        "outputs" | "outgoing" => Ok(Direction::Outputs),
        "both" => Ok(Direction::Both),
        other => Err(Error::Validation(format!(
            "invalid direction (expected inputs/incoming, outputs/outgoing or both): {other}"
        ))),
    }
}
