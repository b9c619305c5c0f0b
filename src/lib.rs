#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! # sanctions-screener
//!
//! Screens Bitcoin addresses and transactions against cryptocurrency
//! sanctions lists (currently OFAC's SDN list), with an optional bounded
//! walk of the transaction graph to surface indirect exposure.
//!
//! For an entry point see [`context::ScreeningContext::build`].

pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod indexer;
pub mod method;
pub mod model;
pub mod risk;
pub mod sanctions;
pub mod screener;
pub mod tx_screener;
pub mod validation;
pub mod walker;

pub use crate::config::Config;
pub use crate::context::ScreeningContext;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::method::{dispatch, Method};
pub use crate::model::{
    AuditEntry, BitcoinTransaction, PathAnalysis, RiskLevel, SanctionEntity, SanctionMatch,
    ScreeningResult, TxScreeningResult,
};
pub use crate::screener::AddressScreener;
pub use crate::tx_screener::TxScreener;
