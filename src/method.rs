//! Method dispatch, modeled on the teacher's `lwk_app::method::Method`
//! (`FromStr`/`Display` name table plus a match arm per call) but without a
//! schema registry or a bound socket — the process exposes these as plain
//! async functions a caller's own transport can wrap however it likes.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::context::ScreeningContext;
use crate::error::{Error, Result};
use crate::validation;

#[derive(Debug, thiserror::Error)]
#[error("the method '{name}' does not exist")]
pub struct MethodNotExist {
    name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(test, derive(enum_iterator::Sequence))]
pub enum Method {
    ScreenAddress,
    ScreenAddressBatch,
    ScreenTransaction,
    AuditByDate,
    AuditByCorrelationId,
    AuditByAddress,
    AuditStats,
}

impl FromStr for Method {
    type Err = MethodNotExist;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "screen_address" => Method::ScreenAddress,
            "screen_address_batch" => Method::ScreenAddressBatch,
            "screen_transaction" => Method::ScreenTransaction,
            "audit_by_date" => Method::AuditByDate,
            "audit_by_correlation_id" => Method::AuditByCorrelationId,
            "audit_by_address" => Method::AuditByAddress,
            "audit_stats" => Method::AuditStats,
            _ => {
                return Err(MethodNotExist {
                    name: s.to_string(),
                })
            }
        })
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Method::ScreenAddress => "screen_address",
            Method::ScreenAddressBatch => "screen_address_batch",
            Method::ScreenTransaction => "screen_transaction",
            Method::AuditByDate => "audit_by_date",
            Method::AuditByCorrelationId => "audit_by_correlation_id",
            Method::AuditByAddress => "audit_by_address",
            Method::AuditStats => "audit_stats",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Deserialize)]
struct ScreenAddressParams {
    address: String,
    #[serde(default)]
    include_walk: bool,
    #[serde(default = "default_max_hops")]
    max_hops: u8,
    #[serde(default = "default_correlation_id")]
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct ScreenAddressBatchParams {
    addresses: Vec<String>,
    #[serde(default)]
    include_walk: bool,
    #[serde(default = "default_max_hops")]
    max_hops: u8,
    #[serde(default = "default_correlation_id")]
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct ScreenTransactionParams {
    tx_hash: String,
    #[serde(default = "default_direction")]
    direction: String,
    #[serde(default)]
    include_metadata: bool,
    #[serde(default = "default_correlation_id")]
    correlation_id: String,
}

#[derive(Debug, Deserialize)]
struct AuditByDateParams {
    date: String,
}

#[derive(Debug, Deserialize)]
struct AuditByCorrelationIdParams {
    correlation_id: String,
    #[serde(default = "default_audit_days")]
    days: u32,
}

#[derive(Debug, Deserialize)]
struct AuditByAddressParams {
    address: String,
    #[serde(default = "default_audit_days")]
    days: u32,
}

#[derive(Debug, Deserialize)]
struct AuditStatsParams {
    #[serde(default = "default_audit_days")]
    days: u32,
}

fn default_max_hops() -> u8 {
    5
}

fn default_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_direction() -> String {
    "both".to_string()
}

fn default_audit_days() -> u32 {
    7
}

fn params<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::Validation(format!("invalid params: {e}")))
}

/// Dispatches one call to its handler, returning the raw JSON reply.
/// Params are deserialized per-method, so a caller can route on `Method`
/// without knowing every handler's concrete request type.
pub async fn dispatch(ctx: &ScreeningContext, method: Method, params_value: Value) -> Result<Value> {
    match method {
        Method::ScreenAddress => {
            let p: ScreenAddressParams = params(params_value)?;
            let result = ctx
                .address_screener
                .screen(&p.address, p.include_walk, p.max_hops, &p.correlation_id)
                .await?;
            Ok(serde_json::to_value(result)?)
        }
        Method::ScreenAddressBatch => {
            let p: ScreenAddressBatchParams = params(params_value)?;
            let results = ctx
                .address_screener
                .screen_batch(&p.addresses, p.include_walk, p.max_hops, &p.correlation_id)
                .await;
            Ok(serde_json::to_value(results)?)
        }
        Method::ScreenTransaction => {
            let p: ScreenTransactionParams = params(params_value)?;
            let direction = validation::parse_direction(&p.direction)?;
            let result = ctx
                .tx_screener
                .screen(&p.tx_hash, direction, p.include_metadata, &p.correlation_id)
                .await?;
            Ok(serde_json::to_value(result)?)
        }
        Method::AuditByDate => {
            let p: AuditByDateParams = params(params_value)?;
            Ok(serde_json::to_value(ctx.audit.by_date(&p.date))?)
        }
        Method::AuditByCorrelationId => {
            let p: AuditByCorrelationIdParams = params(params_value)?;
            Ok(serde_json::to_value(
                ctx.audit.by_correlation_id(&p.correlation_id, p.days),
            )?)
        }
        Method::AuditByAddress => {
            let p: AuditByAddressParams = params(params_value)?;
            Ok(serde_json::to_value(ctx.audit.by_address(&p.address, p.days))?)
        }
        Method::AuditStats => {
            let p: AuditStatsParams = params(params_value)?;
            Ok(serde_json::to_value(ctx.audit.stats(p.days))?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enum_iterator::all;

    #[test]
    fn method_name_roundtrip() {
        for m in all::<Method>() {
            assert_eq!(m, m.to_string().parse().unwrap());
        }
    }

    #[test]
    fn unknown_method_name_rejected() {
        assert!("wallet_load".parse::<Method>().is_err());
    }
}
