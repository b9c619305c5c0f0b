//! Process entry point. Builds the [`ScreeningContext`] from environment
//! configuration and dispatches one JSON request per line of stdin,
//! writing one JSON response per line of stdout.
//!
//! Binding an actual network listener is out of scope: the teacher's own
//! `lwk_tiny_jrpc::JsonRpcServer` wraps this same request/dispatch/response
//! shape around a socket, and any transport a caller prefers can wrap
//! [`sanctions_screener::dispatch`] the same way.

use std::io::{self, BufRead, Write};

use sanctions_screener::{dispatch, Config, Method, ScreeningContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct RawRequest {
    method: String,
    #[serde(default)]
    params: Value,
    id: Value,
}

#[derive(Debug, Serialize)]
struct RawResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = std::env::var("SCREENER_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
    let config = Config::from_env(data_dir);
    log::info!("starting sanctions-screener with data dir {}", config.data_dir.display());

    let ctx = ScreeningContext::build(config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) if l.trim().is_empty() => continue,
            Ok(l) => l,
            Err(e) => {
                log::error!("failed to read stdin: {e}");
                break;
            }
        };

        let response = handle_line(&ctx, &line).await;
        let encoded = serde_json::to_string(&response).expect("response always serializes");
        if let Err(e) = writeln!(stdout, "{encoded}") {
            log::error!("failed to write response: {e}");
            break;
        }
    }
}

async fn handle_line(ctx: &ScreeningContext, line: &str) -> RawResponse {
    let raw: RawRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            return RawResponse {
                id: Value::Null,
                result: None,
                error: Some(format!("malformed request: {e}")),
            }
        }
    };

    let method: Method = match raw.method.parse() {
        Ok(m) => m,
        Err(e) => {
            return RawResponse {
                id: raw.id,
                result: None,
                error: Some(e.to_string()),
            }
        }
    };

    match dispatch(ctx, method, raw.params).await {
        Ok(result) => RawResponse {
            id: raw.id,
            result: Some(result),
            error: None,
        },
        Err(e) => RawResponse {
            id: raw.id,
            result: None,
            error: Some(e.to_string()),
        },
    }
}
