//! Wires the individual services into one handle that request handling
//! carries around, rather than reaching for process-global statics. Mirrors
//! the teacher's `AppContext`-style struct of `Arc` handles built once in
//! `main` and threaded through every `lwk_tiny_jrpc` method handler.

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::config::Config;
use crate::indexer::{EsploraIndexerClient, IndexerClient};
use crate::sanctions::{FileSanctionsSource, SanctionsIndex};
use crate::screener::AddressScreener;
use crate::tx_screener::TxScreener;
use crate::walker::PathWalker;

/// Every long-lived service the screening pipeline needs, constructed once
/// and shared behind `Arc` across concurrent requests.
#[derive(Clone)]
pub struct ScreeningContext {
    pub config: Arc<Config>,
    pub sanctions: Arc<SanctionsIndex>,
    pub indexer: Arc<dyn IndexerClient>,
    pub walker: Arc<PathWalker>,
    pub audit: Arc<AuditLog>,
    pub address_screener: Arc<AddressScreener>,
    pub tx_screener: Arc<TxScreener>,
}

impl ScreeningContext {
    /// Builds the default production wiring: a file-backed sanctions
    /// source and an Esplora-backed indexer client.
    pub fn build(config: Config) -> Self {
        let config = Arc::new(config);

        let sanctions = Arc::new(SanctionsIndex::with_ttl(
            FileSanctionsSource::new(config.sanctions_file_path()),
            config.risk_cache_ttl(),
        ));

        let indexer: Arc<dyn IndexerClient> = Arc::new(EsploraIndexerClient::with_rate_limit(
            config.indexer_base_url.clone(),
            config.api_rate_limit,
        ));

        let walker = Arc::new(PathWalker::new(indexer.clone(), sanctions.clone()));
        let audit = Arc::new(AuditLog::new(config.audit_logs_dir.clone()));

        let address_screener = Arc::new(AddressScreener::new(
            sanctions.clone(),
            walker.clone(),
            audit.clone(),
        ));
        let tx_screener = Arc::new(TxScreener::new(
            indexer.clone(),
            address_screener.clone(),
            audit.clone(),
        ));

        ScreeningContext {
            config,
            sanctions,
            indexer,
            walker,
            audit,
            address_screener,
            tx_screener,
        }
    }
}
