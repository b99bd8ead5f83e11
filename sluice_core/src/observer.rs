use tracing::{debug, warn};

use crate::{error::IndexerError, stats::StatsSnapshot};

/// Receives the errors and stats produced by the indexer.
///
/// Callbacks run on the indexer task and must not block.
pub trait IndexerObserver: Send + Sync + 'static {
    fn on_error(&self, error: &IndexerError);

    fn on_stats(&self, stats: &StatsSnapshot);
}

/// An observer that logs everything with `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl IndexerObserver for TracingObserver {
    fn on_error(&self, error: &IndexerError) {
        match error.document() {
            Some(document) => {
                warn!(kind = ?error.kind(), %document, "{error}");
            }
            None => {
                warn!(kind = ?error.kind(), "{error}");
            }
        }
    }

    fn on_stats(&self, stats: &StatsSnapshot) {
        debug!(
            written = stats.written,
            indexed = stats.indexed,
            errored = stats.errored,
            retries = stats.retries,
            active_requests = stats.active_requests,
            queued = stats.queued,
            ceiling = stats.ceiling,
            "indexer stats"
        );
    }
}
