use sluice_observability::{Counter, UpDownCounter};

pub struct IndexingMetrics {
    pub written_documents: Counter<u64>,
    pub indexed_documents: Counter<u64>,
    pub errored_documents: Counter<u64>,
    pub retried_documents: Counter<u64>,
    pub rejected_records: Counter<u64>,
    pub active_requests: UpDownCounter<i64>,
}

impl Default for IndexingMetrics {
    fn default() -> Self {
        let meter = sluice_observability::meter("indexing");
        Self {
            written_documents: meter
                .u64_counter("sluice.documents.written")
                .with_unit("{document}")
                .with_description("documents sent to the backend, retries included")
                .build(),
            indexed_documents: meter
                .u64_counter("sluice.documents.indexed")
                .with_unit("{document}")
                .with_description("documents created or updated by the backend")
                .build(),
            errored_documents: meter
                .u64_counter("sluice.documents.errored")
                .with_unit("{document}")
                .with_description("documents that failed permanently")
                .build(),
            retried_documents: meter
                .u64_counter("sluice.documents.retried")
                .with_unit("{document}")
                .with_description("documents requeued after a retryable failure")
                .build(),
            rejected_records: meter
                .u64_counter("sluice.intake.rejected")
                .with_unit("{record}")
                .with_description("records dropped by intake validation")
                .build(),
            active_requests: meter
                .i64_up_down_counter("sluice.requests.active")
                .with_unit("{request}")
                .with_description("bulk requests in flight")
                .build(),
        }
    }
}
