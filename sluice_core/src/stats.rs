use serde::Serialize;

/// Counters of documents flowing through the bulk requests.
///
/// All counters are monotonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Documents dispatched to the backend, retries included.
    pub written: u64,
    /// Documents the backend created or updated.
    pub inserted: u64,
    /// Documents that failed permanently.
    pub errored: u64,
    /// Documents sent back to the buffer after a retryable failure.
    pub retries: u64,
}

/// Outcome counters of submissions, independent of bulk responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeCounters {
    pub ok: u64,
    pub error: u64,
}

/// A point-in-time view of the indexer, as reported to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub written: u64,
    pub indexed: u64,
    pub errored: u64,
    pub retries: u64,
    pub active_requests: usize,
    pub queued: u64,
    pub ceiling: usize,
    pub buffered: usize,
    pub intake_ok: u64,
    pub intake_error: u64,
}

impl Stats {
    /// Documents dispatched whose response has not been classified yet.
    pub fn queued(&self) -> u64 {
        self.written - self.inserted - self.errored - self.retries
    }
}
