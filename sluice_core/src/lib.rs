//! Adaptive bulk batching for search indexing backends.
//!
//! ## Data flow
//!
//! **Intake**: [`Submission`] -> [`CommandPair`] appended to the buffer.
//!
//! **Batcher**: buffer -> [`InFlightBatch`], on size, inactivity or drain.
//!
//! **Flood control**: limits the number of in-flight batches and pauses
//! intake once the limit is reached.
//!
//! **Classifier**: [`BulkResponse`] -> indexed, retried and failed documents.
pub mod backend;
pub mod batcher;
pub mod classifier;
pub mod client;
pub mod error;
pub mod flood;
pub mod indexer;
pub mod observer;
pub mod options;
pub mod record;
pub mod stats;

#[cfg(test)]
pub mod test_utils;

pub use backend::{BackendError, BulkBackend, BulkItemResult, BulkResponse};
pub use batcher::InFlightBatch;
pub use client::{IndexerClient, SubmitAck};
pub use error::{ErrorKind, IndexerError, Result};
pub use indexer::{BulkIndexer, run_background_indexer};
pub use observer::{IndexerObserver, TracingObserver};
pub use options::IndexerOptions;
pub use record::{BulkAction, CommandPair, Record, Submission};
pub use stats::StatsSnapshot;
