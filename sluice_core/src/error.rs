use std::sync::Arc;

use serde_json::Value;
use snafu::Snafu;

use crate::backend::BackendError;

/// Indexer error types.
///
/// Apart from [`IndexerError::ChannelClosed`] and [`IndexerError::InvalidOptions`],
/// these errors are never returned to the producer. They are reported to the
/// [`IndexerObserver`](crate::IndexerObserver) and processing continues.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum IndexerError {
    /// The textual record could not be decoded.
    #[snafu(display("failed to parse record: {source}"))]
    Parse {
        text: String,
        #[snafu(source(from(serde_json::Error, Arc::new)))]
        source: Arc<serde_json::Error>,
    },
    /// The record has no index name.
    #[snafu(display("record is missing the index name"))]
    MissingIndexName { data: Value },
    /// The record has no type name.
    #[snafu(display("record is missing the type name"))]
    MissingTypeName { data: Value },
    /// The record has no document id.
    #[snafu(display("record is missing the document id"))]
    MissingDocumentId { data: Value },
    /// The backend call failed as a whole.
    #[snafu(display("bulk request with {size} documents failed: {source}"))]
    Transport { size: usize, source: BackendError },
    /// The backend answered without one result per document.
    #[snafu(display(
        "bulk request with {size} documents returned {items} item results"
    ))]
    MalformedResponse { size: usize, items: usize },
    /// The backend rejected a document.
    #[snafu(display("document {id} rejected by backend with status {status}"))]
    Rejected {
        id: String,
        status: u16,
        document: Value,
        detail: Option<Value>,
        item: Value,
    },
    /// The backend returned a status the classifier does not know.
    #[snafu(display("unknown response code {status} for document {id}"))]
    UnknownStatus {
        id: String,
        status: u16,
        document: Value,
        detail: Option<Value>,
        item: Value,
    },
    /// A document kept failing with a retryable status.
    #[snafu(display("document {id} still overloaded after {attempts} attempts"))]
    RetriesExhausted {
        id: String,
        attempts: u32,
        document: Value,
        item: Value,
    },
    /// The indexer options are not usable.
    #[snafu(display("invalid options: {message}"))]
    InvalidOptions { message: String },
    /// The indexer task is gone.
    #[snafu(display("indexer channel closed"))]
    ChannelClosed,
}

/// Broad category of an [`IndexerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed text or missing required fields. Local to one record.
    Input,
    /// The whole bulk request failed.
    Transport,
    /// The backend refused a single document.
    Item,
    /// Misuse of the indexer itself.
    Indexer,
}

impl IndexerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexerError::Parse { .. }
            | IndexerError::MissingIndexName { .. }
            | IndexerError::MissingTypeName { .. }
            | IndexerError::MissingDocumentId { .. } => ErrorKind::Input,
            IndexerError::Transport { .. } | IndexerError::MalformedResponse { .. } => {
                ErrorKind::Transport
            }
            IndexerError::Rejected { .. }
            | IndexerError::UnknownStatus { .. }
            | IndexerError::RetriesExhausted { .. } => ErrorKind::Item,
            IndexerError::InvalidOptions { .. } | IndexerError::ChannelClosed => {
                ErrorKind::Indexer
            }
        }
    }

    /// The offending document, if the error concerns a single one.
    pub fn document(&self) -> Option<&Value> {
        match self {
            IndexerError::MissingIndexName { data }
            | IndexerError::MissingTypeName { data }
            | IndexerError::MissingDocumentId { data } => Some(data),
            IndexerError::Rejected { document, .. }
            | IndexerError::UnknownStatus { document, .. }
            | IndexerError::RetriesExhausted { document, .. } => Some(document),
            _ => None,
        }
    }
}

pub type Result<T, E = IndexerError> = std::result::Result<T, E>;
