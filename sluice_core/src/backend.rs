use async_trait::async_trait;
use serde_json::Value;
use snafu::Snafu;

use crate::record::CommandPair;

/// Errors returned by a [`BulkBackend`] when the request fails as a whole.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum BackendError {
    #[snafu(display("request error: {message}"))]
    Request { message: String },
    #[snafu(display("response error: status={status}, message={message}"))]
    Response { status: u16, message: String },
    #[snafu(display("invalid response: {message}"))]
    InvalidResponse { message: String },
}

/// The search backend the indexer ships bulk requests to.
#[async_trait]
pub trait BulkBackend: Send + Sync + 'static {
    /// Sends the command pairs as one bulk request.
    ///
    /// On success the response must hold one item per command, in order.
    async fn bulk(&self, commands: &[CommandPair]) -> Result<BulkResponse, BackendError>;
}

/// Per-item results of a bulk request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub items: Vec<BulkItemResult>,
}

/// The result of a single command in a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemResult {
    /// The HTTP-like status code.
    pub status: u16,
    /// The backend's error detail, if any.
    pub error: Option<Value>,
    /// The raw item, as returned by the backend.
    pub raw: Value,
}

impl BulkItemResult {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            error: None,
            raw: Value::Null,
        }
    }

    pub fn with_error(mut self, error: Value) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }
}

impl BulkResponse {
    pub fn from_statuses(statuses: impl IntoIterator<Item = u16>) -> Self {
        Self {
            items: statuses.into_iter().map(BulkItemResult::new).collect(),
        }
    }
}
