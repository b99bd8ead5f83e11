use std::path::PathBuf;

use snafu::Snafu;
use sluice_core::IndexerError;
use sluice_observability::ObservabilityError;

/// CLI error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CliError {
    #[snafu(display("Failed to initialize observability"))]
    Observability { source: ObservabilityError },
    #[snafu(display("Indexer error"))]
    Indexer { source: IndexerError },
    #[snafu(display("Failed to read {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Indexer task failed"))]
    Join { source: tokio::task::JoinError },
    #[snafu(display("JSON error"))]
    Json { source: serde_json::Error },
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;
