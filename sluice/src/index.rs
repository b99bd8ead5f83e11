use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Args;
use snafu::ResultExt;
use sluice_core::{BulkIndexer, IndexerClient, IndexerOptions, StatsSnapshot, TracingObserver};
use sluice_http::ElasticsearchBulkClient;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{IndexerSnafu, IoSnafu, JoinSnafu, JsonSnafu, Result};

const STDIN_PATH: &str = "-";

/// Index JSON lines into a search backend
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Files with one JSON record per line. Reads stdin if empty or `-`.
    files: Vec<PathBuf>,
    #[clap(flatten)]
    backend: BackendArgs,
    #[clap(flatten)]
    indexer: IndexerArgs,
}

#[derive(Debug, Args)]
pub struct BackendArgs {
    /// Base URL of the search server
    #[arg(long, default_value = "http://localhost:9200")]
    url: String,
    /// Username for basic auth
    #[arg(long)]
    username: Option<String>,
    /// Password for basic auth
    #[arg(long, requires = "username")]
    password: Option<String>,
    /// Do not send the document type with each action
    #[arg(long, default_value_t = false)]
    no_document_type: bool,
}

#[derive(Debug, Args)]
pub struct IndexerArgs {
    /// Number of records per bulk request
    #[arg(long, default_value_t = 500)]
    batch_size: usize,
    /// Flush a partial batch after this many milliseconds without input
    #[arg(long, default_value_t = 1000)]
    inactivity_timeout_ms: u64,
    /// Initial number of concurrent requests before intake pauses
    #[arg(long, default_value_t = 20)]
    throttle_ceiling: usize,
    /// Lowest value the concurrency ceiling can drop to
    #[arg(long, default_value_t = 20)]
    throttle_floor: usize,
    /// How much the ceiling drops after an overloaded response
    #[arg(long, default_value_t = 2)]
    throttle_step_down: usize,
    /// How much the ceiling grows after a clean response
    #[arg(long, default_value_t = 1)]
    throttle_step_up: usize,
    /// Probability that a clean response grows the ceiling
    #[arg(long, default_value_t = 0.1)]
    throttle_increase_probability: f64,
    /// Give up on a record after this many retries
    #[arg(long)]
    max_retries: Option<u32>,
    /// Capacity of the submission channel
    #[arg(long, default_value_t = 100)]
    channel_capacity: usize,
}

impl IndexerArgs {
    pub fn options(&self) -> IndexerOptions {
        IndexerOptions::default()
            .with_batch_size(self.batch_size)
            .with_inactivity_timeout(Duration::from_millis(self.inactivity_timeout_ms))
            .with_throttle(self.throttle_ceiling, self.throttle_floor)
            .with_throttle_steps(
                self.throttle_step_down,
                self.throttle_step_up,
                self.throttle_increase_probability,
            )
            .with_max_retries(self.max_retries)
            .with_channel_capacity(self.channel_capacity)
    }
}

impl BackendArgs {
    fn bulk_client(&self) -> ElasticsearchBulkClient {
        let client = ElasticsearchBulkClient::new(&self.url)
            .with_document_type(!self.no_document_type);

        match &self.username {
            Some(username) => client.with_basic_auth(username, self.password.clone()),
            None => client,
        }
    }
}

impl IndexArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let backend = Arc::new(self.backend.bulk_client());
        let indexer = BulkIndexer::new(self.indexer.options(), backend, Arc::new(TracingObserver))
            .context(IndexerSnafu {})?;
        let client = indexer.client();

        // The first ctrl-c only stops reading, buffered records are still sent.
        let indexer_ct = CancellationToken::new();
        let indexer_task = tokio::spawn(indexer.run(indexer_ct.clone()));

        let sources = if self.files.is_empty() {
            vec![PathBuf::from(STDIN_PATH)]
        } else {
            self.files
        };

        let mut lines = 0;
        for path in sources {
            if ct.is_cancelled() {
                break;
            }
            lines += submit_lines(&client, &path, &ct).await?;
        }

        if ct.is_cancelled() {
            warn!(lines, "interrupted, draining submitted records");
        } else {
            info!(lines, "end of input, draining");
        }

        let stats = finish(client, indexer_task, indexer_ct, abandon_signal(ct)).await?;

        let output = serde_json::to_string_pretty(&stats).context(JsonSnafu {})?;
        println!("{output}");

        Ok(())
    }
}

/// Drains the indexer and waits for it to exit.
///
/// If `abandon` resolves first, the indexer is cancelled and the records it
/// still holds are dropped.
async fn finish(
    client: IndexerClient,
    indexer_task: JoinHandle<sluice_core::Result<StatsSnapshot>>,
    indexer_ct: CancellationToken,
    abandon: impl Future<Output = ()>,
) -> Result<StatsSnapshot> {
    tokio::select! {
        drained = client.drain() => {
            drained.context(IndexerSnafu {})?;
        }
        _ = abandon => {
            warn!("interrupted while draining, abandoning remaining records");
            indexer_ct.cancel();
        }
    }
    drop(client);

    indexer_task
        .await
        .context(JoinSnafu {})?
        .context(IndexerSnafu {})
}

/// Resolves on the ctrl-c that abandons the drain.
async fn abandon_signal(ct: CancellationToken) {
    if ct.is_cancelled() {
        // Reading was already interrupted, wait for another one.
        let _ = tokio::signal::ctrl_c().await;
    } else {
        ct.cancelled().await;
    }
}

async fn open(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if path.as_os_str() == STDIN_PATH {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }

    let file = tokio::fs::File::open(path)
        .await
        .context(IoSnafu { path: path.to_path_buf() })?;
    Ok(Box::new(BufReader::new(file)))
}

/// Submits every non-blank line of `path`, returning how many were submitted.
async fn submit_lines(
    client: &IndexerClient,
    path: &Path,
    ct: &CancellationToken,
) -> Result<usize> {
    let mut lines = open(path).await?.lines();
    let mut submitted = 0;

    loop {
        let line = tokio::select! {
            _ = ct.cancelled() => break,
            line = lines.next_line() => line.context(IoSnafu { path: path.to_path_buf() })?,
        };

        let Some(line) = line else {
            break;
        };

        if line.trim().is_empty() {
            continue;
        }

        // Rejected lines are reported by the observer.
        tokio::select! {
            _ = ct.cancelled() => break,
            ack = client.submit(line) => ack.context(IndexerSnafu {})?,
        };
        submitted += 1;
    }

    Ok(submitted)
}
