#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::json;
use sluice_core::{
    BackendError, BulkBackend, BulkIndexer, BulkResponse, CommandPair, IndexerClient,
    IndexerError, IndexerObserver, IndexerOptions, Record, StatsSnapshot, run_background_indexer,
};
use tokio::{sync::Semaphore, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// A scripted reply of the test backend.
pub enum Reply {
    Statuses(Vec<u16>),
    Fail(BackendError),
}

/// A backend that records requests and answers from a script.
///
/// Once the script is exhausted every item gets the default status.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Vec<CommandPair>>>,
    default_status: u16,
    gate: Option<Semaphore>,
}

/// An observer that keeps everything it is told.
#[derive(Default)]
pub struct RecordingObserver {
    errors: Mutex<Vec<IndexerError>>,
    stats: Mutex<Vec<StatsSnapshot>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_status: 201,
            gate: None,
        }
    }

    pub fn with_default_status(mut self, status: u16) -> Self {
        self.default_status = status;
        self
    }

    /// Requests wait for a permit, see [`ScriptedBackend::release`].
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_reply(self, reply: Reply) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Lets `n` gated requests complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn requests(&self) -> Vec<Vec<CommandPair>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_ids(&self) -> Vec<Vec<String>> {
        self.requests()
            .iter()
            .map(|request| request.iter().map(|c| c.action.id.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl BulkBackend for ScriptedBackend {
    async fn bulk(&self, commands: &[CommandPair]) -> Result<BulkResponse, BackendError> {
        self.requests.lock().unwrap().push(commands.to_vec());

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Statuses(statuses)) => Ok(BulkResponse::from_statuses(statuses)),
            Some(Reply::Fail(error)) => Err(error),
            None => Ok(BulkResponse::from_statuses(vec![
                self.default_status;
                commands.len()
            ])),
        }
    }
}

impl RecordingObserver {
    pub fn errors(&self) -> Vec<IndexerError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn stats(&self) -> Vec<StatsSnapshot> {
        self.stats.lock().unwrap().clone()
    }
}

impl IndexerObserver for RecordingObserver {
    fn on_error(&self, error: &IndexerError) {
        self.errors.lock().unwrap().push(error.clone());
    }

    fn on_stats(&self, stats: &StatsSnapshot) {
        let queued = stats.written - stats.indexed - stats.errored - stats.retries;
        assert_eq!(stats.queued, queued);
        self.stats.lock().unwrap().push(*stats);
    }
}

pub fn create_indexer(
    options: IndexerOptions,
    backend: Arc<ScriptedBackend>,
) -> (
    JoinHandle<StatsSnapshot>,
    IndexerClient,
    Arc<RecordingObserver>,
    CancellationToken,
) {
    let observer = Arc::new(RecordingObserver::default());
    let indexer = BulkIndexer::new(options, backend, observer.clone()).expect("indexer options");

    let client = indexer.client();
    let ct = CancellationToken::new();
    let task = tokio::spawn({
        let ct = ct.clone();
        async move { run_background_indexer(indexer, ct).await.expect("indexer run") }
    });

    (task, client, observer, ct)
}

pub fn record(id: &str) -> Record {
    Record::new("test", "doc", id, json!({ "id": id }))
}
