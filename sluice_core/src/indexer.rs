use std::sync::Arc;

use futures::{StreamExt, stream::FuturesUnordered};
use tokio::sync::{mpsc, oneshot};
use tokio_util::{
    sync::CancellationToken,
    time::{DelayQueue, delay_queue},
};
use tracing::{debug, info};

use crate::{
    backend::{BackendError, BulkBackend, BulkResponse},
    batcher::{CommandBatcher, InFlightBatch, IndexingMetrics},
    classifier::classify,
    client::{AckSender, IndexerClient, IndexerMessage, SubmitAck},
    error::Result,
    flood::FloodController,
    observer::IndexerObserver,
    options::IndexerOptions,
    record::Submission,
    stats::{IntakeCounters, Stats, StatsSnapshot},
};

/// Turns submitted records into bulk requests.
///
/// The indexer owns the buffer, the throttle state and the stats. It runs as a
/// single task (see [`BulkIndexer::run`]) and producers talk to it through
/// [`IndexerClient`] handles.
pub struct BulkIndexer {
    tx: mpsc::Sender<IndexerMessage>,
    rx: mpsc::Receiver<IndexerMessage>,
    options: IndexerOptions,
    backend: Arc<dyn BulkBackend>,
    observer: Arc<dyn IndexerObserver>,
}

/// The state mutated by the indexer task.
struct IndexerState {
    options: IndexerOptions,
    batcher: CommandBatcher,
    flood: FloodController,
    stats: Stats,
    intake: IntakeCounters,
    metrics: IndexingMetrics,
    observer: Arc<dyn IndexerObserver>,
    /// The inactivity timer, if armed.
    timer_key: Option<delay_queue::Key>,
    /// The acknowledgment of the last accepted submission.
    pending_ack: Option<AckSender>,
    /// A forced flush stopped early because of flood control.
    force_pending: bool,
    /// Replies waiting for the buffer and the in-flight requests to be empty.
    drain_waiters: Vec<oneshot::Sender<StatsSnapshot>>,
}

struct CompletedBatch {
    batch: InFlightBatch,
    response: std::result::Result<BulkResponse, BackendError>,
}

pub async fn run_background_indexer(
    indexer: BulkIndexer,
    ct: CancellationToken,
) -> Result<StatsSnapshot> {
    indexer.run(ct).await
}

impl BulkIndexer {
    pub fn new(
        options: IndexerOptions,
        backend: Arc<dyn BulkBackend>,
        observer: Arc<dyn IndexerObserver>,
    ) -> Result<Self> {
        let options = options.validate()?;
        let (tx, rx) = mpsc::channel(options.channel_capacity);

        Ok(Self {
            tx,
            rx,
            options,
            backend,
            observer,
        })
    }

    pub fn client(&self) -> IndexerClient {
        IndexerClient {
            tx: self.tx.clone(),
        }
    }

    /// Runs the indexer until cancelled or until every client is dropped.
    ///
    /// When the clients are dropped the remaining records are flushed and the
    /// in-flight requests awaited before returning. On cancellation buffered
    /// and in-flight records are abandoned.
    pub async fn run(self, ct: CancellationToken) -> Result<StatsSnapshot> {
        let BulkIndexer {
            tx,
            mut rx,
            options,
            backend,
            observer,
        } = self;
        // Only clients keep the channel open.
        drop(tx);

        let mut timer = DelayQueue::new();
        let mut in_flight = FuturesUnordered::new();
        let mut state = IndexerState::new(options, observer);
        let mut closing = false;

        loop {
            tokio::select! {
                _ = ct.cancelled() => {
                    info!(buffered = state.batcher.len(), in_flight = in_flight.len(), "indexer cancelled");
                    break;
                }
                expired = timer.next(), if !timer.is_empty() => {
                    if expired.is_none() {
                        continue;
                    }

                    state.timer_key = None;
                    for batch in state.dispatch(true) {
                        in_flight.push(send_batch(backend.clone(), batch));
                    }
                }
                message = rx.recv(), if !closing && !state.flood.is_flooding() => {
                    match message {
                        None => {
                            debug!("all indexer clients dropped, draining");
                            closing = true;
                            for batch in state.dispatch(true) {
                                in_flight.push(send_batch(backend.clone(), batch));
                            }
                        }
                        Some(IndexerMessage::Submit { submission, reply }) => {
                            state.submit(submission, reply, &mut timer);
                            for batch in state.dispatch(false) {
                                in_flight.push(send_batch(backend.clone(), batch));
                            }
                            state.acknowledge();
                        }
                        Some(IndexerMessage::Drain { reply }) => {
                            state.drain_waiters.push(reply);
                            for batch in state.dispatch(true) {
                                in_flight.push(send_batch(backend.clone(), batch));
                            }
                        }
                    }
                }
                completed = in_flight.next(), if !in_flight.is_empty() => {
                    let Some(completed) = completed else {
                        continue;
                    };

                    state.complete(completed, &mut timer);
                    let force = state.force_pending || closing || !state.drain_waiters.is_empty();
                    for batch in state.dispatch(force) {
                        in_flight.push(send_batch(backend.clone(), batch));
                    }
                }
            }

            if state.batcher.is_empty() && in_flight.is_empty() {
                state.notify_drained();

                if closing {
                    break;
                }
            }
        }

        Ok(state.snapshot())
    }
}

impl IndexerState {
    fn new(options: IndexerOptions, observer: Arc<dyn IndexerObserver>) -> Self {
        Self {
            batcher: CommandBatcher::new(options.batch_size),
            flood: FloodController::new(&options),
            stats: Stats::default(),
            intake: IntakeCounters::default(),
            metrics: IndexingMetrics::default(),
            observer,
            timer_key: None,
            pending_ack: None,
            force_pending: false,
            drain_waiters: Vec::new(),
            options,
        }
    }

    /// Validates the submission and appends it to the buffer.
    ///
    /// Accepted submissions are acknowledged by [`IndexerState::acknowledge`],
    /// once flood control had a chance to engage.
    fn submit(
        &mut self,
        submission: Submission,
        reply: AckSender,
        timer: &mut DelayQueue<()>,
    ) {
        match submission.into_command() {
            Ok(command) => {
                self.intake.ok += 1;
                self.batcher.push(command);
                self.rearm_timer(timer);
                self.pending_ack = Some(reply);
            }
            Err(error) => {
                self.intake.error += 1;
                self.metrics.rejected_records.add(1, &[]);
                self.observer.on_error(&error);
                let _ = reply.send(Ok(SubmitAck::Rejected(error)));
            }
        }
    }

    fn acknowledge(&mut self) {
        let Some(reply) = self.pending_ack.take() else {
            return;
        };

        self.flood.hold(reply);
    }

    /// Cuts batches from the buffer while flood control allows it.
    fn dispatch(&mut self, force: bool) -> Vec<InFlightBatch> {
        let mut batches = Vec::new();

        while !self.flood.is_flooding() {
            let Some(batch) = self.batcher.flush(force) else {
                break;
            };

            self.stats.written += batch.len() as u64;
            self.metrics.written_documents.add(batch.len() as u64, &[]);
            self.metrics.active_requests.add(1, &[]);
            self.flood.on_dispatch();

            debug!(
                batch_id = batch.id,
                size = batch.len(),
                active_requests = self.flood.active_requests(),
                ceiling = self.flood.ceiling(),
                "dispatching bulk request"
            );

            self.emit_stats();
            batches.push(batch);
        }

        self.force_pending = force && !self.batcher.is_empty();

        batches
    }

    /// Classifies the response to a batch and updates the throttle.
    fn complete(&mut self, completed: CompletedBatch, timer: &mut DelayQueue<()>) {
        let CompletedBatch { batch, response } = completed;
        let batch_id = batch.id;

        let classification = classify(batch, response, self.options.max_retries);

        self.stats.inserted += classification.inserted;
        self.stats.errored += classification.errored;
        self.stats.retries += classification.retries();
        self.metrics
            .indexed_documents
            .add(classification.inserted, &[]);
        self.metrics
            .errored_documents
            .add(classification.errored, &[]);
        self.metrics
            .retried_documents
            .add(classification.retries(), &[]);

        for error in classification.errors.iter() {
            self.observer.on_error(error);
        }

        debug!(
            batch_id,
            inserted = classification.inserted,
            errored = classification.errored,
            retries = classification.retries(),
            "bulk request completed"
        );

        if !classification.retry.is_empty() {
            self.batcher.extend(classification.retry);
            // Retried records must not wait for the next submission.
            self.rearm_timer(timer);
        }

        self.metrics.active_requests.add(-1, &[]);
        self.flood.on_complete(classification.has_failures);

        self.emit_stats();
    }

    fn rearm_timer(&mut self, timer: &mut DelayQueue<()>) {
        let timeout = self.options.inactivity_timeout;
        match self.timer_key.as_ref() {
            Some(key) => timer.reset(key, timeout),
            None => self.timer_key = Some(timer.insert((), timeout)),
        }
    }

    fn notify_drained(&mut self) {
        if self.drain_waiters.is_empty() {
            return;
        }

        let snapshot = self.snapshot();
        for reply in self.drain_waiters.drain(..) {
            let _ = reply.send(snapshot);
        }
    }

    fn emit_stats(&self) {
        self.observer.on_stats(&self.snapshot());
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            written: self.stats.written,
            indexed: self.stats.inserted,
            errored: self.stats.errored,
            retries: self.stats.retries,
            active_requests: self.flood.active_requests(),
            queued: self.stats.queued(),
            ceiling: self.flood.ceiling(),
            buffered: self.batcher.len(),
            intake_ok: self.intake.ok,
            intake_error: self.intake.error,
        }
    }
}

async fn send_batch(backend: Arc<dyn BulkBackend>, batch: InFlightBatch) -> CompletedBatch {
    let response = backend.bulk(&batch.commands).await;
    CompletedBatch { batch, response }
}
