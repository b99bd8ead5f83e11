use tokio::sync::{mpsc, oneshot};

use crate::{
    error::{ChannelClosedSnafu, IndexerError, Result},
    record::Submission,
    stats::StatsSnapshot,
};

/// The acknowledgment of a submission.
#[derive(Debug, Clone)]
pub enum SubmitAck {
    /// The record is in the buffer.
    Accepted,
    /// The record was dropped. The error was also reported to the observer.
    Rejected(IndexerError),
}

pub type AckSender = oneshot::Sender<Result<SubmitAck>>;

pub(crate) enum IndexerMessage {
    Submit {
        submission: Submission,
        reply: AckSender,
    },
    Drain {
        reply: oneshot::Sender<StatsSnapshot>,
    },
}

/// A handle to submit records to a running [`BulkIndexer`](crate::BulkIndexer).
#[derive(Clone)]
pub struct IndexerClient {
    pub(crate) tx: mpsc::Sender<IndexerMessage>,
}

impl IndexerClient {
    /// Submits one record, or its JSON encoding.
    ///
    /// The returned future does not resolve while the indexer is flooding.
    pub async fn submit(&self, submission: impl Into<Submission>) -> Result<SubmitAck> {
        let (tx, rx) = oneshot::channel();

        self.tx
            .send(IndexerMessage::Submit {
                submission: submission.into(),
                reply: tx,
            })
            .await
            .or_else(|_| ChannelClosedSnafu {}.fail())?;

        rx.await.or_else(|_| ChannelClosedSnafu {}.fail())?
    }

    /// Flushes every buffered record and waits for all in-flight requests.
    ///
    /// Returns the stats once nothing is buffered or in flight.
    pub async fn drain(&self) -> Result<StatsSnapshot> {
        let (tx, rx) = oneshot::channel();

        self.tx
            .send(IndexerMessage::Drain { reply: tx })
            .await
            .or_else(|_| ChannelClosedSnafu {}.fail())?;

        rx.await.or_else(|_| ChannelClosedSnafu {}.fail())
    }
}

impl SubmitAck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitAck::Accepted)
    }
}
