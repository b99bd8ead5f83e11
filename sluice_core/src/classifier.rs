//! Classification of bulk responses.
//!
//! Every item of a bulk response falls into one of four buckets:
//!
//! - `200`/`201`: indexed.
//! - `503`: the backend is overloaded, the command pair goes back to the buffer.
//! - `400`: the backend rejected the document. Reported, never retried.
//! - anything else: handled like `400`, reported as an unknown response code.
use std::collections::BTreeMap;

use crate::{
    backend::{BackendError, BulkItemResult, BulkResponse},
    batcher::InFlightBatch,
    error::IndexerError,
    record::CommandPair,
};

const STATUS_OK: u16 = 200;
const STATUS_CREATED: u16 = 201;
const STATUS_BAD_REQUEST: u16 = 400;
const STATUS_UNAVAILABLE: u16 = 503;

/// The outcome of classifying one bulk response.
#[derive(Debug, Default)]
pub struct Classification {
    /// Number of documents created or updated.
    pub inserted: u64,
    /// Number of documents that failed permanently.
    pub errored: u64,
    /// Command pairs to append to the buffer, in response order.
    pub retry: Vec<CommandPair>,
    /// Errors to report, one per failed document or one for the whole batch.
    pub errors: Vec<IndexerError>,
    /// Whether the backend signaled overload for any item.
    pub has_failures: bool,
}

/// Classifies the response to an in-flight batch.
///
/// A pair that was already sent more than `max_retries + 1` times is reported
/// as [`IndexerError::RetriesExhausted`] instead of being retried.
pub fn classify(
    batch: InFlightBatch,
    response: Result<BulkResponse, BackendError>,
    max_retries: Option<u32>,
) -> Classification {
    let size = batch.len();

    let items = match response {
        Ok(response) if response.items.len() == size => response.items,
        Ok(response) => {
            return Classification::failed_batch(
                size,
                IndexerError::MalformedResponse {
                    size,
                    items: response.items.len(),
                },
            );
        }
        Err(source) => {
            return Classification::failed_batch(size, IndexerError::Transport { size, source });
        }
    };

    let mut groups = BTreeMap::<u16, Vec<usize>>::new();
    for (index, item) in items.iter().enumerate() {
        groups.entry(item.status).or_default().push(index);
    }

    let mut commands = batch.commands.into_iter().map(Some).collect::<Vec<_>>();
    let mut classification = Classification::default();

    for (status, indices) in groups {
        match status {
            STATUS_OK | STATUS_CREATED => {
                classification.inserted += indices.len() as u64;
            }
            STATUS_UNAVAILABLE => {
                classification.has_failures = true;
                for index in indices {
                    let Some(command) = commands[index].take() else {
                        continue;
                    };

                    if max_retries.is_some_and(|max| command.attempts > max) {
                        classification.errored += 1;
                        classification.errors.push(IndexerError::RetriesExhausted {
                            id: command.action.id,
                            attempts: command.attempts,
                            document: command.document,
                            item: items[index].raw.clone(),
                        });
                    } else {
                        classification.retry.push(command);
                    }
                }
            }
            _ => {
                for index in indices {
                    let Some(command) = commands[index].take() else {
                        continue;
                    };

                    classification.errored += 1;
                    classification
                        .errors
                        .push(item_error(status, command, &items[index]));
                }
            }
        }
    }

    classification
}

impl Classification {
    fn failed_batch(size: usize, error: IndexerError) -> Self {
        Self {
            errored: size as u64,
            errors: vec![error],
            ..Default::default()
        }
    }

    /// Number of documents sent back to the buffer.
    pub fn retries(&self) -> u64 {
        self.retry.len() as u64
    }
}

fn item_error(status: u16, command: CommandPair, item: &BulkItemResult) -> IndexerError {
    let CommandPair {
        action, document, ..
    } = command;

    if status == STATUS_BAD_REQUEST {
        IndexerError::Rejected {
            id: action.id,
            status,
            document,
            detail: item.error.clone(),
            item: item.raw.clone(),
        }
    } else {
        IndexerError::UnknownStatus {
            id: action.id,
            status,
            document,
            detail: item.error.clone(),
            item: item.raw.clone(),
        }
    }
}
