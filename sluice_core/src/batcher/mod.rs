use std::{collections::VecDeque, fmt::Debug};

use crate::record::CommandPair;

pub use self::metrics::IndexingMetrics;

mod metrics;

/// Buffers command pairs and cuts them into bulk batches.
pub struct CommandBatcher {
    /// Size threshold after which to flush the buffer
    batch_size: usize,
    /// Buffered command pairs, in submission order
    buffer: VecDeque<CommandPair>,
    /// Id of the next batch
    next_batch_id: u64,
}

/// A batch of command pairs waiting for the backend's response.
pub struct InFlightBatch {
    /// Sequential id, used for logging.
    pub id: u64,
    /// The commands, in the order they were sent.
    pub commands: Vec<CommandPair>,
}

impl CommandBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            buffer: VecDeque::new(),
            next_batch_id: 0,
        }
    }

    /// Appends a command pair to the tail of the buffer.
    pub fn push(&mut self, command: CommandPair) {
        self.buffer.push_back(command);
    }

    /// Appends command pairs to the tail of the buffer, keeping their order.
    pub fn extend(&mut self, commands: impl IntoIterator<Item = CommandPair>) {
        self.buffer.extend(commands);
    }

    /// Removes the next batch from the head of the buffer.
    ///
    /// Returns `None` if the buffer is empty, or if `force` is false and the
    /// buffer holds fewer than `batch_size` pairs.
    pub fn flush(&mut self, force: bool) -> Option<InFlightBatch> {
        if self.buffer.is_empty() {
            return None;
        }

        if !force && self.buffer.len() < self.batch_size {
            return None;
        }

        let size = self.buffer.len().min(self.batch_size);
        let commands = self
            .buffer
            .drain(..size)
            .map(|mut command| {
                command.attempts += 1;
                command
            })
            .collect();

        let id = self.next_batch_id;
        self.next_batch_id += 1;

        Some(InFlightBatch { id, commands })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[cfg(test)]
    pub fn buffered(&self) -> impl Iterator<Item = &CommandPair> {
        self.buffer.iter()
    }
}

impl InFlightBatch {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Debug for InFlightBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightBatch")
            .field("id", &self.id)
            .field("commands", &format!("<{} entries>", self.commands.len()))
            .finish()
    }
}
