use std::time::Duration;

use crate::error::{InvalidOptionsSnafu, Result};

/// Configuration of a [`BulkIndexer`](crate::BulkIndexer).
///
/// Options are fixed for the lifetime of the indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexerOptions {
    /// Number of command pairs after which the buffer is flushed.
    pub batch_size: usize,
    /// Time without submissions after which the buffer is flushed anyway.
    pub inactivity_timeout: Duration,
    /// Initial maximum number of in-flight bulk requests.
    pub throttle_ceiling_initial: usize,
    /// The ceiling never drops below this value.
    pub throttle_floor: usize,
    /// How much the ceiling drops after a response with retryable failures.
    pub throttle_step_down: usize,
    /// How much the ceiling grows after a lucky clean response.
    pub throttle_step_up: usize,
    /// Probability that a clean response grows the ceiling.
    pub throttle_increase_probability: f64,
    /// Maximum number of retries per document. `None` retries forever.
    pub max_retries: Option<u32>,
    /// Capacity of the intake channel.
    pub channel_capacity: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            inactivity_timeout: Duration::from_secs(1),
            throttle_ceiling_initial: 20,
            throttle_floor: 20,
            throttle_step_down: 2,
            throttle_step_up: 1,
            throttle_increase_probability: 0.1,
            max_retries: None,
            channel_capacity: 100,
        }
    }
}

impl IndexerOptions {
    /// Change the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Change the inactivity timeout.
    pub fn with_inactivity_timeout(mut self, inactivity_timeout: Duration) -> Self {
        self.inactivity_timeout = inactivity_timeout;
        self
    }

    /// Change the initial ceiling and the floor of the throttle.
    pub fn with_throttle(mut self, ceiling: usize, floor: usize) -> Self {
        self.throttle_ceiling_initial = ceiling;
        self.throttle_floor = floor;
        self
    }

    /// Change how the ceiling adapts to responses.
    pub fn with_throttle_steps(mut self, step_down: usize, step_up: usize, probability: f64) -> Self {
        self.throttle_step_down = step_down;
        self.throttle_step_up = step_up;
        self.throttle_increase_probability = probability;
        self
    }

    /// Cap the number of retries per document.
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Change the capacity of the intake channel.
    pub fn with_channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Checks the options, returning them with the ceiling raised to the floor if needed.
    pub fn validate(mut self) -> Result<Self> {
        if self.batch_size == 0 {
            return InvalidOptionsSnafu {
                message: "batch size must be at least 1",
            }
            .fail();
        }

        if self.channel_capacity == 0 {
            return InvalidOptionsSnafu {
                message: "channel capacity must be at least 1",
            }
            .fail();
        }

        if self.throttle_floor == 0 {
            return InvalidOptionsSnafu {
                message: "throttle floor must be at least 1",
            }
            .fail();
        }

        if !(0.0..=1.0).contains(&self.throttle_increase_probability) {
            return InvalidOptionsSnafu {
                message: format!(
                    "throttle increase probability {} is not between 0 and 1",
                    self.throttle_increase_probability
                ),
            }
            .fail();
        }

        self.throttle_ceiling_initial = self.throttle_ceiling_initial.max(self.throttle_floor);

        Ok(self)
    }
}
