use tracing::debug;

use crate::{
    client::{AckSender, SubmitAck},
    options::IndexerOptions,
};

/// Admission control for bulk requests.
///
/// Tracks the number of in-flight requests against a ceiling that adapts to
/// the failures reported by the backend. Once the ceiling is reached the
/// controller is *flooding*: the acknowledgment of the submission that caused
/// it is held until enough requests complete.
#[derive(Debug)]
pub struct FloodController {
    active_requests: usize,
    ceiling: usize,
    floor: usize,
    step_down: usize,
    step_up: usize,
    increase_probability: f64,
    flooding: bool,
    /// Released exactly once when flooding clears.
    pending_release: Option<AckSender>,
}

impl FloodController {
    pub fn new(options: &IndexerOptions) -> Self {
        Self {
            active_requests: 0,
            ceiling: options.throttle_ceiling_initial.max(options.throttle_floor),
            floor: options.throttle_floor,
            step_down: options.throttle_step_down,
            step_up: options.throttle_step_up,
            increase_probability: options.throttle_increase_probability,
            flooding: false,
            pending_release: None,
        }
    }

    /// Accounts for a request about to be dispatched.
    ///
    /// Returns true if the controller is flooding afterwards.
    pub fn on_dispatch(&mut self) -> bool {
        self.active_requests += 1;

        if self.active_requests >= self.ceiling && !self.flooding {
            debug!(
                active_requests = self.active_requests,
                ceiling = self.ceiling,
                "flood control engaged"
            );
            self.flooding = true;
        }

        self.flooding
    }

    /// Holds the producer's acknowledgment until flooding clears.
    pub fn hold(&mut self, reply: AckSender) {
        if !self.flooding {
            let _ = reply.send(Ok(SubmitAck::Accepted));
            return;
        }

        // Only one submission can be waiting since intake pauses while flooding.
        if let Some(previous) = self.pending_release.replace(reply) {
            let _ = previous.send(Ok(SubmitAck::Accepted));
        }
    }

    /// Accounts for a completed request and adapts the ceiling.
    ///
    /// Returns true if flooding cleared as a result.
    pub fn on_complete(&mut self, has_failures: bool) -> bool {
        self.active_requests = self.active_requests.saturating_sub(1);
        self.adjust_ceiling(has_failures);

        if !self.flooding || self.active_requests >= self.ceiling {
            return false;
        }

        debug!(
            active_requests = self.active_requests,
            ceiling = self.ceiling,
            "flood control released"
        );
        self.flooding = false;
        if let Some(reply) = self.pending_release.take() {
            let _ = reply.send(Ok(SubmitAck::Accepted));
        }

        true
    }

    fn adjust_ceiling(&mut self, has_failures: bool) {
        if has_failures {
            self.ceiling = self.ceiling.saturating_sub(self.step_down).max(self.floor);
        } else if rand::random::<f64>() < self.increase_probability {
            self.ceiling += self.step_up;
        }
    }

    pub fn is_flooding(&self) -> bool {
        self.flooding
    }

    pub fn active_requests(&self) -> usize {
        self.active_requests
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
