use crate::details::registry::ProbeRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decides when a sweep is over: once every registered probe is `timeout` old. Replies do not
/// end a sweep early.
pub(crate) struct CompletionDetector {
    registry: Arc<ProbeRegistry>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
    poll_interval: Duration,
}

impl CompletionDetector {
    pub(crate) fn new(
        registry: Arc<ProbeRegistry>,
        stop: Arc<AtomicBool>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        CompletionDetector { registry, stop, timeout, poll_interval }
    }

    pub(crate) fn is_done(&self, now: Instant) -> bool {
        self.registry.all_expired(self.timeout, now)
    }

    /// Blocks until the sweep is done, then raises the stop flag.
    ///
    /// Must be called after the sender pool has returned, otherwise a probe that is dequeued
    /// but not yet registered would be missed.
    pub(crate) fn wait(&self) {
        while !self.is_done(Instant::now()) {
            std::thread::sleep(self.poll_interval);
        }
        tracing::trace!("all {} probes expired", self.registry.len());
        self.stop.store(true, Ordering::Release);
    }
}
