use crate::probe_record::ProbeRecord;
use crate::CorrelationToken;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Update {
    Applied,
    Unchanged,
    UnknownToken,
}

/// Token to probe record map shared by the sender pool, the receiver and the completion
/// detector. Every access goes through one mutex and no guard leaves this type.
#[derive(Default)]
pub(crate) struct ProbeRegistry {
    probes: Mutex<HashMap<CorrelationToken, ProbeRecord>>,
}

impl ProbeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    // A panicking worker must not take the results of the others with it.
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationToken, ProbeRecord>> {
        self.probes.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn register(&self, token: CorrelationToken, address: String) {
        let record = ProbeRecord::new(token.clone(), address);
        let previous = self.lock().insert(token, record);
        debug_assert!(previous.is_none(), "correlation token reused");
    }

    pub(crate) fn mark_alive(&self, token: &CorrelationToken, received_at: Instant) -> Update {
        let mut probes = self.lock();
        match probes.get_mut(token) {
            None => Update::UnknownToken,
            Some(record) if record.alive => Update::Unchanged,
            Some(record) => {
                record.alive = true;
                record.latency = Some(received_at.saturating_duration_since(record.sent_instant));
                Update::Applied
            }
        }
    }

    /// Marks the host down, even after an echo reply. Repeating it changes nothing.
    pub(crate) fn mark_unreachable(&self, token: &CorrelationToken) -> Update {
        let mut probes = self.lock();
        match probes.get_mut(token) {
            None => Update::UnknownToken,
            Some(record) if record.unreachable && !record.alive => Update::Unchanged,
            Some(record) => {
                record.alive = false;
                record.latency = None;
                record.unreachable = true;
                Update::Applied
            }
        }
    }

    /// True once every registered probe is at least `timeout` old.
    pub(crate) fn all_expired(&self, timeout: Duration, now: Instant) -> bool {
        self.lock().values().all(|record| record.is_expired(timeout, now))
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn take(&self) -> HashMap<CorrelationToken, ProbeRecord> {
        std::mem::take(&mut *self.lock())
    }

    #[cfg(test)]
    pub(crate) fn get(&self, token: &CorrelationToken) -> Option<ProbeRecord> {
        self.lock().get(token).cloned()
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Vec<ProbeRecord> {
        self.lock().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_one() -> (ProbeRegistry, CorrelationToken) {
        let registry = ProbeRegistry::new();
        let token = CorrelationToken::generate();
        registry.register(token.clone(), "192.168.1.2".to_string());
        (registry, token)
    }

    #[test]
    fn register_inserts_record_that_is_not_alive() {
        let (registry, token) = registry_with_one();
        let record = registry.get(&token).unwrap();
        assert_eq!("192.168.1.2", record.address);
        assert!(!record.alive);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn mark_alive_sets_latency_once() {
        let (registry, token) = registry_with_one();
        let sent = registry.get(&token).unwrap().sent_instant;

        let first = registry.mark_alive(&token, sent + Duration::from_millis(12));
        let second = registry.mark_alive(&token, sent + Duration::from_millis(40));

        assert_eq!(Update::Applied, first);
        assert_eq!(Update::Unchanged, second);
        let record = registry.get(&token).unwrap();
        assert!(record.alive);
        assert_eq!(Some(Duration::from_millis(12)), record.latency);
    }

    #[test]
    fn unknown_token_changes_nothing() {
        let (registry, token) = registry_with_one();
        let stranger = CorrelationToken::generate();

        assert_eq!(Update::UnknownToken, registry.mark_alive(&stranger, Instant::now()));
        assert_eq!(Update::UnknownToken, registry.mark_unreachable(&stranger));

        let record = registry.get(&token).unwrap();
        assert!(!record.alive);
        assert!(!record.unreachable);
    }

    #[test]
    fn mark_unreachable_is_idempotent() {
        let (registry, token) = registry_with_one();

        assert_eq!(Update::Applied, registry.mark_unreachable(&token));
        assert_eq!(Update::Unchanged, registry.mark_unreachable(&token));

        let record = registry.get(&token).unwrap();
        assert!(!record.alive);
        assert!(record.unreachable);
    }

    #[test]
    fn unreachable_after_reply_marks_host_down() {
        let (registry, token) = registry_with_one();
        registry.mark_alive(&token, Instant::now());

        assert_eq!(Update::Applied, registry.mark_unreachable(&token));
        assert_eq!(Update::Unchanged, registry.mark_unreachable(&token));

        let record = registry.get(&token).unwrap();
        assert!(!record.alive);
        assert!(record.unreachable);
        assert!(record.latency.is_none());
    }

    #[test]
    fn all_expired_waits_for_newest_probe() {
        let registry = ProbeRegistry::new();
        registry.register(CorrelationToken::generate(), "10.0.0.1".to_string());
        std::thread::sleep(Duration::from_millis(20));
        registry.register(CorrelationToken::generate(), "10.0.0.2".to_string());
        let newest = registry.snapshot().iter().map(|r| r.sent_instant).max().unwrap();
        let timeout = Duration::from_millis(100);

        assert!(!registry.all_expired(timeout, newest + Duration::from_millis(90)));
        assert!(registry.all_expired(timeout, newest + timeout));
    }

    #[test]
    fn empty_registry_is_expired() {
        assert!(ProbeRegistry::new().all_expired(Duration::from_secs(3), Instant::now()));
    }

    #[test]
    fn take_empties_registry() {
        let (registry, token) = registry_with_one();
        let records = registry.take();
        assert!(records.contains_key(&token));
        assert_eq!(0, registry.len());
    }
}
