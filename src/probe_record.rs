use crate::CorrelationToken;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// State of the probe sent to one host during a sweep.
#[derive(Clone, Debug, serde::Serialize)]
pub struct ProbeRecord {
    pub token: CorrelationToken,
    pub address: String,
    /// Wall clock send time, serialized as RFC 3339.
    pub sent_at: DateTime<Utc>,
    pub alive: bool,
    /// Set together with `alive`, `None` otherwise.
    pub latency: Option<Duration>,
    /// A destination-unreachable message quoting this probe was received.
    pub unreachable: bool,
    #[serde(skip)]
    pub(crate) sent_instant: Instant,
}

impl ProbeRecord {
    pub(crate) fn new(token: CorrelationToken, address: String) -> Self {
        ProbeRecord {
            token,
            address,
            sent_at: Utc::now(),
            alive: false,
            latency: None,
            unreachable: false,
            sent_instant: Instant::now(),
        }
    }

    pub(crate) fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.sent_instant) >= timeout
    }
}

/// Final contents of the probe registry, keyed by correlation token.
#[derive(Debug, Default, serde::Serialize)]
#[serde(transparent)]
pub struct SweepResult {
    records: HashMap<CorrelationToken, ProbeRecord>,
}

impl SweepResult {
    pub(crate) fn new(records: HashMap<CorrelationToken, ProbeRecord>) -> Self {
        SweepResult { records }
    }

    #[must_use]
    pub fn records(&self) -> &HashMap<CorrelationToken, ProbeRecord> {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> HashMap<CorrelationToken, ProbeRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of hosts that answered, ordered by address.
    #[must_use]
    pub fn alive(&self) -> Vec<&ProbeRecord> {
        let mut alive: Vec<&ProbeRecord> = self.records.values().filter(|record| record.alive).collect();
        alive.sort_by_key(|record| sort_key(&record.address));
        alive
    }

    /// The subset of this result whose hosts answered.
    #[must_use]
    pub fn only_alive(&self) -> SweepResult {
        SweepResult::new(
            self.records
                .iter()
                .filter(|(_, record)| record.alive)
                .map(|(token, record)| (token.clone(), record.clone()))
                .collect(),
        )
    }
}

// Unparsable addresses sort after every valid one.
fn sort_key(address: &str) -> (u32, String) {
    match address.parse::<Ipv4Addr>() {
        Ok(ip) => (u32::from(ip), String::new()),
        Err(_) => (u32::MAX, address.to_owned()),
    }
}
