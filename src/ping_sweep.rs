use crate::details::icmp::v4::{IcmpV4, RawSocket, TSocket};
use crate::details::{CompletionDetector, PingReceiver, ProbeRegistry, SenderPool};
use crate::ping_error::SocketDirection;
use crate::{subnet, PingError, PingResult, SweepResult};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_WIDTH: usize = 20;
pub const DEFAULT_QUEUE_SIZE: usize = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct SweepConfig {
    /// How long every probe is waited for, counted from its own send time.
    pub timeout: Duration,
    /// Number of sender threads.
    pub width: usize,
    /// Capacity of the queue feeding the sender threads.
    pub queue_size: usize,
    pub poll_interval: Duration,
    /// Read timeout of the inbound socket, bounds how long the receiver takes to notice the end
    /// of the sweep.
    pub read_timeout: Duration,
    pub send_timeout: Duration,
}

impl SweepConfig {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        SweepConfig {
            timeout,
            width: DEFAULT_WIDTH,
            queue_size: DEFAULT_QUEUE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_timeout: DEFAULT_POLL_INTERVAL,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Pings every host of the subnet attached to `interface` once and waits `timeout` for replies.
///
/// Needs raw ICMP sockets, i.e. root or `CAP_NET_RAW`.
pub fn start_sweep(interface: &str, timeout: Duration) -> PingResult<SweepResult> {
    start_sweep_with_config(interface, &SweepConfig::new(timeout))
}

pub fn start_sweep_with_config(interface: &str, config: &SweepConfig) -> PingResult<SweepResult> {
    let hosts = subnet::host_addresses(interface)?;
    tracing::info!("sweeping {} hosts on {}", hosts.len(), interface);
    sweep_hosts(hosts, config)
}

/// Sweeps an explicit list of dotted-decimal addresses. Entries that do not parse are recorded
/// as not alive.
pub fn sweep_hosts<I>(hosts: I, config: &SweepConfig) -> PingResult<SweepResult>
where
    I: IntoIterator<Item = String>,
{
    let outbound = RawSocket::outbound(config.send_timeout.max(Duration::from_millis(1)))
        .map_err(|source| PingError::SocketOpen { direction: SocketDirection::Outbound, source })?;
    // setsockopt rejects a zero timeout.
    let read_timeout = config.read_timeout.min(config.poll_interval).max(Duration::from_millis(1));
    let inbound = RawSocket::inbound(read_timeout)
        .map_err(|source| PingError::SocketOpen { direction: SocketDirection::Inbound, source })?;
    sweep_with_sockets(hosts, config, outbound, inbound)
}

fn sweep_with_sockets<I, S>(hosts: I, config: &SweepConfig, outbound: S, inbound: S) -> PingResult<SweepResult>
where
    I: IntoIterator<Item = String>,
    S: TSocket + 'static,
{
    let start = Instant::now();
    let registry = Arc::new(ProbeRegistry::new());
    let stop = Arc::new(AtomicBool::new(false));

    // Listen before the first request leaves.
    let receiver = PingReceiver::new(IcmpV4::new(inbound, 0), registry.clone(), stop.clone()).start();

    let identifier: u16 = rand::random();
    let sender_pool =
        SenderPool::new(Arc::new(IcmpV4::new(outbound, identifier)), registry.clone(), config.width, config.queue_size);
    let send_result = sender_pool.run(hosts);

    CompletionDetector::new(registry.clone(), stop, config.timeout, config.poll_interval).wait();
    let receive_result = receiver.join();

    send_result?;
    receive_result.map_err(|_| PingError::WorkerPanicked)?;

    let sweep_result = SweepResult::new(registry.take());
    tracing::info!(
        "sweep finished in {:?}: {} of {} hosts alive",
        start.elapsed(),
        sweep_result.alive().len(),
        sweep_result.len()
    );
    Ok(sweep_result)
}
