use crate::details::icmp::v4::IcmpV4;
use crate::details::icmp::v4::TSocket;
use crate::details::registry::ProbeRegistry;
use crate::{CorrelationToken, PingError, PingResult};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type HostReceiver = Arc<Mutex<mpsc::Receiver<String>>>;

/// Fixed number of worker threads draining a bounded host queue. Each dequeued host gets a
/// registry entry and one echo request.
pub(crate) struct SenderPool<S> {
    icmpv4: Arc<IcmpV4<S>>,
    registry: Arc<ProbeRegistry>,
    width: usize,
    queue_size: usize,
}

impl<S> SenderPool<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(icmpv4: Arc<IcmpV4<S>>, registry: Arc<ProbeRegistry>, width: usize, queue_size: usize) -> Self {
        SenderPool { icmpv4, registry, width: width.max(1), queue_size: queue_size.max(1) }
    }

    /// Feeds `hosts` to the workers and returns once every host has been sent to (or skipped).
    pub(crate) fn run<I>(&self, hosts: I) -> PingResult<()>
    where
        I: IntoIterator<Item = String>,
    {
        let (host_tx, host_rx) = mpsc::sync_channel::<String>(self.queue_size);
        let host_rx: HostReceiver = Arc::new(Mutex::new(host_rx));

        let workers: Vec<JoinHandle<()>> = (0..self.width)
            .map(|_| {
                let icmpv4 = self.icmpv4.clone();
                let registry = self.registry.clone();
                let host_rx = host_rx.clone();
                std::thread::spawn(move || work(&icmpv4, &registry, &host_rx))
            })
            .collect();

        for host in hosts {
            // fails only when every worker is gone
            if host_tx.send(host).is_err() {
                tracing::error!("all sender workers stopped before the host queue was drained");
                break;
            }
        }
        drop(host_tx);

        let mut result = Ok(());
        for worker in workers {
            if worker.join().is_err() {
                result = Err(PingError::WorkerPanicked);
            }
        }
        result
    }
}

fn work<S>(icmpv4: &IcmpV4<S>, registry: &ProbeRegistry, host_rx: &HostReceiver)
where
    S: TSocket + 'static,
{
    loop {
        // The guard is dropped at the end of the statement, other workers dequeue while we send.
        let next = host_rx.lock().unwrap_or_else(std::sync::PoisonError::into_inner).recv();
        let Ok(address) = next else {
            break;
        };

        let token = CorrelationToken::generate();
        registry.register(token.clone(), address.clone());
        match icmpv4.send_echo(&address, &token) {
            Ok(_) => tracing::trace!("echo request {} sent to {}", token, address),
            Err(e) => tracing::warn!("could not ping {}: {}", address, e),
        }
    }
}
