use crate::details::icmp::v4::{IcmpMessage, IcmpV4, TSocket};
use crate::details::registry::{ProbeRegistry, Update};
use crate::PingError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

// A failing socket returns at once instead of waiting for its read timeout.
const SOCKET_ERROR_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReceiveOutcome {
    Timeout,
    Matched,
    Ignored,
    Failed,
    SocketError,
}

/// Owns the inbound socket and applies every reply it reads to the registry until `stop` is set.
pub(crate) struct PingReceiver<S> {
    icmpv4: IcmpV4<S>,
    registry: Arc<ProbeRegistry>,
    stop: Arc<AtomicBool>,
}

impl<S> PingReceiver<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(icmpv4: IcmpV4<S>, registry: Arc<ProbeRegistry>, stop: Arc<AtomicBool>) -> Self {
        PingReceiver { icmpv4, registry, stop }
    }

    pub(crate) fn start(self) -> JoinHandle<()> {
        std::thread::spawn(move || self.run())
    }

    fn run(&self) {
        tracing::trace!("PingReceiver thread start");
        // The socket read is bounded by its timeout, so the flag is seen at least that often.
        while !self.stop.load(Ordering::Acquire) {
            if self.receive_once() == ReceiveOutcome::SocketError {
                std::thread::sleep(SOCKET_ERROR_BACKOFF);
            }
        }
        tracing::trace!("PingReceiver thread end");
    }

    fn receive_once(&self) -> ReceiveOutcome {
        match self.icmpv4.try_receive() {
            Ok(None) => ReceiveOutcome::Timeout,
            Ok(Some(message)) => self.dispatch(message, Instant::now()),
            Err(PingError::Io(e)) => {
                tracing::debug!("reading inbound socket failed: {}", e);
                ReceiveOutcome::SocketError
            }
            Err(e) => {
                tracing::debug!("dropping inbound ICMP packet: {}", e);
                ReceiveOutcome::Failed
            }
        }
    }

    fn dispatch(&self, message: IcmpMessage, received_at: Instant) -> ReceiveOutcome {
        match message {
            IcmpMessage::EchoReply { token, sender } => match self.registry.mark_alive(&token, received_at) {
                Update::Applied => {
                    tracing::trace!("echo reply {} from {}", token, sender);
                    ReceiveOutcome::Matched
                }
                Update::Unchanged => {
                    tracing::debug!("duplicate echo reply {} from {}", token, sender);
                    ReceiveOutcome::Ignored
                }
                Update::UnknownToken => {
                    tracing::debug!("echo reply from {} with unknown token {}", sender, token);
                    ReceiveOutcome::Ignored
                }
            },
            IcmpMessage::DestinationUnreachable { token } => match self.registry.mark_unreachable(&token) {
                Update::Applied => {
                    tracing::trace!("destination unreachable for {}", token);
                    ReceiveOutcome::Matched
                }
                Update::Unchanged | Update::UnknownToken => ReceiveOutcome::Ignored,
            },
            IcmpMessage::Other(icmp_type) => {
                tracing::debug!("ignoring ICMP message of type {}", icmp_type);
                ReceiveOutcome::Ignored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::icmp::v4::icmpv4::new_echo_request;
    use crate::details::icmp::v4::tests::{echo_reply_for, unreachable_for, OnReceive, OnSend, SocketMock};
    use crate::CorrelationToken;
    use more_asserts as ma;
    use pnet_packet::Packet;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    const HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 2);

    fn receiver(socket: SocketMock) -> (PingReceiver<SocketMock>, Arc<ProbeRegistry>, Arc<AtomicBool>) {
        let registry = Arc::new(ProbeRegistry::new());
        let stop = Arc::new(AtomicBool::new(false));
        let receiver = PingReceiver::new(IcmpV4::new(socket, 1), registry.clone(), stop.clone());
        (receiver, registry, stop)
    }

    fn registered(registry: &ProbeRegistry) -> (CorrelationToken, Vec<u8>) {
        let token = CorrelationToken::generate();
        registry.register(token.clone(), HOST.to_string());
        let request = new_echo_request(1, 1, token.as_bytes()).unwrap().packet().to_vec();
        (token, request)
    }

    #[test]
    fn echo_reply_marks_host_alive_with_latency() {
        let socket = SocketMock::new_default();
        let (receiver, registry, _stop) = receiver(socket.clone());
        let (token, request) = registered(&registry);

        std::thread::sleep(Duration::from_millis(30));
        socket.push_inbound(echo_reply_for(&request), IpAddr::V4(HOST));

        assert_eq!(ReceiveOutcome::Matched, receiver.receive_once());
        let record = registry.get(&token).unwrap();
        assert!(record.alive);
        let latency = record.latency.unwrap();
        ma::assert_ge!(latency, Duration::from_millis(30));
        ma::assert_lt!(latency, Duration::from_millis(30 + 50));
    }

    #[test]
    fn unreachable_keeps_host_down_and_is_idempotent() {
        let socket = SocketMock::new_default();
        let (receiver, registry, _stop) = receiver(socket.clone());
        let (token, request) = registered(&registry);
        let router = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1));
        socket.push_inbound(unreachable_for(&request, HOST), router);
        socket.push_inbound(unreachable_for(&request, HOST), router);

        assert_eq!(ReceiveOutcome::Matched, receiver.receive_once());
        assert_eq!(ReceiveOutcome::Ignored, receiver.receive_once());

        let record = registry.get(&token).unwrap();
        assert!(!record.alive);
        assert!(record.unreachable);
        assert!(record.latency.is_none());
    }

    #[test]
    fn reply_with_unknown_token_is_ignored() {
        let socket = SocketMock::new_default();
        let (receiver, registry, _stop) = receiver(socket.clone());
        let (token, _request) = registered(&registry);
        let stranger = new_echo_request(1, 1, CorrelationToken::generate().as_bytes()).unwrap();
        socket.push_inbound(echo_reply_for(stranger.packet()), IpAddr::V4(HOST));

        assert_eq!(ReceiveOutcome::Ignored, receiver.receive_once());
        assert!(!registry.get(&token).unwrap().alive);
        assert_eq!(1, registry.len());
    }

    #[test]
    fn malformed_packet_does_not_stop_receiving() {
        let socket = SocketMock::new_default();
        let (receiver, registry, _stop) = receiver(socket.clone());
        let (token, request) = registered(&registry);
        socket.push_inbound(vec![0u8; 3], IpAddr::V4(HOST));
        socket.push_inbound(echo_reply_for(&request), IpAddr::V4(HOST));

        assert_eq!(ReceiveOutcome::Failed, receiver.receive_once());
        assert_eq!(ReceiveOutcome::Matched, receiver.receive_once());
        assert!(registry.get(&token).unwrap().alive);
    }

    #[test]
    fn other_types_are_ignored() {
        let (receiver, _registry, _stop) = receiver(SocketMock::new_default());
        assert_eq!(ReceiveOutcome::Ignored, receiver.dispatch(IcmpMessage::Other(5), Instant::now()));
    }

    #[test]
    fn read_timeout_is_reported() {
        let (receiver, _registry, _stop) = receiver(SocketMock::new_default());
        assert_eq!(ReceiveOutcome::Timeout, receiver.receive_once());
    }

    #[test]
    fn thread_stops_when_flag_is_set() {
        let socket = SocketMock::new(OnSend::ReturnDefault, OnReceive::ReturnErr);
        let (receiver, _registry, stop) = receiver(socket);
        let handle = receiver.start();

        std::thread::sleep(Duration::from_millis(20));
        let stopped_at = Instant::now();
        stop.store(true, Ordering::Release);
        handle.join().unwrap();

        ma::assert_lt!(stopped_at.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn socket_error_is_reported() {
        let (receiver, _registry, _stop) = receiver(SocketMock::new(OnSend::ReturnDefault, OnReceive::ReturnErr));
        assert_eq!(ReceiveOutcome::SocketError, receiver.receive_once());
    }

    #[test]
    fn failing_socket_is_not_polled_in_a_tight_loop() {
        let socket = SocketMock::new(OnSend::ReturnDefault, OnReceive::ReturnErr);
        let (receiver, _registry, stop) = receiver(socket.clone());
        let handle = receiver.start();

        std::thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Release);
        handle.join().unwrap();

        ma::assert_ge!(socket.recv_calls(), 1);
        // 10ms backoff over 100ms
        ma::assert_le!(socket.recv_calls(), 12);
    }
}
