use std::io;
use std::net::IpAddr;

pub(crate) mod raw_socket;

/// What the engine needs from an ICMP socket.
///
/// `recv_from` fills `buf` with the ICMP message only (no IP header) and returns its length
/// together with the address it came from. A read that times out returns
/// `io::ErrorKind::WouldBlock` or `io::ErrorKind::TimedOut`.
pub(crate) trait TSocket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize>;
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)>;
}
