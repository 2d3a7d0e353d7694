use super::TSocket;
use crate::details::icmp::v4::icmpv4::{ipv4_payload, RECEIVE_BUFFER_SIZE};
use pnet_packet::ipv4::Ipv4Packet;
use socket2::{Domain, Protocol, Type};
use std::io::{self, Read};
use std::net::IpAddr;
use std::time::Duration;

/// `SOCK_RAW` ICMPv4 socket. Needs root or `CAP_NET_RAW`.
pub(crate) struct RawSocket {
    socket: socket2::Socket,
}

impl RawSocket {
    pub(crate) fn outbound(send_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating outbound RawSocket");
        let socket = Self::open()?;
        socket.set_write_timeout(Some(send_timeout))?;
        Ok(RawSocket { socket })
    }

    pub(crate) fn inbound(read_timeout: Duration) -> Result<Self, io::Error> {
        tracing::trace!("creating inbound RawSocket");
        let socket = Self::open()?;
        socket.set_read_timeout(Some(read_timeout))?;
        Ok(RawSocket { socket })
    }

    fn open() -> Result<socket2::Socket, io::Error> {
        socket2::Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
    }
}

impl TSocket for RawSocket {
    fn send_to(&self, buf: &[u8], addr: &socket2::SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr)> {
        // On a raw socket every read yields a whole IPv4 datagram. The sender is taken from its
        // header, which avoids reading into uninitialized memory through `Socket::recv_from`.
        let mut recv_buf = [0u8; RECEIVE_BUFFER_SIZE];
        let n = (&self.socket).read(&mut recv_buf)?;
        let datagram = &recv_buf[..n];

        let ipv4_package = Ipv4Packet::new(datagram)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "datagram shorter than an IPv4 header"))?;
        let icmp_bytes = ipv4_payload(&ipv4_package, datagram)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if buf.len() < icmp_bytes.len() {
            return Err(io::Error::new(io::ErrorKind::Other, "buffer too small"));
        }
        buf[..icmp_bytes.len()].copy_from_slice(icmp_bytes);

        Ok((icmp_bytes.len(), IpAddr::V4(ipv4_package.get_source())))
    }
}
