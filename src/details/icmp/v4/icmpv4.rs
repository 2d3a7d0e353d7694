use super::TSocket;
use crate::{CorrelationToken, PingError, PingResult};
use pnet_packet::icmp::{
    destination_unreachable::DestinationUnreachablePacket,
    echo_reply::EchoReplyPacket,
    echo_request::{EchoRequestPacket, MutableEchoRequestPacket},
    IcmpPacket, IcmpTypes,
};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, Ordering};

// Ethernet MTU, enough for any message the receiver cares about.
pub(crate) const RECEIVE_BUFFER_SIZE: usize = 1500;

/// Inbound ICMP message, reduced to what the sweep needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum IcmpMessage {
    EchoReply { token: CorrelationToken, sender: IpAddr },
    DestinationUnreachable { token: CorrelationToken },
    Other(u8),
}

pub(crate) struct IcmpV4<S> {
    socket: S,
    identifier: u16,
    next_sequence_number: AtomicU16,
}

impl<S> IcmpV4<S>
where
    S: TSocket + 'static,
{
    pub(crate) fn new(socket: S, identifier: u16) -> IcmpV4<S> {
        IcmpV4 { socket, identifier, next_sequence_number: AtomicU16::new(1) }
    }

    /// Sends one echo request carrying `token` to the dotted-decimal `address`.
    pub(crate) fn send_echo(&self, address: &str, token: &CorrelationToken) -> PingResult<usize> {
        let addr: socket2::SockAddr = resolve(address)?.into();
        let sequence_number = self.next_sequence_number.fetch_add(1, Ordering::Relaxed);
        let package = new_echo_request(self.identifier, sequence_number, token.as_bytes())
            .ok_or_else(|| PingError::packet("could not create ICMP echo request"))?;
        Ok(self.socket.send_to(package.packet(), &addr)?)
    }

    /// Reads one message. `Ok(None)` means the read timed out.
    pub(crate) fn try_receive(&self) -> PingResult<Option<IcmpMessage>> {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        match self.socket.recv_from(&mut buf) {
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => Ok(None),
            Err(e) => Err(e.into()),
            Ok((n, sender)) => parse_icmp_message(&buf[..n], sender).map(Some),
        }
    }
}

pub(crate) fn resolve(address: &str) -> PingResult<SocketAddr> {
    let ip = address
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| PingError::InvalidAddress(address.to_owned()))?;
    Ok(SocketAddr::new(IpAddr::V4(ip), 0))
}

pub(crate) fn new_echo_request(
    identifier: u16,
    sequence_number: u16,
    payload: &[u8],
) -> Option<MutableEchoRequestPacket<'static>> {
    let buf = vec![0u8; EchoRequestPacket::minimum_packet_size() + payload.len()];
    let mut package = MutableEchoRequestPacket::owned(buf)?;
    package.set_icmp_type(IcmpTypes::EchoRequest);
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number);
    package.set_payload(payload);

    package.set_checksum(0_u16);
    let checksum = pnet_packet::icmp::checksum(&IcmpPacket::new(package.packet())?);
    package.set_checksum(checksum);
    Some(package)
}

pub(crate) fn parse_icmp_message(buf: &[u8], sender: IpAddr) -> PingResult<IcmpMessage> {
    let icmp_package = IcmpPacket::new(buf).ok_or_else(|| PingError::packet("shorter than an ICMP header"))?;
    let icmp_type = icmp_package.get_icmp_type();

    if icmp_type == IcmpTypes::EchoReply {
        let echo_reply = EchoReplyPacket::new(buf).ok_or_else(|| PingError::packet("truncated echo reply"))?;
        let token = CorrelationToken::from_payload(echo_reply.payload())
            .ok_or_else(|| PingError::packet("echo reply without correlation token"))?;
        Ok(IcmpMessage::EchoReply { token, sender })
    } else if icmp_type == IcmpTypes::DestinationUnreachable {
        let unreachable = DestinationUnreachablePacket::new(buf)
            .ok_or_else(|| PingError::packet("truncated destination unreachable"))?;
        let token = quoted_token(unreachable.payload())?;
        Ok(IcmpMessage::DestinationUnreachable { token })
    } else {
        Ok(IcmpMessage::Other(icmp_type.0))
    }
}

// The body of an error message quotes the offending datagram: its IPv4 header, then (here) the
// echo request we sent.
fn quoted_token(quoted: &[u8]) -> PingResult<CorrelationToken> {
    let ipv4_package = Ipv4Packet::new(quoted).ok_or_else(|| PingError::packet("truncated quoted IPv4 header"))?;
    if ipv4_package.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return Err(PingError::packet("quoted datagram is not ICMP"));
    }
    let quoted_payload = ipv4_payload(&ipv4_package, quoted)?;
    let echo_request = EchoRequestPacket::new(quoted_payload)
        .filter(|request| request.get_icmp_type() == IcmpTypes::EchoRequest)
        .ok_or_else(|| PingError::packet("quoted datagram is not an echo request"))?;
    CorrelationToken::from_payload(echo_request.payload())
        .ok_or_else(|| PingError::packet("quoted echo request without complete correlation token"))
}

/// Bytes following the IPv4 header in `buf`. Only the header length field is trusted, quoted
/// datagrams are usually cut short of their total length.
pub(crate) fn ipv4_payload<'a>(ipv4_package: &Ipv4Packet<'_>, buf: &'a [u8]) -> PingResult<&'a [u8]> {
    let header_length = usize::from(ipv4_package.get_header_length()) * 4;
    if header_length < Ipv4Packet::minimum_packet_size() {
        return Err(PingError::packet("invalid IPv4 header length"));
    }
    buf.get(header_length..).ok_or_else(|| PingError::packet("truncated IPv4 options"))
}
