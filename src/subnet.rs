use crate::{PingError, PingResult};
use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr};

// Interfaces created by container runtimes, never the one to sweep.
const IGNORED_INTERFACE_PREFIXES: [&str; 2] = ["br-", "docker0"];

/// Shortest prefix that is swept. A /16 is 65534 hosts, anything wider is refused.
pub const MIN_PREFIX: u8 = 16;

/// Dotted-decimal host addresses of the IPv4 subnet bound to `interface`, in ascending order.
///
/// The first IPv4 address of the interface decides the subnet. See [`hosts_in_network`] for
/// which addresses count as hosts.
pub fn host_addresses(interface: &str) -> PingResult<Vec<String>> {
    let (ip, prefix) = interface_ipv4(interface)?;
    let hosts = hosts_in_network(ip, prefix)?;
    tracing::debug!("{} hosts in {}/{} on {}", hosts.len(), ip, prefix, interface);
    Ok(hosts.iter().map(Ipv4Addr::to_string).collect())
}

/// Host addresses of the network containing `ip`/`prefix`, in ascending order.
///
/// * /16 to /30: every address except the network and the broadcast address.
/// * /31: both addresses (point-to-point link, RFC 3021).
/// * /32: the address itself.
///
/// Prefixes shorter than [`MIN_PREFIX`] are rejected with [`PingError::InvalidNetwork`].
pub fn hosts_in_network(ip: Ipv4Addr, prefix: u8) -> PingResult<Vec<Ipv4Addr>> {
    if prefix < MIN_PREFIX {
        return Err(PingError::InvalidNetwork(format!(
            "{ip}/{prefix} is wider than /{MIN_PREFIX}, refusing to sweep it"
        )));
    }
    let network = Ipv4Network::new(ip, prefix).map_err(|e| PingError::InvalidNetwork(e.to_string()))?;
    let first = u32::from(network.network());
    let last = u32::from(network.broadcast());
    let range = if prefix >= 31 { first..=last } else { first + 1..=last - 1 };
    Ok(range.map(Ipv4Addr::from).collect())
}

/// First IPv4 address of `interface` and its prefix length.
pub fn interface_ipv4(interface: &str) -> PingResult<(Ipv4Addr, u8)> {
    let network_interface = pnet_datalink::interfaces()
        .into_iter()
        .find(|network_interface| network_interface.name == interface)
        .ok_or_else(|| PingError::InterfaceNotFound(interface.to_owned()))?;

    network_interface
        .ips
        .iter()
        .find_map(|ip_network| match ip_network.ip() {
            IpAddr::V4(ip) => Some((ip, ip_network.prefix())),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| PingError::NoIpv4Address(interface.to_owned()))
}

/// Name of the first interface that is up, not loopback, not a container bridge and has an IPv4
/// address.
#[must_use]
pub fn default_interface() -> Option<String> {
    pnet_datalink::interfaces()
        .into_iter()
        .filter(|network_interface| network_interface.is_up() && !network_interface.is_loopback())
        .filter(|network_interface| {
            !IGNORED_INTERFACE_PREFIXES
                .iter()
                .any(|prefix| network_interface.name.starts_with(prefix))
        })
        .find(|network_interface| network_interface.ips.iter().any(|ip_network| ip_network.is_ipv4()))
        .map(|network_interface| network_interface.name)
}
