#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

//! Concurrent ICMP liveness sweep of the IPv4 subnet attached to a network interface.
//!
//! One echo request goes to every host address. Each request carries a [`CorrelationToken`] in
//! its payload so that replies, read by a single receiver thread, can be matched back to the
//! [`ProbeRecord`] of the host. A sweep always lasts until every probe is older than the
//! configured timeout.

pub use correlation_token::CorrelationToken;
pub use ping_error::{PingError, PingResult, SocketDirection};
pub use ping_sweep::*;
pub use probe_record::{ProbeRecord, SweepResult};
pub use subnet::{default_interface, host_addresses, hosts_in_network, interface_ipv4, MIN_PREFIX};

mod correlation_token;
mod details;
mod ping_error;
mod ping_sweep;
mod probe_record;
mod subnet;
