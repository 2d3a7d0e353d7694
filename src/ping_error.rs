use std::{fmt, io};

pub type PingResult<T> = std::result::Result<T, PingError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SocketDirection {
    Inbound,
    Outbound,
}

impl fmt::Display for SocketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketDirection::Inbound => write!(f, "inbound"),
            SocketDirection::Outbound => write!(f, "outbound"),
        }
    }
}

/// Errors of the sweep engine.
///
/// Only `InterfaceNotFound`, `NoIpv4Address`, `SocketOpen` and `WorkerPanicked` abort a sweep.
/// The others describe a single host or a single packet and are logged where they occur.
#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("interface {0} not found")]
    InterfaceNotFound(String),

    #[error("interface {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("could not open {direction} ICMP socket: {source}")]
    SocketOpen {
        direction: SocketDirection,
        #[source]
        source: io::Error,
    },

    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    #[error("malformed ICMP packet: {0}")]
    Packet(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("a sweep worker thread panicked")]
    WorkerPanicked,
}

impl PingError {
    pub(crate) fn packet(message: impl Into<String>) -> Self {
        PingError::Packet(message.into())
    }

    /// True for the errors that end a sweep rather than a single probe.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PingError::InterfaceNotFound(_)
                | PingError::NoIpv4Address(_)
                | PingError::SocketOpen { .. }
                | PingError::WorkerPanicked
        )
    }
}
