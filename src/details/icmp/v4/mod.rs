pub(crate) mod icmpv4;
pub(crate) use icmpv4::{IcmpMessage, IcmpV4};

mod socket;
pub(crate) use socket::raw_socket::RawSocket;
pub(crate) use socket::TSocket;

#[cfg(test)]
pub(crate) use socket::tests;
