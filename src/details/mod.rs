pub(crate) use completion::CompletionDetector;
pub(crate) use ping_receiver::PingReceiver;
pub(crate) use ping_sender::SenderPool;
pub(crate) use registry::ProbeRegistry;

mod completion;
pub(crate) mod icmp;
mod ping_receiver;
mod ping_sender;
mod registry;
