//! Streaming channel to the remote game service

pub mod channel;
pub mod protocol;

pub use channel::{ChannelStatus, ConnectionChannel, OutboundSender};
pub use protocol::{ClientMsg, ServerMsg};
