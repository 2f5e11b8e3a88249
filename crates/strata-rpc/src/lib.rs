//! Message-passing substrate: services hosted on worker threads, called by
//! name with correlated replies, plus proxies that let workers call back into
//! objects owned by the host.
#![forbid(unsafe_code)]

pub mod encoder;
pub mod error;
pub mod message;
pub mod proxy;
pub mod service;
pub mod thread;
pub mod value;

pub use encoder::{DecodeContext, Encoder, PacketEncoder};
pub use error::RpcError;
pub use message::{Envelope, Message, Outbox, Signatures};
pub use proxy::{ProxyHandle, ProxyRegistry, ProxyTarget};
pub use service::{ArgReader, Command, Service, ServiceContext};
pub use thread::{PendingCall, Thread, ThreadOptions};
pub use value::Value;
