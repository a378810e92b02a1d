//! RPC sessions with an editor host.
//!
//! This is the layer applications use. Attach a [`Client`] to a byte
//! stream, issue requests and notifications, batch notifications with
//! pause/resume, and receive host requests and notifications as
//! [`HostEvent`]s.
//!
//! Two wire protocols sit behind the [`Transport`] trait:
//! - [`NativeTransport`]: msgpack-RPC
//! - [`LineJsonTransport`]: line-delimited JSON through a host trampoline

pub mod batcher;
pub mod client;
pub mod config;
pub mod correlator;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod linejson;
mod link;
pub mod native;
pub mod responder;
pub mod transport;

pub use batcher::{PauseStack, PauseTicket, QueuedCall};
pub use client::{
    ApiInfo, AtomicOutcome, BatchFailure, Client, HostEvent, HostEvents, ResumeOptions,
    GET_API_INFO,
};
pub use config::{BridgeFlavor, ClientConfig, ProtocolMode, TransportConfig};
pub use correlator::{Correlator, IdDirection, PendingReply, PendingRequest};
pub use dispatch::{classify, EventCallback, EventClass, EventRegistry};
pub use error::{Result, RpcError};
pub use handle::Handle;
pub use linejson::LineJsonTransport;
pub use native::NativeTransport;
pub use responder::Responder;
pub use transport::{Transport, TransportEvent};
