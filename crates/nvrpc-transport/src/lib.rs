//! Byte-stream endpoints for editor RPC.
//!
//! Provides a uniform way to obtain a readable/writable byte-stream pair:
//! - Unix domain sockets (the editor's `$NVIM` listen address)
//! - TCP sockets (`host:port`)
//! - Process stdio (when the editor spawned us as an RPC job)
//!
//! This is the lowest layer of nvrpc. Everything else builds on top of
//! the [`BoxedReader`]/[`BoxedWriter`] halves provided here.

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use traits::{split, BoxedReader, BoxedWriter, StreamPair};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
