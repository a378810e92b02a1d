//! Async msgpack-RPC client for Neovim and Vim hosts.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte-stream endpoints (unix socket, tcp, stdio)
//! - [`codec`]: messages, remote handles, msgpack and line-JSON codecs
//! - [`session`]: the [`Client`], request correlation, pause/resume
//!   batching and event dispatch
//!
//! ```no_run
//! # async fn demo() -> nvrpc::Result<()> {
//! use nvrpc::{Client, ClientConfig, Endpoint, Value};
//!
//! let endpoint: Endpoint = "/tmp/nvim.sock".parse()?;
//! let (client, _events) = Client::connect(&endpoint, ClientConfig::default()).await?;
//! let two = client.request("nvim_eval", vec![Value::from("1 + 1")]).await?;
//! # let _ = two;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use nvrpc_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use nvrpc_codec::*;
}

/// Re-export session types.
pub mod session {
    pub use nvrpc_session::*;
}

pub use nvrpc_codec::{RemoteHandle, Value};
pub use nvrpc_session::{
    Client, ClientConfig, HostEvent, HostEvents, ResumeOptions, Result, RpcError,
    TransportConfig,
};
pub use nvrpc_transport::Endpoint;
