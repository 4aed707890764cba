//! hps-net
//!
//! Networking layer for the HPS client.
//!
//! A single reactor task owns the WebSocket event channel to the current
//! server, runs the mutual-auth handshake, correlates server replies with
//! blocking callers, and drives the PoW-gated request flows. Command
//! handlers hold a cloneable [`Client`] handle.

pub mod event;
pub mod reactor;
pub mod session;
pub mod transport;

pub use event::{Envelope, SearchResult};
pub use reactor::{
    spawn, Client, ClientSnapshot, DownloadOutcome, LoginOutcome, NetworkInfo, ReactorConfig,
    ResolveOutcome, UploadOutcome, UploadRequest,
};
pub use session::Session;
pub use transport::{TransportConfig, TransportEvent, TransportHandle};
