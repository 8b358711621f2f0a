//! # Starbridge
//!
//! A transparent man-in-the-middle proxy for a binary game-network
//! protocol. Starbridge sits between game clients and an upstream game
//! server, relaying every packet byte-for-byte while offering external
//! collaborators a decoded view of the traffic and a veto over individual
//! packets.
//!
//! ## Layers
//!
//! - **[`core`]**: wire primitives, the recursive
//!   [`core::variant::Variant`] value type, the packet envelope, and the
//!   descriptor-driven payload field engine.
//! - **[`protocol`]**: the packet-type table, per-type payload layouts, the
//!   decoded-payload cache, and the connection-lifecycle state machine.
//! - **[`transport`]**: framed packet I/O over byte streams, including the
//!   mid-session zstd compression upgrade.
//! - **[`service`]**: the TCP proxy server, per-connection sessions, and the
//!   [`service::Gate`] trait collaborators implement.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use starbridge::config::ProxyConfig;
//! use starbridge::service::{AllowAll, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> starbridge::error::Result<()> {
//!     let config = ProxyConfig::default();
//!     let server = ProxyServer::new(config, Arc::new(AllowAll));
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;

pub use config::ProxyConfig;
pub use error::{ProtocolError, Result};
pub use service::{AllowAll, Gate, ProxyServer};
