//! # Protocol Layer
//!
//! The packet-specific vocabulary: the closed packet-type table, the
//! field-descriptor record definitions, the id → decoder registry with its
//! payload cache, and the connection state machine.

pub mod records;
pub mod registry;
pub mod state;
pub mod types;

pub use registry::{PacketRegistry, PayloadCache};
pub use state::ConnectionState;
pub use types::PacketType;
