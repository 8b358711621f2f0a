//! # Core Codec Components
//!
//! Low-level wire primitives, the recursive `Variant` value type, the packet
//! envelope, and the field-descriptor engine that assembles composite
//! records from ordered codec lists.
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [SignedVLQ Length] [Payload(|Length|)]
//! ```
//!
//! The length's sign is reserved wire metadata and round-trips unchanged;
//! transport-level compression is handled separately in [`crate::transport`].

pub mod fields;
pub mod packet;
pub mod variant;
pub mod wire;
