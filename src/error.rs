//! # Error Types
//!
//! Error handling for the proxy core.
//!
//! This module defines all error variants that can occur while decoding the
//! wire format, driving the frame transport, or running a proxy session.
//!
//! ## Error Categories
//! - **I/O Errors**: socket and file system failures
//! - **Codec Errors**: malformed varints, truncated fields, oversized packets
//! - **Transport Errors**: compression failures, closed connections
//! - **Configuration Errors**: invalid or unreadable proxy configuration
//!
//! Structural decode failures carry the partially built field mapping so a
//! caller can see how far the parser got before the stream went bad.

use std::io;
use thiserror::Error;

use crate::core::fields::FieldMap;

/// Primary error type for all proxy operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Stream ended inside a varint sequence")]
    MalformedVarint,

    #[error("Short read: needed {needed} bytes, {available} available")]
    ShortRead { needed: usize, available: usize },

    #[error("Unknown variant tag: {0:#04x}")]
    UnknownVariantTag(u8),

    #[error("Decode error at field `{field}`: {reason}")]
    Decode {
        field: String,
        reason: String,
        /// Fields successfully parsed before the failure.
        partial: FieldMap,
    },

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Upstream connection never became ready")]
    UpstreamUnavailable,

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Session torn down")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Wrap a lower-level codec error with the field being parsed and the
    /// mapping built so far.
    pub fn in_field(self, field: &str, partial: FieldMap) -> Self {
        match self {
            ProtocolError::Decode { .. } => self,
            other => ProtocolError::Decode {
                field: field.to_string(),
                reason: other.to_string(),
                partial,
            },
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
