//! # Packet Envelope
//!
//! Wire envelope framing: `type: u8` + `SignedVLQ length` + `payload` of
//! `length.abs()` bytes. The sign of the length is reserved wire metadata
//! (historically a compression flag) and must round-trip unchanged, so the
//! envelope keeps the signed value alongside the payload.
//!
//! A [`Packet`] also carries the exact bytes as they appeared on the wire;
//! forwarding always replays those bytes so an untouched packet is
//! bit-identical on the far side.

use std::sync::Arc;

use bytes::Bytes;

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::fields::FieldMap;
use crate::core::wire::WireWriter;
use crate::error::{ProtocolError, Result};

/// Which way a packet is travelling through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → real server.
    ToUpstream,
    /// Real server → client.
    ToClient,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::ToUpstream => "to_upstream",
            Direction::ToClient => "to_client",
        }
    }
}

/// One fully-read packet: envelope, payload, and (optionally) its decoded
/// structured form.
#[derive(Debug, Clone)]
pub struct Packet {
    pub direction: Direction,
    /// Numeric packet-type id.
    pub packet_type: u8,
    /// Signed length exactly as it appeared on the wire.
    pub length: i64,
    pub payload: Bytes,
    /// `type + length + payload` as sent. Forwarding replays this buffer.
    pub raw: Bytes,
    /// Structured decode, filled in only when a gate declared interest.
    pub parsed: Option<Arc<FieldMap>>,
    /// Content hash of the payload, filled in when the cache was consulted.
    pub content_hash: Option<u64>,
}

impl Packet {
    /// Assemble an envelope from parts. The payload length is encoded with
    /// the requested sign.
    pub fn build(packet_type: u8, payload: &[u8], negative_length: bool) -> Result<Packet> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPacket(payload.len()));
        }
        let length = if negative_length {
            -(payload.len() as i64)
        } else {
            payload.len() as i64
        };

        let mut w = WireWriter::new();
        w.write_u8(packet_type);
        w.write_signed_vlq(length);
        w.write_raw(payload);
        let raw: Bytes = w.into_bytes().freeze();

        Ok(Packet {
            direction: Direction::ToUpstream,
            packet_type,
            length,
            payload: raw.slice(raw.len() - payload.len()..),
            raw,
            parsed: None,
            content_hash: None,
        })
    }

}

/// Content hash for the payload cache: payload length folded with a CRC of
/// the raw bytes.
pub fn content_hash(payload: &[u8]) -> u64 {
    ((payload.len() as u64) << 32) ^ u64::from(crc32fast::hash(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wire::WireReader;

    #[test]
    fn envelope_roundtrip_small_payload() {
        let payload = b"ping";
        let pkt = Packet::build(6, payload, false).unwrap();

        let mut r = WireReader::new(&pkt.raw);
        assert_eq!(r.read_u8().unwrap(), 6);
        assert_eq!(r.read_signed_vlq().unwrap(), 4);
        assert_eq!(r.take(4).unwrap(), payload);
        assert!(r.is_empty());
    }

    #[test]
    fn envelope_roundtrip_large_payload() {
        // Well above any cache threshold.
        let payload = vec![0xabu8; 2048];
        let pkt = Packet::build(6, &payload, false).unwrap();

        let mut r = WireReader::new(&pkt.raw);
        assert_eq!(r.read_u8().unwrap(), 6);
        let len = r.read_signed_vlq().unwrap();
        assert_eq!(len, 2048);
        assert_eq!(r.take(len as usize).unwrap(), &payload[..]);
    }

    #[test]
    fn negative_length_sign_roundtrips() {
        let pkt = Packet::build(17, b"abc", true).unwrap();
        assert_eq!(pkt.length, -3);

        let mut r = WireReader::new(&pkt.raw);
        r.read_u8().unwrap();
        assert_eq!(r.read_signed_vlq().unwrap(), -3);
        assert_eq!(r.take(3).unwrap(), b"abc");
    }

    #[test]
    fn oversized_payload_rejected() {
        let huge = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            Packet::build(1, &huge, false),
            Err(ProtocolError::OversizedPacket(_))
        ));
    }

    #[test]
    fn content_hash_distinguishes_payloads() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
        assert_ne!(content_hash(b""), content_hash(b"\0"));
    }
}
