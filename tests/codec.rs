//! Property-based tests for the wire codec layer using proptest
//!
//! These tests validate codec invariants across a wide range of randomly
//! generated inputs: varint round-trips, variant tree round-trips, and the
//! descriptor-driven payload engine.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;

use starbridge::core::fields::{build_fields, parse_fields, FieldValue};
use starbridge::core::packet::Packet;
use starbridge::core::variant::Variant;
use starbridge::core::wire::{WireReader, WireString, WireWriter};
use starbridge::error::ProtocolError;
use starbridge::protocol::registry::PacketRegistry;
use starbridge::protocol::types::PacketType;

// Property: every u64 round-trips through the unsigned varint
proptest! {
    #[test]
    fn prop_vlq_roundtrip(v in any::<u64>()) {
        let mut w = WireWriter::new();
        w.write_vlq(v);
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        prop_assert_eq!(r.read_vlq().expect("decode should not fail"), v);
        prop_assert!(r.is_empty());
    }
}

// Property: every i64 round-trips through the zig-zag style signed varint,
// including i64::MIN (covered by the explicit case below as well)
proptest! {
    #[test]
    fn prop_signed_vlq_roundtrip(v in any::<i64>()) {
        let mut w = WireWriter::new();
        w.write_signed_vlq(v);
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        prop_assert_eq!(r.read_signed_vlq().expect("decode should not fail"), v);
        prop_assert!(r.is_empty());
    }
}

// Property: the encoding is minimal. Only the final byte clears the
// continuation bit, and multi-byte encodings never lead with 0x80.
proptest! {
    #[test]
    fn prop_vlq_encoding_is_minimal(v in any::<u64>()) {
        let mut w = WireWriter::new();
        w.write_vlq(v);
        let bytes = w.into_bytes();

        let (last, head) = bytes.split_last().expect("at least one byte");
        prop_assert_eq!(last & 0x80, 0);
        for b in head {
            prop_assert_eq!(b & 0x80, 0x80);
        }
        if bytes.len() > 1 {
            prop_assert_ne!(bytes[0], 0x80);
        }
    }
}

#[test]
fn vlq_known_vectors() {
    for (value, expected) in [
        (0u64, &[0x00][..]),
        (1, &[0x01]),
        (127, &[0x7F]),
        (128, &[0x81, 0x00]),
        (300, &[0x82, 0x2C]),
        (u64::MAX, &[0x81, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]),
    ] {
        let mut w = WireWriter::new();
        w.write_vlq(value);
        assert_eq!(w.as_slice(), expected, "encoding of {value}");
    }
}

#[test]
fn signed_vlq_known_vectors() {
    for (value, expected) in [
        (0i64, &[0x00][..]),
        (1, &[0x02]),
        (-1, &[0x01]),
        (2, &[0x04]),
        (-5, &[0x09]),
    ] {
        let mut w = WireWriter::new();
        w.write_signed_vlq(value);
        assert_eq!(w.as_slice(), expected, "encoding of {value}");
    }
}

#[test]
fn signed_vlq_extremes_roundtrip() {
    for value in [i64::MIN, i64::MIN + 1, i64::MAX, i64::MAX - 1] {
        let mut w = WireWriter::new();
        w.write_signed_vlq(value);
        let bytes = w.into_bytes();
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.read_signed_vlq().unwrap(), value);
    }
}

#[test]
fn unterminated_vlq_is_malformed() {
    let mut r = WireReader::new(&[0x80; 11]);
    assert!(matches!(r.read_vlq(), Err(ProtocolError::MalformedVarint)));
}

#[test]
fn truncated_vlq_is_malformed() {
    let mut r = WireReader::new(&[0x82]);
    assert!(matches!(r.read_vlq(), Err(ProtocolError::MalformedVarint)));
}

// -- Variant ---------------------------------------------------------------

fn variant_strategy() -> impl Strategy<Value = Variant> {
    let leaf = prop_oneof![
        Just(Variant::Null),
        any::<f64>().prop_filter("NaN breaks equality", |f| !f.is_nan()).prop_map(Variant::Double),
        any::<bool>().prop_map(Variant::Bool),
        any::<i64>().prop_map(Variant::Int),
        "[a-z0-9 ]{0,16}".prop_map(|s| Variant::String(WireString::Text(s))),
        prop::collection::vec(any::<u8>(), 0..8)
            .prop_map(|b| Variant::String(WireString::from_bytes(b))),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Variant::Array),
            prop::collection::vec(("[a-z]{1,8}", inner), 0..4).prop_map(|pairs| {
                Variant::Dict(
                    pairs
                        .into_iter()
                        .map(|(k, v)| (WireString::Text(k), v))
                        .collect(),
                )
            }),
        ]
    })
}

proptest! {
    // Property: any variant tree survives encode/decode, and re-encoding
    // the decoded tree reproduces the original bytes exactly.
    #[test]
    fn prop_variant_roundtrip_byte_exact(value in variant_strategy()) {
        let mut w = WireWriter::new();
        value.encode(&mut w);
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes);
        let decoded = Variant::decode(&mut r).expect("decode should not fail");
        prop_assert!(r.is_empty());
        prop_assert_eq!(&decoded, &value);

        let mut w2 = WireWriter::new();
        decoded.encode(&mut w2);
        prop_assert_eq!(w2.as_slice(), &bytes[..]);
    }
}

#[test]
fn variant_unknown_tag_is_rejected() {
    let mut r = WireReader::new(&[0x08]);
    assert!(matches!(
        Variant::decode(&mut r),
        Err(ProtocolError::UnknownVariantTag(8))
    ));
}

#[test]
fn variant_dict_preserves_insertion_order() {
    let dict = Variant::Dict(vec![
        (WireString::Text("zulu".into()), Variant::Int(1)),
        (WireString::Text("alpha".into()), Variant::Int(2)),
        (WireString::Text("zulu2".into()), Variant::Int(3)),
    ]);
    let mut w = WireWriter::new();
    dict.encode(&mut w);
    let bytes = w.into_bytes();

    let mut r = WireReader::new(&bytes);
    let decoded = Variant::decode(&mut r).unwrap();
    let Variant::Dict(pairs) = &decoded else {
        panic!("expected dict");
    };
    let keys: Vec<_> = pairs.iter().map(|(k, _)| k.as_text().unwrap()).collect();
    assert_eq!(keys, ["zulu", "alpha", "zulu2"]);
}

// -- Field engine ----------------------------------------------------------

#[test]
fn chat_packet_roundtrips_through_registry_specs() {
    let registry = PacketRegistry::new();
    let specs = registry
        .specs(PacketType::ChatSent.id())
        .expect("chat_sent is registered");

    let payload = {
        let mut map = starbridge::core::fields::FieldMap::new();
        map.insert("message", FieldValue::Str(WireString::Text("hello world".into())));
        map.insert("send_mode", FieldValue::Uint(1));
        let mut w = WireWriter::new();
        build_fields(specs, &map, &mut w);
        w.into_bytes()
    };

    let mut r = WireReader::new(&payload);
    let parsed = parse_fields(specs, &mut r).unwrap();
    assert_eq!(parsed.get("message").unwrap().as_text(), Some("hello world"));
    assert_eq!(parsed.get("send_mode").unwrap().as_uint(), Some(1));
    assert!(r.is_empty());
}

#[test]
fn absent_fields_build_as_zero_values() {
    let registry = PacketRegistry::new();
    let specs = registry.specs(PacketType::ChatSent.id()).unwrap();

    // Empty map: both fields encoded as their zero values.
    let mut w = WireWriter::new();
    build_fields(specs, &starbridge::core::fields::FieldMap::new(), &mut w);
    let payload = w.into_bytes();

    let mut r = WireReader::new(&payload);
    let parsed = parse_fields(specs, &mut r).unwrap();
    assert_eq!(parsed.get("message").unwrap().as_text(), Some(""));
    assert_eq!(parsed.get("send_mode").unwrap().as_uint(), Some(0));
}

#[test]
fn truncated_payload_error_carries_partial_context() {
    let registry = PacketRegistry::new();
    let specs = registry.specs(PacketType::ChatSent.id()).unwrap();

    // Just the message field; the trailing send_mode byte is missing.
    let mut w = WireWriter::new();
    w.write_string(&WireString::Text("cut short".into()));
    let payload = w.into_bytes();

    let mut r = WireReader::new(&payload);
    let err = parse_fields(specs, &mut r).unwrap_err();
    match err {
        ProtocolError::Decode { field, partial, .. } => {
            assert_eq!(field, "send_mode");
            assert_eq!(partial.get("message").unwrap().as_text(), Some("cut short"));
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

// -- Envelope --------------------------------------------------------------

proptest! {
    // Property: the assembled envelope parses back to the same parts, with
    // the length sign preserved.
    #[test]
    fn prop_envelope_roundtrip(
        packet_type in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..2048),
        negative in any::<bool>(),
    ) {
        let packet = Packet::build(packet_type, &payload, negative)
            .expect("within size limit");

        let mut r = WireReader::new(&packet.raw);
        prop_assert_eq!(r.read_u8().unwrap(), packet_type);
        let length = r.read_signed_vlq().unwrap();
        prop_assert_eq!(length.unsigned_abs() as usize, payload.len());
        if negative && !payload.is_empty() {
            prop_assert!(length < 0);
        }
        prop_assert_eq!(r.take(payload.len()).unwrap(), &payload[..]);
        prop_assert!(r.is_empty());
    }
}

#[test]
fn oversized_envelope_is_rejected() {
    let payload = vec![0u8; starbridge::config::MAX_PAYLOAD_SIZE + 1];
    assert!(matches!(
        Packet::build(PacketType::ChatSent.id(), &payload, false),
        Err(ProtocolError::OversizedPacket(_))
    ));
}
