//! # Composite Record Vocabulary
//!
//! Field-descriptor tables for every packet type that gets a structured
//! decoder. These tables are the packet-specific vocabulary of the protocol;
//! the parsing and building logic lives in [`crate::core::fields`].
//!
//! Types absent from [`RECORDS`] decode to an empty map and forward
//! opaquely.

use crate::core::fields::{CustomCodec, FieldCodec, FieldMap, FieldSpec, FieldValue};
use crate::core::wire::{WireReader, WireWriter};
use crate::error::{ProtocolError, Result};
use crate::protocol::types::PacketType;

/// Warp-action discriminants.
pub const WARP_TO_WORLD: u8 = 1;
pub const WARP_TO_PLAYER: u8 = 2;
pub const WARP_TO_ALIAS: u8 = 3;

/// World-kind discriminants inside a to-world warp.
pub const WORLD_CELESTIAL: u8 = 1;
pub const WORLD_SHIP: u8 = 2;
pub const WORLD_UNIQUE: u8 = 3;

fn parse_warp_action(r: &mut WireReader<'_>) -> Result<FieldValue> {
    let warp_type = r.read_u8()?;
    let mut map = FieldMap::new();
    map.insert("warp_type", FieldValue::Uint(u64::from(warp_type)));

    match warp_type {
        WARP_TO_WORLD => {
            let world_kind = r.read_u8()?;
            map.insert("world_kind", FieldValue::Uint(u64::from(world_kind)));
            match world_kind {
                WORLD_CELESTIAL => {
                    map.insert("x", FieldValue::Int(i64::from(r.read_i32()?)));
                    map.insert("y", FieldValue::Int(i64::from(r.read_i32()?)));
                    map.insert("z", FieldValue::Int(i64::from(r.read_i32()?)));
                    map.insert("planet", FieldValue::Uint(r.read_vlq()?));
                    map.insert("satellite", FieldValue::Uint(r.read_vlq()?));
                }
                WORLD_SHIP => {
                    map.insert("ship_uuid", FieldValue::Uuid(r.read_uuid()?));
                }
                WORLD_UNIQUE => {
                    map.insert("world_name", FieldValue::Str(r.read_string()?));
                }
                other => {
                    return Err(ProtocolError::Custom(format!(
                        "unknown world kind {other}"
                    )));
                }
            }
        }
        WARP_TO_PLAYER => {
            map.insert("player_uuid", FieldValue::Uuid(r.read_uuid()?));
        }
        WARP_TO_ALIAS => {
            map.insert("alias", FieldValue::Int(i64::from(r.read_i32()?)));
        }
        other => {
            return Err(ProtocolError::Custom(format!("unknown warp type {other}")));
        }
    }

    Ok(FieldValue::Record(map))
}

fn build_warp_action(value: &FieldValue, w: &mut WireWriter) {
    let map = match value {
        FieldValue::Record(map) => map,
        _ => return zero_warp_action(w),
    };
    let warp_type = map
        .get("warp_type")
        .and_then(FieldValue::as_uint)
        .unwrap_or(u64::from(WARP_TO_ALIAS)) as u8;
    w.write_u8(warp_type);

    let uint = |name: &str| map.get(name).and_then(FieldValue::as_uint).unwrap_or(0);
    let int = |name: &str| match map.get(name) {
        Some(FieldValue::Int(v)) => *v,
        _ => 0,
    };

    match warp_type {
        WARP_TO_WORLD => {
            let world_kind = uint("world_kind") as u8;
            w.write_u8(world_kind);
            match world_kind {
                WORLD_CELESTIAL => {
                    w.write_i32(int("x") as i32);
                    w.write_i32(int("y") as i32);
                    w.write_i32(int("z") as i32);
                    w.write_vlq(uint("planet"));
                    w.write_vlq(uint("satellite"));
                }
                WORLD_SHIP => match map.get("ship_uuid") {
                    Some(FieldValue::Uuid(uuid)) => w.write_uuid(uuid),
                    _ => w.write_raw(&[0u8; 16]),
                },
                // WORLD_UNIQUE and anything unrecognized: empty name.
                _ => match map.get("world_name") {
                    Some(FieldValue::Str(s)) => w.write_string(s),
                    _ => w.write_vlq(0),
                },
            }
        }
        WARP_TO_PLAYER => match map.get("player_uuid") {
            Some(FieldValue::Uuid(uuid)) => w.write_uuid(uuid),
            _ => w.write_raw(&[0u8; 16]),
        },
        _ => w.write_i32(int("alias") as i32),
    }
}

/// Smallest well-formed warp: alias 0.
fn zero_warp_action(w: &mut WireWriter) {
    w.write_u8(WARP_TO_ALIAS);
    w.write_i32(0);
}

/// Nested discriminated union on warp-type / world-kind.
pub static WARP_ACTION: CustomCodec = CustomCodec {
    parse: parse_warp_action,
    build: build_warp_action,
    zero: zero_warp_action,
};

use FieldCodec::*;

macro_rules! record {
    ($($name:literal : $codec:expr),+ $(,)?) => {
        &[$(FieldSpec::new($name, $codec)),+]
    };
}

/// Packet types with a registered structured decoder, with their ordered
/// field-descriptor lists. Everything else decodes to an empty map.
pub static RECORDS: &[(PacketType, &[FieldSpec])] = &[
    (
        PacketType::ProtocolRequest,
        record!["requested_version": U32],
    ),
    (
        PacketType::ProtocolResponse,
        record!["allowed": Bool, "info": Variant],
    ),
    (PacketType::ServerDisconnect, record!["reason": Str]),
    (
        PacketType::ConnectSuccess,
        record![
            "client_id": Vlq,
            "server_uuid": Uuid,
            "planet_orbital_levels": I32,
            "satellite_orbital_levels": I32,
            "chunk_size": I32,
            "xy_min": I32,
            "xy_max": I32,
            "z_min": I32,
            "z_max": I32,
        ],
    ),
    (PacketType::ConnectFailure, record!["reason": Str]),
    (PacketType::HandshakeChallenge, record!["salt": Bytes]),
    (
        PacketType::ChatReceived,
        record![
            "mode": U8,
            "channel": Str,
            "client_id": U32,
            "name": Str,
            "message": Str,
        ],
    ),
    (PacketType::UniverseTimeUpdate, record!["timestamp": F64]),
    (
        PacketType::ClientConnect,
        record![
            "asset_digest": Bytes,
            "allow_asset_mismatch": Bool,
            "uuid": Uuid,
            "name": Str,
            "species": Str,
            "ship_level": U32,
            "max_fuel": U32,
            "capabilities": Variant,
            "account": Str,
        ],
    ),
    (PacketType::ClientDisconnectRequest, record!["unused": U8]),
    (PacketType::HandshakeResponse, record!["response": Str]),
    (
        PacketType::PlayerWarp,
        record!["warp_action": Custom(&WARP_ACTION), "deploy": Bool],
    ),
    (
        PacketType::FlyShip,
        record![
            "system_x": I32,
            "system_y": I32,
            "system_z": I32,
            "location": Variant,
        ],
    ),
    (
        PacketType::ChatSent,
        record!["message": Str, "send_mode": U8],
    ),
    (
        PacketType::WorldStart,
        record![
            "template_data": Variant,
            "sky_data": Bytes,
            "weather_data": Bytes,
            "spawn_x": F32,
            "spawn_y": F32,
            "world_properties": Variant,
            "client_id": U32,
            "local_interpolation": Bool,
        ],
    ),
    (PacketType::WorldStop, record!["reason": Str]),
    (
        PacketType::GiveItem,
        record!["item_name": Str, "count": Vlq, "parameters": Variant],
    ),
    (
        PacketType::EntityInteract,
        record![
            "source_entity_id": I32,
            "source_x": F32,
            "source_y": F32,
            "target_entity_id": I32,
        ],
    ),
    (
        PacketType::EntityInteractResult,
        record![
            "interaction": Variant,
            "request_id": Uuid,
            "source_entity_id": I32,
        ],
    ),
    (PacketType::Heartbeat, record!["remote_step": Vlq]),
    (PacketType::StepUpdate, record!["remote_step": Vlq]),
    (
        PacketType::WorldClientStateUpdate,
        record!["delta": Bytes],
    ),
];
