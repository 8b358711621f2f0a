//! # Variant Codec
//!
//! The recursive tagged-union value type used throughout the wire format.
//! A leading tag byte selects the payload shape; arrays and dicts are
//! VLQ-length-prefixed and may nest arbitrarily deep.
//!
//! | Tag | Shape                   |
//! |-----|-------------------------|
//! | 1   | Null                    |
//! | 2   | Double (f64, BE)        |
//! | 3   | Bool (1 byte)           |
//! | 4   | SignedVLQ integer       |
//! | 5   | String (VLQ-prefixed)   |
//! | 6   | Array of Variant        |
//! | 7   | Dict of String→Variant  |
//!
//! Dict entries keep their wire order so re-encoding a decoded value is
//! byte-exact.

use crate::core::wire::{WireReader, WireString, WireWriter};
use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Null,
    Double(f64),
    Bool(bool),
    Int(i64),
    String(WireString),
    Array(Vec<Variant>),
    Dict(Vec<(WireString, Variant)>),
}

impl Variant {
    pub fn decode(r: &mut WireReader<'_>) -> Result<Variant> {
        let tag = r.read_u8()?;
        match tag {
            1 => Ok(Variant::Null),
            2 => Ok(Variant::Double(r.read_f64()?)),
            3 => Ok(Variant::Bool(r.read_bool()?)),
            4 => Ok(Variant::Int(r.read_signed_vlq()?)),
            5 => Ok(Variant::String(r.read_string()?)),
            6 => {
                let len = r.read_vlq()? as usize;
                let mut items = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    items.push(Variant::decode(r)?);
                }
                Ok(Variant::Array(items))
            }
            7 => {
                let len = r.read_vlq()? as usize;
                let mut entries = Vec::with_capacity(len.min(4096));
                for _ in 0..len {
                    let key = r.read_string()?;
                    let value = Variant::decode(r)?;
                    entries.push((key, value));
                }
                Ok(Variant::Dict(entries))
            }
            other => Err(ProtocolError::UnknownVariantTag(other)),
        }
    }

    pub fn encode(&self, w: &mut WireWriter) {
        match self {
            Variant::Null => w.write_u8(1),
            Variant::Double(v) => {
                w.write_u8(2);
                w.write_f64(*v);
            }
            Variant::Bool(v) => {
                w.write_u8(3);
                w.write_bool(*v);
            }
            Variant::Int(v) => {
                w.write_u8(4);
                w.write_signed_vlq(*v);
            }
            Variant::String(s) => {
                w.write_u8(5);
                w.write_string(s);
            }
            Variant::Array(items) => {
                w.write_u8(6);
                w.write_vlq(items.len() as u64);
                for item in items {
                    item.encode(w);
                }
            }
            Variant::Dict(entries) => {
                w.write_u8(7);
                w.write_vlq(entries.len() as u64);
                for (key, value) in entries {
                    w.write_string(key);
                    value.encode(w);
                }
            }
        }
    }

    /// Dict lookup by text key, first match wins.
    pub fn get(&self, key: &str) -> Option<&Variant> {
        match self {
            Variant::Dict(entries) => entries
                .iter()
                .find(|(k, _)| k.as_text() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Text payload, if this is a UTF-8 string variant.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Variant::String(s) => s.as_text(),
            _ => None,
        }
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(WireString::from(s))
    }
}
