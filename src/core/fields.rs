//! # Field-Descriptor Engine
//!
//! Composite packet bodies are declared as ordered `(name, codec)` lists and
//! run through one generic sequential parse/build routine. No reflection:
//! every record in the protocol vocabulary is a static table consumed here.
//!
//! Parsing fills an ordered [`FieldMap`]; on failure the partially built map
//! travels with the error as context. Building walks the same order and
//! substitutes the codec's zero-value encoding for any absent key, so callers
//! can construct records from sparse maps without ever hitting an error.

use crate::core::variant::Variant;
use crate::core::wire::{WireReader, WireString, WireWriter};
use crate::error::Result;

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Uint(u64),
    Int(i64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(WireString),
    Uuid(String),
    Variant(Variant),
    /// Nested record, e.g. the body of a discriminated union.
    Record(FieldMap),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => s.as_text(),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            FieldValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&Variant> {
        match self {
            FieldValue::Variant(v) => Some(v),
            _ => None,
        }
    }
}

/// Ordered name→value mapping produced by parsing a descriptor list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMap {
    entries: Vec<(&'static str, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, FieldValue)> {
        self.entries.iter()
    }
}

impl FromIterator<(&'static str, FieldValue)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (&'static str, FieldValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Hand-written parse/build pair for shapes the fixed codecs cannot express
/// (discriminated unions and the like). Function pointers keep the
/// descriptor tables `static`.
pub struct CustomCodec {
    pub parse: fn(&mut WireReader<'_>) -> Result<FieldValue>,
    pub build: fn(&FieldValue, &mut WireWriter),
    pub zero: fn(&mut WireWriter),
}

/// Wire codec for one field.
#[derive(Clone, Copy)]
pub enum FieldCodec {
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Vlq,
    SignedVlq,
    Uuid,
    Bytes,
    Str,
    Variant,
    Custom(&'static CustomCodec),
}

impl FieldCodec {
    pub fn parse(&self, r: &mut WireReader<'_>) -> Result<FieldValue> {
        Ok(match self {
            FieldCodec::U8 => FieldValue::Uint(u64::from(r.read_u8()?)),
            FieldCodec::Bool => FieldValue::Bool(r.read_bool()?),
            FieldCodec::I16 => FieldValue::Int(i64::from(r.read_i16()?)),
            FieldCodec::U16 => FieldValue::Uint(u64::from(r.read_u16()?)),
            FieldCodec::I32 => FieldValue::Int(i64::from(r.read_i32()?)),
            FieldCodec::U32 => FieldValue::Uint(u64::from(r.read_u32()?)),
            FieldCodec::I64 => FieldValue::Int(r.read_i64()?),
            FieldCodec::U64 => FieldValue::Uint(r.read_u64()?),
            FieldCodec::F32 => FieldValue::F32(r.read_f32()?),
            FieldCodec::F64 => FieldValue::F64(r.read_f64()?),
            FieldCodec::Vlq => FieldValue::Uint(r.read_vlq()?),
            FieldCodec::SignedVlq => FieldValue::Int(r.read_signed_vlq()?),
            FieldCodec::Uuid => FieldValue::Uuid(r.read_uuid()?),
            FieldCodec::Bytes => FieldValue::Bytes(r.read_byte_array()?),
            FieldCodec::Str => FieldValue::Str(r.read_string()?),
            FieldCodec::Variant => FieldValue::Variant(Variant::decode(r)?),
            FieldCodec::Custom(codec) => return (codec.parse)(r),
        })
    }

    /// Serialize one value. A value of the wrong shape falls back to the
    /// zero encoding so building never fails.
    pub fn build(&self, value: &FieldValue, w: &mut WireWriter) {
        match (self, value) {
            (FieldCodec::U8, FieldValue::Uint(v)) => w.write_u8(*v as u8),
            (FieldCodec::Bool, FieldValue::Bool(v)) => w.write_bool(*v),
            (FieldCodec::I16, FieldValue::Int(v)) => w.write_i16(*v as i16),
            (FieldCodec::U16, FieldValue::Uint(v)) => w.write_u16(*v as u16),
            (FieldCodec::I32, FieldValue::Int(v)) => w.write_i32(*v as i32),
            (FieldCodec::U32, FieldValue::Uint(v)) => w.write_u32(*v as u32),
            (FieldCodec::I64, FieldValue::Int(v)) => w.write_i64(*v),
            (FieldCodec::U64, FieldValue::Uint(v)) => w.write_u64(*v),
            (FieldCodec::F32, FieldValue::F32(v)) => w.write_f32(*v),
            (FieldCodec::F64, FieldValue::F64(v)) => w.write_f64(*v),
            (FieldCodec::Vlq, FieldValue::Uint(v)) => w.write_vlq(*v),
            (FieldCodec::SignedVlq, FieldValue::Int(v)) => w.write_signed_vlq(*v),
            (FieldCodec::Uuid, FieldValue::Uuid(v)) => w.write_uuid(v),
            (FieldCodec::Bytes, FieldValue::Bytes(v)) => w.write_byte_array(v),
            (FieldCodec::Str, FieldValue::Str(v)) => w.write_string(v),
            (FieldCodec::Variant, FieldValue::Variant(v)) => v.encode(w),
            (FieldCodec::Custom(codec), v) => (codec.build)(v, w),
            _ => self.zero(w),
        }
    }

    /// The encoding of this codec's zero value, used for absent fields.
    pub fn zero(&self, w: &mut WireWriter) {
        match self {
            FieldCodec::U8 => w.write_u8(0),
            FieldCodec::Bool => w.write_bool(false),
            FieldCodec::I16 => w.write_i16(0),
            FieldCodec::U16 => w.write_u16(0),
            FieldCodec::I32 => w.write_i32(0),
            FieldCodec::U32 => w.write_u32(0),
            FieldCodec::I64 => w.write_i64(0),
            FieldCodec::U64 => w.write_u64(0),
            FieldCodec::F32 => w.write_f32(0.0),
            FieldCodec::F64 => w.write_f64(0.0),
            FieldCodec::Vlq => w.write_vlq(0),
            FieldCodec::SignedVlq => w.write_signed_vlq(0),
            FieldCodec::Uuid => w.write_raw(&[0u8; 16]),
            FieldCodec::Bytes => w.write_vlq(0),
            FieldCodec::Str => w.write_vlq(0),
            FieldCodec::Variant => Variant::Null.encode(w),
            FieldCodec::Custom(codec) => (codec.zero)(w),
        }
    }
}

/// One entry in a record's descriptor list.
pub struct FieldSpec {
    pub name: &'static str,
    pub codec: FieldCodec,
}

impl FieldSpec {
    pub const fn new(name: &'static str, codec: FieldCodec) -> Self {
        Self { name, codec }
    }
}

/// Apply each field's codec in order. On failure the error carries the name
/// of the field that broke and everything parsed up to that point.
pub fn parse_fields(specs: &[FieldSpec], r: &mut WireReader<'_>) -> Result<FieldMap> {
    let mut map = FieldMap::new();
    for spec in specs {
        match spec.codec.parse(r) {
            Ok(value) => map.insert(spec.name, value),
            Err(err) => return Err(err.in_field(spec.name, map)),
        }
    }
    Ok(map)
}

/// Serialize a record by walking the descriptor list in order. Missing keys
/// get their codec's zero encoding; this never fails.
pub fn build_fields(specs: &[FieldSpec], map: &FieldMap, w: &mut WireWriter) {
    for spec in specs {
        match map.get(spec.name) {
            Some(value) => spec.codec.build(value, w),
            None => spec.codec.zero(w),
        }
    }
}
