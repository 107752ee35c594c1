//! Implementation of [serde::de::Deserializer] for [DataDeserializer]

use std::sync::Arc;

use serde::de::{
    self,
    value::{SeqDeserializer, U32Deserializer},
    IntoDeserializer,
};

use crate::{
    config::ForyConfig,
    error::{ForyError, Result},
    meta::{FieldTypeMeta, TypeMeta},
    protocol::{
        type_info::{read_type_info, Resolved},
        ReadContext, RefEntry, RefFlag,
    },
    types::{KnownTypeId, TypeSpecificationRegistry},
    varint::{read_varint32, read_varint64, read_varuint32, read_varuint36},
    viewer::ByteViewer,
};

use super::{consts, ext::ExtDeserializer};

/// What the caller's [de::Deserialize] impl asked for.
#[derive(Debug, Clone, Copy)]
enum Hint {
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    Str,
    String,
    Bytes,
    ByteBuf,
    Option,
    Unit,
    UnitStruct(&'static str),
    Newtype(&'static str),
    Seq,
    Tuple(usize),
    TupleStruct(&'static str, usize),
    Map,
    Struct(&'static str, &'static [&'static str]),
    Enum(&'static str, &'static [&'static str]),
    Ignored,
}

/// The position the next value is read from.
#[derive(Debug)]
struct Current {
    ty: FieldTypeMeta,
    /// The ref flag and type info are still to be read.
    prefixed: bool,
    resolved: Option<Resolved>,
}

enum Entry {
    Null,
    Ref(RefEntry),
    Value(FieldTypeMeta, Resolved),
}

/// Reads the data stage of a message, directed by the writer's schemas.
pub(crate) struct DataDeserializer<'de, 'c> {
    input: ByteViewer<'de>,
    ctx: &'c mut ReadContext,
    registry: &'c TypeSpecificationRegistry,
    config: ForyConfig,
    current: Option<Current>,
    /// Replayed back-references must not grow the ref table again.
    record_refs: bool,
    depth: usize,
}

impl<'de, 'c> DataDeserializer<'de, 'c> {
    /// Start at a top-level value whose flag and type info were already read.
    pub fn new(
        input: ByteViewer<'de>,
        ctx: &'c mut ReadContext,
        registry: &'c TypeSpecificationRegistry,
        config: ForyConfig,
        ty: FieldTypeMeta,
        resolved: Resolved,
    ) -> Self {
        Self {
            input,
            ctx,
            registry,
            config,
            current: Some(Current {
                ty,
                prefixed: false,
                resolved: Some(resolved),
            }),
            record_refs: true,
            depth: 0,
        }
    }

    /// Check the data section was consumed exactly.
    pub fn finish(&self) -> Result<()> {
        match self.input.distance_to_end() {
            0 => Ok(()),
            n => Err(ForyError::protocol(format!("{} trailing byte(s) after the value", n))),
        }
    }

    /// Read the ref flag and type info of the current position.
    fn enter(&mut self) -> Result<Entry> {
        let Current {
            ty,
            prefixed,
            resolved,
        } = self
            .current
            .take()
            .ok_or_else(|| ForyError::mismatch("value read outside of a declared position"))?;
        let kind = ty.kind()?;

        let mut tracked = false;
        if prefixed && (ty.nullable || ty.ref_tracking || kind.is_user_kind()) {
            match RefFlag::from_byte(self.input.next_byte()?)? {
                RefFlag::Null => return Ok(Entry::Null),
                RefFlag::Ref => {
                    let id = read_varuint32(&mut self.input)?;
                    return Ok(Entry::Ref(self.ctx.reference(id)?));
                }
                RefFlag::NotNull => {}
                RefFlag::RefValue => tracked = true,
            }
        }

        let resolved = match resolved {
            Some(resolved) => resolved,
            None if kind.is_user_kind() => {
                read_type_info(&mut self.input, self.ctx, self.registry, &self.config)?
            }
            None => Resolved::Known(kind),
        };

        if tracked && self.record_refs {
            log::trace!("ref #{} at {}", self.ctx.refs.len(), self.input.position());
            self.ctx.refs.push(RefEntry {
                position: self.input.position(),
                ty: ty.clone(),
                resolved: resolved.clone(),
            });
        }
        Ok(Entry::Value(ty, resolved))
    }

    fn dispatch<V>(&mut self, hint: Hint, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.enter()? {
            Entry::Null => match hint {
                Hint::Option => visitor.visit_none(),
                Hint::Ignored => visitor.visit_unit(),
                _ => Err(ForyError::NullValue(format!("{:?} position", hint))),
            },
            Entry::Ref(entry) => self.replay(entry, hint, visitor),
            Entry::Value(ty, resolved) => match hint {
                Hint::Option => {
                    self.current = Some(Current {
                        ty,
                        prefixed: false,
                        resolved: Some(resolved),
                    });
                    visitor.visit_some(self)
                }
                Hint::Ignored => {
                    self.skip_value(&ty, resolved)?;
                    visitor.visit_unit()
                }
                Hint::Newtype(_) if !matches!(resolved, Resolved::Ext(_)) => {
                    self.current = Some(Current {
                        ty,
                        prefixed: false,
                        resolved: Some(resolved),
                    });
                    visitor.visit_newtype_struct(self)
                }
                _ => self.decode(ty, resolved, hint, visitor),
            },
        }
    }

    /// Decode a recorded value again from where it was first written.
    fn replay<V>(&mut self, entry: RefEntry, hint: Hint, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        log::trace!("replaying ref at {}", entry.position);
        let mut replay = DataDeserializer {
            input: ByteViewer::at(self.input.slice(), entry.position),
            ctx: &mut *self.ctx,
            registry: self.registry,
            config: self.config,
            current: Some(Current {
                ty: entry.ty,
                prefixed: false,
                resolved: Some(entry.resolved),
            }),
            record_refs: false,
            depth: self.depth,
        };
        replay.dispatch(hint, visitor)
    }

    fn decode<V>(
        &mut self,
        ty: FieldTypeMeta,
        resolved: Resolved,
        hint: Hint,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match resolved {
            Resolved::Ext(_) => self.decode_ext(hint, visitor),
            Resolved::Struct(meta) => self.decode_struct(meta, hint, visitor),
            Resolved::Enum => {
                let index = read_varuint32(&mut self.input)?;
                match hint {
                    Hint::Enum(..) => {
                        let access: U32Deserializer<ForyError> = index.into_deserializer();
                        visitor.visit_enum(access)
                    }
                    _ => visitor.visit_u32(index),
                }
            }
            Resolved::Known(kind) => self.decode_known(kind, &ty, visitor),
        }
    }

    fn decode_ext<V>(&mut self, hint: Hint, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        use de::Deserializer;

        let mut ext = ExtDeserializer::new(&mut self.input);
        let ext = &mut ext;
        match hint {
            Hint::Bool => ext.deserialize_bool(visitor),
            Hint::I8 => ext.deserialize_i8(visitor),
            Hint::I16 => ext.deserialize_i16(visitor),
            Hint::I32 => ext.deserialize_i32(visitor),
            Hint::I64 => ext.deserialize_i64(visitor),
            Hint::U8 => ext.deserialize_u8(visitor),
            Hint::U16 => ext.deserialize_u16(visitor),
            Hint::U32 => ext.deserialize_u32(visitor),
            Hint::U64 => ext.deserialize_u64(visitor),
            Hint::F32 => ext.deserialize_f32(visitor),
            Hint::F64 => ext.deserialize_f64(visitor),
            Hint::Char => ext.deserialize_char(visitor),
            Hint::Str => ext.deserialize_str(visitor),
            Hint::String => ext.deserialize_string(visitor),
            Hint::Bytes => ext.deserialize_bytes(visitor),
            Hint::ByteBuf => ext.deserialize_byte_buf(visitor),
            Hint::Option => ext.deserialize_option(visitor),
            Hint::Unit => ext.deserialize_unit(visitor),
            Hint::UnitStruct(name) => ext.deserialize_unit_struct(name, visitor),
            Hint::Newtype(name) => ext.deserialize_newtype_struct(name, visitor),
            Hint::Seq => ext.deserialize_seq(visitor),
            Hint::Tuple(len) => ext.deserialize_tuple(len, visitor),
            Hint::TupleStruct(name, len) => ext.deserialize_tuple_struct(name, len, visitor),
            Hint::Map => ext.deserialize_map(visitor),
            Hint::Struct(name, fields) => ext.deserialize_struct(name, fields, visitor),
            Hint::Enum(name, variants) => ext.deserialize_enum(name, variants, visitor),
            Hint::Any | Hint::Ignored => ext.deserialize_any(visitor),
        }
    }

    fn decode_struct<V>(&mut self, meta: Arc<TypeMeta>, hint: Hint, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(ForyError::DepthExceeded(self.config.max_depth));
        }

        let reader_fields = match hint {
            Hint::Struct(_, fields) => Some(fields),
            _ => None,
        };
        let value = visitor.visit_map(StructAccessor {
            de: &mut *self,
            meta,
            reader_fields,
            index: 0,
        })?;

        self.depth -= 1;
        Ok(value)
    }

    fn decode_known<V>(&mut self, kind: KnownTypeId, ty: &FieldTypeMeta, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let input = &mut self.input;
        match kind {
            KnownTypeId::Boolean => visitor.visit_bool(input.next_byte()? != 0),
            KnownTypeId::Int8 => visitor.visit_i8(input.read_i8()?),
            KnownTypeId::Int16 => visitor.visit_i16(input.read_i16_le()?),
            KnownTypeId::Int32 => visitor.visit_i32(input.read_i32_le()?),
            KnownTypeId::VarInt32 => visitor.visit_i32(read_varint32(input)?),
            KnownTypeId::Int64 => visitor.visit_i64(input.read_i64_le()?),
            KnownTypeId::VarInt64 => visitor.visit_i64(read_varint64(input)?),
            KnownTypeId::SliInt64 => visitor.visit_i64(read_sli_int64(input)?),
            KnownTypeId::Float16 => visitor.visit_f32(f16_to_f32(input.read_u16_le()?)),
            KnownTypeId::Float32 => visitor.visit_f32(input.read_f32_le()?),
            KnownTypeId::Float64 => visitor.visit_f64(input.read_f64_le()?),
            KnownTypeId::UInt8 => visitor.visit_u8(input.next_byte()?),
            KnownTypeId::UInt16 => visitor.visit_u16(input.read_u16_le()?),
            KnownTypeId::UInt32 => visitor.visit_u32(input.read_u32_le()?),
            KnownTypeId::UInt64 => visitor.visit_u64(input.read_u64_le()?),
            KnownTypeId::String => match read_string(input)? {
                Text::Borrowed(s) => visitor.visit_borrowed_str(s),
                Text::Owned(s) => visitor.visit_string(s),
            },
            KnownTypeId::Binary => {
                let len = read_varuint32(input)? as usize;
                visitor.visit_borrowed_bytes(input.next_bytes(len)?)
            }
            KnownTypeId::Duration => {
                let secs = read_varint64(input)?;
                let nanos = input.read_i32_le()? as i64;
                visitor.visit_seq(SeqDeserializer::<_, ForyError>::new([secs, nanos].into_iter()))
            }
            KnownTypeId::Timestamp => visitor.visit_i64(input.read_i64_le()?),
            KnownTypeId::LocalDate => visitor.visit_i32(input.read_i32_le()?),
            KnownTypeId::List | KnownTypeId::Set => {
                let element = generic(ty, 0)?;
                let remaining = read_varuint32(input)? as usize;
                let mut access = SeqAccessor {
                    de: &mut *self,
                    element,
                    remaining,
                };
                let value = visitor.visit_seq(&mut access)?;
                access.end()?;
                Ok(value)
            }
            KnownTypeId::Map => {
                let key = generic(ty, 0)?;
                let value = generic(ty, 1)?;
                let remaining = read_varuint32(input)? as usize;
                let mut access = MapAccessor {
                    de: &mut *self,
                    key,
                    value,
                    remaining,
                };
                let value = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(value)
            }
            other => Err(ForyError::unsupported(format!("{:?} payloads", other))),
        }
    }

    /// Discard the value at the current position.
    fn skip_current(&mut self) -> Result<()> {
        match self.enter()? {
            Entry::Null | Entry::Ref(_) => Ok(()),
            Entry::Value(ty, resolved) => self.skip_value(&ty, resolved),
        }
    }

    fn skip_value(&mut self, ty: &FieldTypeMeta, resolved: Resolved) -> Result<()> {
        match resolved {
            Resolved::Ext(Some(skip)) => skip(&mut self.input),
            Resolved::Ext(None) => Err(ForyError::UnregisteredType(format!(
                "ext type id {}",
                ty.type_id
            ))),
            Resolved::Enum => read_varuint32(&mut self.input).map(drop),
            Resolved::Struct(meta) => {
                self.depth += 1;
                if self.depth > self.config.max_depth {
                    return Err(ForyError::DepthExceeded(self.config.max_depth));
                }
                for field in &meta.fields {
                    self.current = Some(Current::nested(field.field_type.clone()));
                    self.skip_current()?;
                }
                self.depth -= 1;
                Ok(())
            }
            Resolved::Known(kind) => self.skip_known(kind, ty),
        }
    }

    fn skip_known(&mut self, kind: KnownTypeId, ty: &FieldTypeMeta) -> Result<()> {
        use KnownTypeId::*;

        let input = &mut self.input;
        match kind {
            Boolean | Int8 | UInt8 => input.advance(1),
            Int16 | UInt16 | Float16 => input.advance(2),
            Int32 | UInt32 | Float32 | LocalDate => input.advance(4),
            Int64 | UInt64 | Float64 | Timestamp => input.advance(8),
            VarInt32 => read_varint32(input).map(drop),
            VarInt64 => read_varint64(input).map(drop),
            SliInt64 => read_sli_int64(input).map(drop),
            String => {
                let len = (read_varuint36(input)? >> 2) as usize;
                input.advance(len)
            }
            Binary => {
                let len = read_varuint32(input)? as usize;
                input.advance(len)
            }
            Duration => {
                read_varint64(input)?;
                input.advance(4)
            }
            List | Set => {
                let element = generic(ty, 0)?;
                for _ in 0..read_varuint32(input)? {
                    self.current = Some(Current::nested(element.clone()));
                    self.skip_current()?;
                }
                Ok(())
            }
            Map => {
                let key = generic(ty, 0)?;
                let value = generic(ty, 1)?;
                for _ in 0..read_varuint32(input)? {
                    self.current = Some(Current::nested(key.clone()));
                    self.skip_current()?;
                    self.current = Some(Current::nested(value.clone()));
                    self.skip_current()?;
                }
                Ok(())
            }
            other => Err(ForyError::unsupported(format!("{:?} payloads", other))),
        }
    }
}

impl Current {
    fn nested(ty: FieldTypeMeta) -> Self {
        Self {
            ty,
            prefixed: true,
            resolved: None,
        }
    }
}

fn generic(ty: &FieldTypeMeta, index: usize) -> Result<FieldTypeMeta> {
    ty.generics.get(index).cloned().ok_or_else(|| {
        ForyError::protocol(format!("type id {} is missing type argument {}", ty.type_id, index))
    })
}

enum Text<'de> {
    Borrowed(&'de str),
    Owned(String),
}

fn read_string<'de>(input: &mut ByteViewer<'de>) -> Result<Text<'de>> {
    let header = read_varuint36(input)?;
    let bytes = input.next_bytes((header >> 2) as usize)?;

    match header & 0b11 {
        consts::STRING_LATIN1 => Ok(Text::Owned(bytes.iter().map(|b| *b as char).collect())),
        consts::STRING_UTF16 => {
            if bytes.len() % 2 != 0 {
                return Err(ForyError::InvalidString("odd utf-16 byte length".to_string()));
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units)
                .map(Text::Owned)
                .map_err(|e| ForyError::InvalidString(e.to_string()))
        }
        consts::STRING_UTF8 => std::str::from_utf8(bytes)
            .map(Text::Borrowed)
            .map_err(|e| ForyError::InvalidString(e.to_string())),
        other => Err(ForyError::InvalidString(format!("unknown string encoding {}", other))),
    }
}

/// Small values are a 4-byte `value << 1`; otherwise a marker byte with the low bit set
/// precedes a full `i64`.
fn read_sli_int64(input: &mut ByteViewer<'_>) -> Result<i64> {
    match input.peek() {
        Some(first) if first & 1 == 0 => Ok((input.read_i32_le()? >> 1) as i64),
        _ => {
            input.advance(1)?;
            input.read_i64_le()
        }
    }
}

fn f16_to_f32(bits: u16) -> f32 {
    let negative = bits & 0x8000 != 0;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;

    let magnitude = match exponent {
        // subnormal
        0 => mantissa as f32 * 2_f32.powi(-24),
        0x1f => f32::from_bits(0x7f80_0000 | (mantissa << 13)),
        _ => f32::from_bits(((exponent + 112) << 23) | (mantissa << 13)),
    };
    match negative {
        true => -magnitude,
        false => magnitude,
    }
}

/// Fields of a struct in the writer's order, renamed to the reader's field names.
struct StructAccessor<'a, 'de, 'c> {
    de: &'a mut DataDeserializer<'de, 'c>,
    meta: Arc<TypeMeta>,
    reader_fields: Option<&'static [&'static str]>,
    index: usize,
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn match_field(reader_fields: &'static [&'static str], name: &str) -> Option<&'static str> {
    if let Some(exact) = reader_fields.iter().find(|field| **field == name) {
        return Some(exact);
    }
    let normalized = normalize(name);
    reader_fields
        .iter()
        .find(|field| normalize(field) == normalized)
        .copied()
}

impl<'de, 'a, 'c> de::MapAccess<'de> for StructAccessor<'a, 'de, 'c> {
    type Error = ForyError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        while let Some(field) = self.meta.fields.get(self.index) {
            self.index += 1;
            self.de.current = Some(Current::nested(field.field_type.clone()));

            let key = match self.reader_fields {
                Some(reader_fields) => match match_field(reader_fields, &field.name) {
                    Some(name) => {
                        seed.deserialize(IntoDeserializer::<'de, ForyError>::into_deserializer(name))?
                    }
                    None => {
                        log::trace!("skipping unknown field `{}`", field.name);
                        self.de.skip_current()?;
                        continue;
                    }
                },
                None => seed.deserialize(IntoDeserializer::<'de, ForyError>::into_deserializer(
                    field.name.clone(),
                ))?,
            };
            return Ok(Some(key));
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.meta.fields.len() - self.index)
    }
}

struct SeqAccessor<'a, 'de, 'c> {
    de: &'a mut DataDeserializer<'de, 'c>,
    element: FieldTypeMeta,
    remaining: usize,
}

impl<'a, 'de, 'c> SeqAccessor<'a, 'de, 'c> {
    fn end(&self) -> Result<()> {
        match self.remaining {
            0 => Ok(()),
            n => Err(ForyError::mismatch(format!("{} element(s) left unread", n))),
        }
    }
}

impl<'de, 'a, 'c> de::SeqAccess<'de> for SeqAccessor<'a, 'de, 'c> {
    type Error = ForyError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.de.current = Some(Current::nested(self.element.clone()));
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

struct MapAccessor<'a, 'de, 'c> {
    de: &'a mut DataDeserializer<'de, 'c>,
    key: FieldTypeMeta,
    value: FieldTypeMeta,
    remaining: usize,
}

impl<'a, 'de, 'c> MapAccessor<'a, 'de, 'c> {
    fn end(&self) -> Result<()> {
        match self.remaining {
            0 => Ok(()),
            n => Err(ForyError::mismatch(format!("{} entries left unread", n))),
        }
    }
}

impl<'de, 'a, 'c> de::MapAccess<'de> for MapAccessor<'a, 'de, 'c> {
    type Error = ForyError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        self.de.current = Some(Current::nested(self.key.clone()));
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        self.de.current = Some(Current::nested(self.value.clone()));
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Impl deserialize by forwarding a hint to [DataDeserializer::dispatch]
macro_rules! deserialize_hint {
    ($fn_name: ident, $hint: ident) => {
        fn $fn_name<V>(self, visitor: V) -> Result<V::Value>
        where
            V: de::Visitor<'de>,
        {
            self.dispatch(Hint::$hint, visitor)
        }
    };
}

impl<'de, 'a, 'c> de::Deserializer<'de> for &'a mut DataDeserializer<'de, 'c> {
    type Error = ForyError;

    deserialize_hint! {deserialize_any, Any}
    deserialize_hint! {deserialize_bool, Bool}
    deserialize_hint! {deserialize_i8, I8}
    deserialize_hint! {deserialize_i16, I16}
    deserialize_hint! {deserialize_i32, I32}
    deserialize_hint! {deserialize_i64, I64}
    deserialize_hint! {deserialize_u8, U8}
    deserialize_hint! {deserialize_u16, U16}
    deserialize_hint! {deserialize_u32, U32}
    deserialize_hint! {deserialize_u64, U64}
    deserialize_hint! {deserialize_f32, F32}
    deserialize_hint! {deserialize_f64, F64}
    deserialize_hint! {deserialize_char, Char}
    deserialize_hint! {deserialize_str, Str}
    deserialize_hint! {deserialize_string, String}
    deserialize_hint! {deserialize_bytes, Bytes}
    deserialize_hint! {deserialize_byte_buf, ByteBuf}
    deserialize_hint! {deserialize_option, Option}
    deserialize_hint! {deserialize_unit, Unit}
    deserialize_hint! {deserialize_seq, Seq}
    deserialize_hint! {deserialize_map, Map}
    deserialize_hint! {deserialize_identifier, Any}
    deserialize_hint! {deserialize_ignored_any, Ignored}

    fn deserialize_unit_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::UnitStruct(name), visitor)
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::Newtype(name), visitor)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::Tuple(len), visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::TupleStruct(name, len), visitor)
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::Struct(name, fields), visitor)
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.dispatch(Hint::Enum(name, variants), visitor)
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}
