//! Implementation of [serde::ser::Serializer] for [DataSerializer]

use bytes::BufMut;
use serde::ser;

use crate::{
    config::ForyConfig,
    error::{ForyError, Result},
    protocol::{type_info::write_type_info, RefFlag, RefMode, WriteContext},
    types::{FieldRef, KnownTypeId, SpecKind, TypeShape, TypeSpecification, TypeSpecificationRegistry},
    varint::{write_varuint32, write_varuint36},
};

use super::consts;

/// A position the next serialized value fills.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot<'r> {
    pub field: &'r FieldRef,
    pub ref_tracking: bool,
    /// The ref flag and type info are still to be written.
    pub prefixed: bool,
}

impl<'r> Slot<'r> {
    /// The top-level value, whose prefixes the protocol stages already wrote.
    pub fn root(field: &'r FieldRef) -> Self {
        Self {
            field,
            ref_tracking: false,
            prefixed: false,
        }
    }

    fn nested(field: &'r FieldRef, ref_tracking: bool) -> Self {
        Self {
            field,
            ref_tracking,
            prefixed: true,
        }
    }
}

#[derive(Debug)]
enum Frame<'r> {
    Struct {
        spec: &'r TypeSpecification,
        next: usize,
    },
    Seq {
        element: &'r FieldRef,
    },
    Map {
        key: &'r FieldRef,
        value: &'r FieldRef,
    },
}

enum Begin<'r> {
    /// Inside an ext value: the type's own serde layout, no annotations.
    Opaque,
    Typed(&'r TypeSpecification, Slot<'r>),
}

/// Writes the data stage of a message, directed by the registered shape of each value.
///
/// Values travel through serde; each `serialize_*` call fills the slot the enclosing
/// struct, sequence or map declared for it.
pub(crate) struct DataSerializer<'a, 'r> {
    ctx: &'a mut WriteContext,
    registry: &'r TypeSpecificationRegistry,
    config: ForyConfig,
    frames: Vec<Frame<'r>>,
    pending: Option<Slot<'r>>,
    /// Open compounds of the ext value being written. `None` outside ext values.
    opaque: Option<usize>,
    depth: usize,
}

/// Impl serialize for fixed-width primitives
macro_rules! serialize_fixed {
    ($fn_name: ident, $num_type: ty => $known: ident, $put: ident) => {
        fn $fn_name(self, v: $num_type) -> Result<()> {
            match self.begin()? {
                Begin::Opaque => {
                    self.ctx.buffer.$put(v);
                    self.opaque_scalar();
                }
                Begin::Typed(spec, _) => {
                    expect_known(spec, KnownTypeId::$known)?;
                    self.ctx.buffer.$put(v);
                }
            }
            Ok(())
        }
    };
}

fn expect_known(spec: &TypeSpecification, expected: KnownTypeId) -> Result<()> {
    match spec.kind() {
        SpecKind::Known(id) if *id == expected => Ok(()),
        _ => Err(ForyError::mismatch(format!(
            "`{}` cannot be written as {:?}",
            spec.type_name(),
            expected
        ))),
    }
}

/// Length prefix of a collection, string or byte payload.
fn wire_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ForyError::Range {
        value: len as u64,
        bits: 32,
    })
}

fn unit_variants_only(name: &str, variant: &str) -> ForyError {
    ForyError::unsupported(format!(
        "`{}::{}`: registered enums may only have unit variants",
        name, variant
    ))
}

impl<'a, 'r> DataSerializer<'a, 'r> {
    pub fn new(
        ctx: &'a mut WriteContext,
        registry: &'r TypeSpecificationRegistry,
        config: ForyConfig,
        root: Slot<'r>,
    ) -> Self {
        Self {
            ctx,
            registry,
            config,
            frames: Vec::new(),
            pending: Some(root),
            opaque: None,
            depth: 0,
        }
    }

    /// Check the value filled every slot it opened.
    pub fn finish(self) -> Result<()> {
        match (self.pending, self.frames.is_empty(), self.opaque) {
            (None, true, None) => Ok(()),
            (Some(slot), _, _) => Err(ForyError::mismatch(format!(
                "nothing was written for `{}`",
                slot.field.type_ref.type_name
            ))),
            _ => Err(ForyError::mismatch("value ended with open compounds")),
        }
    }

    /// Take the pending slot and write its ref flag and type info.
    fn begin(&mut self) -> Result<Begin<'r>> {
        if self.opaque.is_some() {
            return Ok(Begin::Opaque);
        }

        let slot = self.take_slot()?;
        let spec = self.registry.resolve(&slot.field.type_ref)?;
        if slot.prefixed {
            self.write_prefix(&slot, spec)?;
        }

        if let SpecKind::Ext { .. } = spec.kind() {
            log::trace!("ext value `{}`", spec.type_name());
            self.opaque = Some(0);
            return Ok(Begin::Opaque);
        }
        Ok(Begin::Typed(spec, slot))
    }

    fn take_slot(&mut self) -> Result<Slot<'r>> {
        self.pending
            .take()
            .ok_or_else(|| ForyError::mismatch("value written outside of a declared position"))
    }

    fn write_prefix(&mut self, slot: &Slot<'r>, spec: &'r TypeSpecification) -> Result<()> {
        let user_type = spec.is_user_type();

        if slot.field.nullable || slot.ref_tracking || user_type {
            let tracked = self.config.ref_mode == RefMode::Tracking
                && (slot.ref_tracking || spec.reference_tracking());
            let flag = match tracked {
                true => RefFlag::RefValue,
                false => RefFlag::NotNull,
            };
            self.ctx.buffer.put_u8(flag.to_byte());
        }
        if user_type {
            write_type_info(self.ctx, self.registry, spec, self.config.compatible)?;
        }
        Ok(())
    }

    fn ensure_written(&self) -> Result<()> {
        match self.pending {
            None => Ok(()),
            Some(slot) => Err(ForyError::mismatch(format!(
                "nothing was written for `{}`",
                slot.field.type_ref.type_name
            ))),
        }
    }

    fn opaque_scalar(&mut self) {
        if self.opaque == Some(0) {
            self.opaque = None;
        }
    }

    fn opaque_open(&mut self) {
        if let Some(open) = self.opaque.as_mut() {
            *open += 1;
        }
    }

    fn opaque_close(&mut self) {
        self.opaque = match self.opaque {
            Some(open) if open > 1 => Some(open - 1),
            _ => None,
        };
    }

    fn write_variant_index(&mut self, index: u32) {
        write_varuint32(&mut self.ctx.buffer, index);
    }

    fn write_len(&mut self, len: Option<usize>) -> Result<()> {
        let len = len.ok_or_else(|| ForyError::unsupported("collections of unknown length"))?;
        write_varuint32(&mut self.ctx.buffer, wire_len(len)?);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.opaque.is_some() {
            self.opaque_close();
            return Ok(());
        }

        match self.frames.pop() {
            Some(Frame::Struct { spec, next }) => {
                self.depth -= 1;
                match spec.fields().get(next) {
                    None => Ok(()),
                    Some(missing) => Err(ForyError::FieldMismatch {
                        expected: missing.name.clone(),
                        found: "<end of struct>".to_string(),
                    }),
                }
            }
            Some(_) => Ok(()),
            None => Err(ForyError::mismatch("compound closed twice")),
        }
    }

    fn next_element(&mut self) -> Result<()> {
        if self.opaque.is_some() {
            return Ok(());
        }
        match self.frames.last() {
            Some(Frame::Seq { element }) => {
                let element: &'r FieldRef = *element;
                self.pending = Some(Slot::nested(element, false));
                Ok(())
            }
            _ => Err(ForyError::mismatch("element written outside of a sequence")),
        }
    }

    fn next_map_slot(&mut self, is_key: bool) -> Result<()> {
        if self.opaque.is_some() {
            return Ok(());
        }
        match self.frames.last() {
            Some(Frame::Map { key, value }) => {
                let field = if is_key { *key } else { *value };
                self.pending = Some(Slot::nested(field, false));
                Ok(())
            }
            _ => Err(ForyError::mismatch("entry written outside of a map")),
        }
    }

    fn next_field(&mut self, key: &'static str) -> Result<()> {
        if self.opaque.is_some() {
            return Ok(());
        }

        let Some(Frame::Struct { spec, next }) = self.frames.last_mut() else {
            return Err(ForyError::mismatch("field written outside of a struct"));
        };
        let spec: &'r TypeSpecification = *spec;
        let descriptor = spec
            .fields()
            .get(*next)
            .ok_or_else(|| ForyError::FieldMismatch {
                expected: "<end of struct>".to_string(),
                found: key.to_string(),
            })?;
        if descriptor.name != key {
            return Err(ForyError::FieldMismatch {
                expected: descriptor.name.clone(),
                found: key.to_string(),
            });
        }
        *next += 1;

        self.pending = Some(Slot::nested(&descriptor.field, descriptor.ref_tracking));
        Ok(())
    }
}

impl<'a, 'b, 'r> ser::Serializer for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    type SerializeSeq = Self;

    type SerializeTuple = Self;

    type SerializeTupleStruct = Self;

    type SerializeTupleVariant = Self;

    type SerializeMap = Self;

    type SerializeStruct = Self;

    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<()> {
        match self.begin()? {
            Begin::Opaque => {
                self.ctx.buffer.put_u8(v as u8);
                self.opaque_scalar();
            }
            Begin::Typed(spec, _) => {
                expect_known(spec, KnownTypeId::Boolean)?;
                self.ctx.buffer.put_u8(v as u8);
            }
        }
        Ok(())
    }

    serialize_fixed! {serialize_i8, i8 => Int8, put_i8}
    serialize_fixed! {serialize_i16, i16 => Int16, put_i16_le}
    serialize_fixed! {serialize_i32, i32 => Int32, put_i32_le}
    serialize_fixed! {serialize_i64, i64 => Int64, put_i64_le}

    serialize_fixed! {serialize_u8, u8 => UInt8, put_u8}
    serialize_fixed! {serialize_u16, u16 => UInt16, put_u16_le}
    serialize_fixed! {serialize_u32, u32 => UInt32, put_u32_le}
    serialize_fixed! {serialize_u64, u64 => UInt64, put_u64_le}

    serialize_fixed! {serialize_f32, f32 => Float32, put_f32_le}
    serialize_fixed! {serialize_f64, f64 => Float64, put_f64_le}

    fn serialize_char(self, v: char) -> Result<()> {
        match self.opaque {
            Some(_) => {
                self.ctx.buffer.put_u32_le(v as u32);
                self.opaque_scalar();
                Ok(())
            }
            None => self.serialize_str(v.encode_utf8(&mut [0_u8; 4])),
        }
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        match self.begin()? {
            Begin::Opaque => {
                write_varuint32(&mut self.ctx.buffer, wire_len(v.len())?);
                self.ctx.buffer.put_slice(v.as_bytes());
                self.opaque_scalar();
            }
            Begin::Typed(spec, _) => {
                expect_known(spec, KnownTypeId::String)?;
                write_varuint36(
                    &mut self.ctx.buffer,
                    ((v.len() as u64) << 2) | consts::STRING_UTF8,
                )?;
                self.ctx.buffer.put_slice(v.as_bytes());
            }
        }
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        match self.begin()? {
            Begin::Opaque => {
                write_varuint32(&mut self.ctx.buffer, wire_len(v.len())?);
                self.ctx.buffer.put_slice(v);
                self.opaque_scalar();
            }
            Begin::Typed(spec, _) => {
                expect_known(spec, KnownTypeId::Binary)?;
                write_varuint32(&mut self.ctx.buffer, wire_len(v.len())?);
                self.ctx.buffer.put_slice(v);
            }
        }
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        if self.opaque.is_some() {
            self.ctx.buffer.put_u8(consts::OPTION_NONE_VARIANT);
            self.opaque_scalar();
            return Ok(());
        }

        let slot = self.take_slot()?;
        if !slot.field.nullable {
            return Err(ForyError::NullValue(slot.field.type_ref.type_name.to_string()));
        }
        if slot.prefixed {
            self.ctx.buffer.put_u8(RefFlag::Null.to_byte());
        }
        Ok(())
    }

    // the slot stays pending for the inner value
    fn serialize_some<T: ?Sized>(self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        if self.opaque.is_some() {
            self.ctx.buffer.put_u8(consts::OPTION_SOME_VARIANT);
        }
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        match self.begin()? {
            Begin::Opaque => {
                self.opaque_scalar();
                Ok(())
            }
            Begin::Typed(spec, _) => Err(ForyError::unsupported(format!(
                "unit value for `{}`",
                spec.type_name()
            ))),
        }
    }

    fn serialize_unit_struct(self, _: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    // serialize the index of a unit variant
    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<()> {
        match self.begin()? {
            Begin::Opaque => {
                self.write_variant_index(variant_index);
                self.opaque_scalar();
                Ok(())
            }
            Begin::Typed(spec, _) => match spec.kind() {
                SpecKind::Enum { .. } => {
                    self.write_variant_index(variant_index);
                    Ok(())
                }
                _ => Err(ForyError::mismatch(format!(
                    "`{}::{}` written where `{}` is declared",
                    name,
                    variant,
                    spec.type_name()
                ))),
            },
        }
    }

    // serialize the inner value
    fn serialize_newtype_struct<T: ?Sized>(self, _: &'static str, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(self)
    }

    // serialize the index, then the inner variant
    fn serialize_newtype_variant<T: ?Sized>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<()>
    where
        T: serde::Serialize,
    {
        match self.begin()? {
            Begin::Opaque => {
                self.write_variant_index(variant_index);
                value.serialize(self)
            }
            Begin::Typed(..) => Err(unit_variants_only(name, variant)),
        }
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq> {
        match self.begin()? {
            Begin::Opaque => {
                self.write_len(len)?;
                self.opaque_open();
            }
            Begin::Typed(spec, slot) => {
                let field: &'r FieldRef = slot.field;
                let element = match (&field.type_ref.shape, spec.kind()) {
                    (
                        TypeShape::List(element) | TypeShape::Set(element),
                        SpecKind::Known(KnownTypeId::List | KnownTypeId::Set),
                    ) => element.as_ref(),
                    _ => {
                        return Err(ForyError::mismatch(format!(
                            "`{}` is not a list or set",
                            spec.type_name()
                        )))
                    }
                };
                self.write_len(len)?;
                self.frames.push(Frame::Seq { element });
            }
        }
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        match self.begin()? {
            Begin::Opaque => {
                self.opaque_open();
                Ok(self)
            }
            Begin::Typed(spec, _) => Err(ForyError::unsupported(format!(
                "tuple value for `{}`",
                spec.type_name()
            ))),
        }
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        self.serialize_tuple(len)
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        match self.begin()? {
            Begin::Opaque => {
                self.write_variant_index(variant_index);
                self.opaque_open();
                Ok(self)
            }
            Begin::Typed(..) => Err(unit_variants_only(name, variant)),
        }
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap> {
        match self.begin()? {
            Begin::Opaque => {
                self.write_len(len)?;
                self.opaque_open();
            }
            Begin::Typed(spec, slot) => {
                let field: &'r FieldRef = slot.field;
                let (key, value) = match (&field.type_ref.shape, spec.kind()) {
                    (TypeShape::Map(key, value), SpecKind::Known(KnownTypeId::Map)) => {
                        (key.as_ref(), value.as_ref())
                    }
                    _ => {
                        return Err(ForyError::mismatch(format!(
                            "`{}` is not a map",
                            spec.type_name()
                        )))
                    }
                };
                self.write_len(len)?;
                self.frames.push(Frame::Map { key, value });
            }
        }
        Ok(self)
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        match self.begin()? {
            Begin::Opaque => self.opaque_open(),
            Begin::Typed(spec, _) => {
                if !matches!(spec.kind(), SpecKind::Struct { .. }) {
                    return Err(ForyError::mismatch(format!(
                        "struct `{}` written where `{}` is declared",
                        name,
                        spec.type_name()
                    )));
                }

                self.depth += 1;
                if self.depth > self.config.max_depth {
                    return Err(ForyError::DepthExceeded(self.config.max_depth));
                }
                self.frames.push(Frame::Struct { spec, next: 0 });
            }
        }
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        match self.begin()? {
            Begin::Opaque => {
                self.write_variant_index(variant_index);
                self.opaque_open();
                Ok(self)
            }
            Begin::Typed(..) => Err(unit_variants_only(name, variant)),
        }
    }
}

impl<'a, 'b, 'r> ser::SerializeSeq for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        self.next_element()?;
        value.serialize(&mut **self)?;
        self.ensure_written()
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeTuple for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_element<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeTupleStruct for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeTupleVariant for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_field<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeMap for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_key<T: ?Sized>(&mut self, key: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        self.next_map_slot(true)?;
        key.serialize(&mut **self)?;
        self.ensure_written()
    }

    fn serialize_value<T: ?Sized>(&mut self, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        self.next_map_slot(false)?;
        value.serialize(&mut **self)?;
        self.ensure_written()
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeStruct for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_field<T: ?Sized>(&mut self, key: &'static str, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        self.next_field(key)?;
        value.serialize(&mut **self)?;
        self.ensure_written()
    }

    // fields are positional, an absent one would shift every later field
    fn skip_field(&mut self, key: &'static str) -> Result<()> {
        Err(ForyError::unsupported(format!("skipping field `{}`", key)))
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

impl<'a, 'b, 'r> ser::SerializeStructVariant for &'a mut DataSerializer<'b, 'r> {
    type Ok = ();

    type Error = ForyError;

    fn serialize_field<T: ?Sized>(&mut self, _key: &'static str, value: &T) -> Result<()>
    where
        T: serde::Serialize,
    {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_len() {
        assert_eq!(wire_len(0).unwrap(), 0);
        assert_eq!(wire_len(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_wire_len_rejects_truncation() {
        let len = u32::MAX as usize + 1;
        assert!(matches!(
            wire_len(len),
            Err(ForyError::Range { value, bits: 32 }) if value == len as u64
        ));
    }
}
