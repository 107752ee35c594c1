//! Hint-driven [serde::de::Deserializer] for ext values.
//!
//! Ext values carry no annotations: every length, tag and variant index is implied by
//! the Rust type being deserialized, the same way [super::DataSerializer] wrote it.

use serde::de::{self, DeserializeOwned, IntoDeserializer};

use crate::{
    error::{ForyError, Result},
    varint::read_varuint32,
    viewer::ByteViewer,
};

use super::consts;

pub(crate) struct ExtDeserializer<'v, 'de> {
    input: &'v mut ByteViewer<'de>,
}

impl<'v, 'de> ExtDeserializer<'v, 'de> {
    pub fn new(input: &'v mut ByteViewer<'de>) -> Self {
        Self { input }
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(read_varuint32(self.input)? as usize)
    }

    fn read_str(&mut self) -> Result<&'de str> {
        let len = self.read_len()?;
        std::str::from_utf8(self.input.next_bytes(len)?)
            .map_err(|e| ForyError::InvalidString(e.to_string()))
    }
}

/// Decode and discard one `T`, leaving `viewer` after it.
pub fn skip_ext<T: DeserializeOwned>(viewer: &mut ByteViewer<'_>) -> Result<()> {
    T::deserialize(&mut ExtDeserializer::new(viewer)).map(|_| ())
}

/// Impl deserialize for fixed-width primitives
macro_rules! deserialize_fixed {
    ($fn_name: ident, $visit: ident, $read: ident) => {
        fn $fn_name<V>(self, visitor: V) -> Result<V::Value>
        where
            V: de::Visitor<'de>,
        {
            visitor.$visit(self.input.$read()?)
        }
    };
}

impl<'de, 'a, 'v> de::Deserializer<'de> for &'a mut ExtDeserializer<'v, 'de> {
    type Error = ForyError;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(ForyError::unsupported("self-describing ext values"))
    }

    fn deserialize_bool<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_bool(self.input.next_byte()? != 0)
    }

    deserialize_fixed! {deserialize_i8, visit_i8, read_i8}
    deserialize_fixed! {deserialize_i16, visit_i16, read_i16_le}
    deserialize_fixed! {deserialize_i32, visit_i32, read_i32_le}
    deserialize_fixed! {deserialize_i64, visit_i64, read_i64_le}
    deserialize_fixed! {deserialize_u8, visit_u8, next_byte}
    deserialize_fixed! {deserialize_u16, visit_u16, read_u16_le}
    deserialize_fixed! {deserialize_u32, visit_u32, read_u32_le}
    deserialize_fixed! {deserialize_u64, visit_u64, read_u64_le}
    deserialize_fixed! {deserialize_f32, visit_f32, read_f32_le}
    deserialize_fixed! {deserialize_f64, visit_f64, read_f64_le}

    fn deserialize_char<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let code = self.input.read_u32_le()?;
        let ch = char::from_u32(code)
            .ok_or_else(|| ForyError::InvalidString(format!("invalid char {:#x}", code)))?;
        visitor.visit_char(ch)
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_borrowed_str(self.read_str()?)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let len = self.read_len()?;
        visitor.visit_borrowed_bytes(self.input.next_bytes(len)?)
    }

    fn deserialize_byte_buf<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.input.next_byte()? {
            consts::OPTION_NONE_VARIANT => visitor.visit_none(),
            consts::OPTION_SOME_VARIANT => visitor.visit_some(self),
            other => Err(ForyError::mismatch(format!("invalid option tag {:#x}", other))),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let remaining = self.read_len()?;
        visitor.visit_seq(Counted {
            de: self,
            remaining,
        })
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_seq(Counted {
            de: self,
            remaining: len,
        })
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        let remaining = self.read_len()?;
        visitor.visit_map(Counted {
            de: self,
            remaining,
        })
    }

    // structs are positional
    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        self.deserialize_tuple(fields.len(), visitor)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self)
    }

    fn deserialize_identifier<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(ForyError::unsupported("identifiers inside ext values"))
    }

    fn deserialize_ignored_any<V>(self, _visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        Err(ForyError::unsupported("ignored values inside ext values"))
    }

    fn is_human_readable(&self) -> bool {
        false
    }
}

/// Sequence, tuple, struct or map of a known element count.
struct Counted<'a, 'v, 'de> {
    de: &'a mut ExtDeserializer<'v, 'de>,
    remaining: usize,
}

impl<'de, 'a, 'v> de::SeqAccess<'de> for Counted<'a, 'v, 'de> {
    type Error = ForyError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

impl<'de, 'a, 'v> de::MapAccess<'de> for Counted<'a, 'v, 'de> {
    type Error = ForyError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>>
    where
        K: de::DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        seed.deserialize(&mut *self.de).map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value>
    where
        V: de::DeserializeSeed<'de>,
    {
        seed.deserialize(&mut *self.de)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

impl<'de, 'a, 'v> de::EnumAccess<'de> for &'a mut ExtDeserializer<'v, 'de> {
    type Error = ForyError;

    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant)>
    where
        V: de::DeserializeSeed<'de>,
    {
        let index = read_varuint32(self.input)?;
        let value = seed.deserialize(IntoDeserializer::<'de, ForyError>::into_deserializer(index))?;
        Ok((value, self))
    }
}

impl<'de, 'a, 'v> de::VariantAccess<'de> for &'a mut ExtDeserializer<'v, 'de> {
    type Error = ForyError;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        de::Deserializer::deserialize_tuple(self, len, visitor)
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        de::Deserializer::deserialize_tuple(self, fields.len(), visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;
    use serde::Deserialize;

    use crate::varint::write_varuint32;

    #[derive(Debug, PartialEq, Deserialize)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: u16, h: u16 },
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct Drawing {
        name: String,
        label: Option<char>,
        shapes: Vec<Shape>,
    }

    fn drawing_bytes() -> Vec<u8> {
        let mut buf = Vec::new();
        write_varuint32(&mut buf, 3);
        buf.put_slice(b"art");
        buf.put_u8(consts::OPTION_SOME_VARIANT);
        buf.put_u32_le('x' as u32);
        write_varuint32(&mut buf, 3);
        write_varuint32(&mut buf, 0);
        write_varuint32(&mut buf, 1);
        buf.put_f64_le(2.5);
        write_varuint32(&mut buf, 2);
        buf.put_u16_le(3);
        buf.put_u16_le(4);
        buf
    }

    #[test]
    fn test_ext_layout() {
        let bytes = drawing_bytes();
        let mut viewer = ByteViewer::from_slice(&bytes);
        let drawing = Drawing::deserialize(&mut ExtDeserializer::new(&mut viewer)).unwrap();

        assert_eq!(
            drawing,
            Drawing {
                name: "art".to_string(),
                label: Some('x'),
                shapes: vec![Shape::Dot, Shape::Circle(2.5), Shape::Rect { w: 3, h: 4 }],
            }
        );
        assert!(viewer.is_end());
    }

    #[test]
    fn test_skip_ext() {
        let mut bytes = drawing_bytes();
        bytes.push(0xaa);
        let mut viewer = ByteViewer::from_slice(&bytes);

        skip_ext::<Drawing>(&mut viewer).unwrap();
        assert_eq!(viewer.rest(), &[0xaa]);

        let mut short = ByteViewer::from_slice(&bytes[..6]);
        assert!(matches!(
            skip_ext::<Drawing>(&mut short),
            Err(ForyError::UnexpectedEof { .. })
        ));
    }
}
