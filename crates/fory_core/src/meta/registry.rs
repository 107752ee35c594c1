//! Session-scoped dedup tables for schema blobs and meta strings.

use std::{any::TypeId, collections::HashMap};

use bytes::{BufMut, Bytes};

use crate::{
    error::{ForyError, Result},
    meta_string::{MetaStringBytes, MetaStringEncoding, MetaStringFactory},
    types::{TypeSpecification, TypeSpecificationRegistry},
    varint::{read_varuint32, write_varuint32},
    viewer::ByteViewer,
};

use super::{encode_type_meta, TypeMeta};

/// Meta strings longer than this carry their full hash instead of the encoding byte.
const SMALL_STRING_THRESHOLD: usize = 16;

/// Result of looking a type up in a [TypeMetaRegistry].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaEntry {
    /// First occurrence. The blob was queued for the meta section.
    Definition { index: usize, blob: Bytes },
    Reference { index: usize },
}

impl MetaEntry {
    pub fn index(&self) -> usize {
        match self {
            Self::Definition { index, .. } | Self::Reference { index } => *index,
        }
    }

    /// Wire form of the type info reference, `((index + 1) << 1) | 1`.
    pub fn encode_reference(&self) -> u32 {
        (((self.index() + 1) << 1) | 1) as u32
    }
}

/// Schema blobs queued by one message, in first-use order.
#[derive(Debug, Default)]
pub struct TypeMetaRegistry {
    indices: HashMap<TypeId, usize>,
    blobs: Vec<Bytes>,
}

impl TypeMetaRegistry {
    pub fn register(
        &mut self,
        spec: &TypeSpecification,
        registry: &TypeSpecificationRegistry,
    ) -> Result<MetaEntry> {
        let rust_type = spec.rust_type().ok_or_else(|| {
            ForyError::mismatch(format!("builtin `{}` has no type meta", spec.type_name()))
        })?;

        if let Some(index) = self.indices.get(&rust_type) {
            return Ok(MetaEntry::Reference { index: *index });
        }

        let meta = TypeMeta::from_spec(spec, registry, true)?;
        let blob = Bytes::from(encode_type_meta(&meta)?);
        let index = self.blobs.len();

        log::debug!(
            "type meta #{} for `{}` ({} bytes)",
            index,
            spec.type_name(),
            blob.len()
        );
        self.indices.insert(rust_type, index);
        self.blobs.push(blob.clone());

        Ok(MetaEntry::Definition { index, blob })
    }

    pub fn blobs(&self) -> &[Bytes] {
        &self.blobs
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// `[varuint32 count][blob]*`
    pub fn write_section<B: BufMut>(&self, buf: &mut B) {
        write_varuint32(buf, self.blobs.len() as u32);
        for blob in &self.blobs {
            buf.put_slice(blob);
        }
    }

    pub fn clear(&mut self) {
        self.indices.clear();
        self.blobs.clear();
    }
}

/// Writer side of the meta-string pair codec.
#[derive(Debug, Default)]
pub struct TypeMetaStringRegistry {
    indices: HashMap<MetaStringBytes, usize>,
}

impl TypeMetaStringRegistry {
    /// Encode `value` with `factory` and write it, or a reference to an earlier copy.
    pub fn write<B: BufMut>(
        &mut self,
        buf: &mut B,
        factory: &MetaStringFactory,
        value: &str,
    ) -> Result<()> {
        let meta = MetaStringBytes::new(factory.encode(value)?);

        if let Some(index) = self.indices.get(&meta) {
            write_varuint32(buf, (((index + 1) << 1) | 1) as u32);
            return Ok(());
        }

        let len = meta.bytes().len();
        write_varuint32(buf, (len << 1) as u32);
        match len > SMALL_STRING_THRESHOLD {
            true => buf.put_u64_le(meta.hash_code()),
            false => buf.put_u8(meta.encoding().flag()),
        }
        buf.put_slice(meta.bytes());

        log::trace!("meta string #{} {:?}", self.indices.len(), value);
        let index = self.indices.len();
        self.indices.insert(meta, index);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

/// Reader side of the meta-string pair codec.
#[derive(Debug, Default)]
pub struct MetaStringTable {
    entries: Vec<MetaStringBytes>,
}

impl MetaStringTable {
    /// Read one meta string and decode it with `factory`.
    pub fn read(&mut self, viewer: &mut ByteViewer<'_>, factory: &MetaStringFactory) -> Result<String> {
        let header = read_varuint32(viewer)? as usize;

        if header & 1 == 1 {
            let index = (header >> 1)
                .checked_sub(1)
                .ok_or_else(|| ForyError::protocol("meta string reference to index -1"))?;
            let meta = self.entries.get(index).ok_or_else(|| {
                ForyError::protocol(format!("meta string reference {} out of range", index))
            })?;
            return factory.decode(meta.encoding(), meta.bytes());
        }

        let len = header >> 1;
        let (encoding, hash) = match len > SMALL_STRING_THRESHOLD {
            true => {
                let hash = viewer.read_u64_le()?;
                (MetaStringEncoding::from_flag((hash & 0xff) as u8)?, Some(hash))
            }
            false => (MetaStringEncoding::from_flag(viewer.next_byte()?)?, None),
        };
        let bytes = viewer.next_bytes(len)?.to_vec();

        let meta = match hash {
            Some(hash) => MetaStringBytes::from_parts(bytes, encoding, hash),
            None => {
                let hash = MetaStringBytes::compute_hash(&bytes, encoding);
                MetaStringBytes::from_parts(bytes, encoding, hash)
            }
        };
        let value = factory.decode(meta.encoding(), meta.bytes())?;
        self.entries.push(meta);

        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        meta_string::{NAMESPACE_FACTORY, TYPE_NAME_FACTORY},
        types::FieldDescriptor,
    };
    use serde::Serialize;

    #[derive(Serialize)]
    struct Sample {
        id: i64,
    }

    crate::fory_type!(Sample);

    #[test]
    fn test_meta_dedup() {
        let mut registry = TypeSpecificationRegistry::default();
        registry
            .register_struct_by_name::<Sample>("demo", "Sample", vec![FieldDescriptor::of::<i64>("id")])
            .unwrap();
        let spec = registry.get_by_type::<Sample>().unwrap();

        let mut metas = TypeMetaRegistry::default();
        let first = metas.register(spec, &registry).unwrap();
        let second = metas.register(spec, &registry).unwrap();

        let blob = match &first {
            MetaEntry::Definition { index: 0, blob } => blob.clone(),
            other => panic!("expected a definition, got {:?}", other),
        };
        assert_eq!(second, MetaEntry::Reference { index: 0 });
        assert_eq!(second.encode_reference(), 0b11);
        assert!(crate::varint::encode_varuint32(second.encode_reference()).len() < blob.len());
        assert_eq!(metas.len(), 1);

        // both forms resolve to the same schema
        let decoded = crate::meta::decode_type_meta(&mut ByteViewer::from_slice(&blob)).unwrap();
        assert_eq!(decoded, TypeMeta::from_spec(spec, &registry, true).unwrap());

        let mut section = Vec::new();
        metas.write_section(&mut section);
        assert_eq!(section[0], 1);
        assert_eq!(&section[1..], &blob[..]);
    }

    #[test]
    fn test_meta_string_pairs() {
        let long_namespace = "org.apache.fory.benchmark.data";
        let mut writer = TypeMetaStringRegistry::default();
        let mut buf = Vec::new();

        writer.write(&mut buf, &NAMESPACE_FACTORY, "demo").unwrap();
        writer.write(&mut buf, &TYPE_NAME_FACTORY, "Person").unwrap();
        writer.write(&mut buf, &NAMESPACE_FACTORY, long_namespace).unwrap();
        writer.write(&mut buf, &NAMESPACE_FACTORY, "demo").unwrap();
        writer.write(&mut buf, &NAMESPACE_FACTORY, long_namespace).unwrap();
        assert_eq!(writer.len(), 3);

        let mut reader = MetaStringTable::default();
        let mut viewer = ByteViewer::from_slice(&buf);
        assert_eq!(reader.read(&mut viewer, &NAMESPACE_FACTORY).unwrap(), "demo");
        assert_eq!(reader.read(&mut viewer, &TYPE_NAME_FACTORY).unwrap(), "Person");
        assert_eq!(reader.read(&mut viewer, &NAMESPACE_FACTORY).unwrap(), long_namespace);

        // references are one byte each
        let before = viewer.position();
        assert_eq!(reader.read(&mut viewer, &NAMESPACE_FACTORY).unwrap(), "demo");
        assert_eq!(viewer.position() - before, 1);
        assert_eq!(reader.read(&mut viewer, &NAMESPACE_FACTORY).unwrap(), long_namespace);
        assert!(viewer.is_end());
        assert_eq!(reader.len(), 3);
    }

    #[test]
    fn test_bad_reference() {
        let mut reader = MetaStringTable::default();
        assert!(reader
            .read(&mut ByteViewer::from_slice(&[0b11]), &NAMESPACE_FACTORY)
            .is_err());
        assert!(reader
            .read(&mut ByteViewer::from_slice(&[0b01]), &NAMESPACE_FACTORY)
            .is_err());
    }
}
