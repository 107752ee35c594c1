//! Self-describing schema blobs for user types.
//!
//! A blob is emitted once per type per message in compatible mode and referenced by
//! index afterwards. Layout:
//!
//! ```text
//! [global header: u64 LE][meta header][namespace + type name | type id][field meta]*
//! ```

mod decoder;
mod encoder;
mod registry;

pub use decoder::{decode_type_meta, read_type_meta_async};
pub use encoder::encode_type_meta;
pub use registry::{MetaEntry, MetaStringTable, TypeMetaRegistry, TypeMetaStringRegistry};

use crate::{
    error::{ForyError, Result},
    types::{
        kind_of, FieldRef, KnownTypeId, Registration, TypeShape, TypeSpecification,
        TypeSpecificationRegistry,
    },
};

/// Bits of the global header holding the blob size.
pub(crate) const META_SIZE_MASK: u64 = 0xfff;
pub(crate) const HAS_FIELDS_FLAG: u64 = 1 << 12;
/// The fingerprint fills the header above this many bits.
pub(crate) const HASH_SHIFT: u32 = 14;

/// Field count stored inline in the meta header before a continuation is needed.
pub(crate) const SMALL_FIELD_COUNT: usize = 0b1_1111;
pub(crate) const REGISTER_BY_NAME_FLAG: u8 = 1 << 5;

/// Inline length of namespace and type name bytes.
pub(crate) const BIG_NAME_THRESHOLD: usize = 0b11_1111;
/// Inline `len - 1` of a field name.
pub(crate) const FIELD_NAME_SIZE_THRESHOLD: usize = 0b1111;

/// Decoded or locally derived schema of one user type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMeta {
    pub registered_by_name: bool,
    /// Full wire id. Zero for name-registered types.
    pub type_id: u32,
    pub namespace: String,
    pub type_name: String,
    pub fields: Vec<FieldMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: String,
    pub nullable: bool,
    pub ref_tracking: bool,
    pub field_type: FieldTypeMeta,
}

/// Wire type of a field, with element/key/value types for collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTypeMeta {
    pub type_id: u32,
    pub nullable: bool,
    pub ref_tracking: bool,
    pub generics: Vec<FieldTypeMeta>,
}

impl FieldTypeMeta {
    /// Resolve a Rust field through the registry.
    pub fn from_field_ref(
        registry: &TypeSpecificationRegistry,
        field: &FieldRef,
        ref_tracking: bool,
        compatible: bool,
    ) -> Result<Self> {
        let spec = registry.resolve(&field.type_ref)?;

        let generics = match &field.type_ref.shape {
            TypeShape::Scalar => vec![],
            TypeShape::List(element) | TypeShape::Set(element) => {
                vec![Self::from_field_ref(registry, element, false, compatible)?]
            }
            TypeShape::Map(key, value) => vec![
                Self::from_field_ref(registry, key, false, compatible)?,
                Self::from_field_ref(registry, value, false, compatible)?,
            ],
        };

        Ok(Self {
            type_id: spec.type_id(compatible),
            nullable: field.nullable,
            ref_tracking,
            generics,
        })
    }

    /// Structural kind of [Self::type_id].
    pub fn kind(&self) -> Result<KnownTypeId> {
        kind_of(self.type_id)
    }

    /// Number of nested type arguments a kind carries on the wire.
    pub(crate) fn arity(kind: KnownTypeId) -> usize {
        match kind {
            KnownTypeId::List | KnownTypeId::Set => 1,
            KnownTypeId::Map => 2,
            _ => 0,
        }
    }
}

impl TypeMeta {
    /// Schema of a registered user type, as the local process would encode it.
    pub fn from_spec(
        spec: &TypeSpecification,
        registry: &TypeSpecificationRegistry,
        compatible: bool,
    ) -> Result<Self> {
        let registration = spec.registration().ok_or_else(|| {
            ForyError::mismatch(format!("builtin `{}` has no type meta", spec.type_name()))
        })?;

        let fields = spec
            .fields()
            .iter()
            .map(|descriptor| {
                Ok(FieldMeta {
                    name: descriptor.name.clone(),
                    nullable: descriptor.nullable(),
                    ref_tracking: descriptor.ref_tracking,
                    field_type: FieldTypeMeta::from_field_ref(
                        registry,
                        &descriptor.field,
                        descriptor.ref_tracking,
                        compatible,
                    )?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let meta = match registration {
            Registration::Id(_) => Self {
                registered_by_name: false,
                type_id: spec.type_id(compatible),
                namespace: String::new(),
                type_name: String::new(),
                fields,
            },
            Registration::Name {
                namespace,
                type_name,
            } => Self {
                registered_by_name: true,
                type_id: 0,
                namespace: namespace.clone(),
                type_name: type_name.clone(),
                fields,
            },
        };

        Ok(meta)
    }

    /// Printable identity: `namespace.name` or the numeric id.
    pub fn display_name(&self) -> String {
        match (self.registered_by_name, self.namespace.is_empty()) {
            (true, true) => self.type_name.clone(),
            (true, false) => format!("{}.{}", self.namespace, self.type_name),
            (false, _) => format!("#{}", self.type_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDescriptor;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Inner {
        id: u32,
    }

    #[derive(Serialize)]
    struct Outer {
        name: String,
        tags: Vec<Option<String>>,
        inner: Option<Inner>,
        scores: HashMap<String, f64>,
    }

    crate::fory_type!(Inner, Outer);

    #[test]
    fn test_from_spec() {
        let mut registry = TypeSpecificationRegistry::default();
        registry
            .register_struct::<Inner>(7, vec![FieldDescriptor::of::<u32>("id")])
            .unwrap();
        registry
            .register_struct_by_name::<Outer>(
                "demo",
                "Outer",
                vec![
                    FieldDescriptor::of::<String>("name"),
                    FieldDescriptor::of::<Vec<Option<String>>>("tags"),
                    FieldDescriptor::of::<Option<Inner>>("inner").tracked(),
                    FieldDescriptor::of::<HashMap<String, f64>>("scores"),
                ],
            )
            .unwrap();

        let spec = registry.get_by_type::<Outer>().unwrap();
        let meta = TypeMeta::from_spec(spec, &registry, true).unwrap();

        assert!(meta.registered_by_name);
        assert_eq!(meta.display_name(), "demo.Outer");
        assert_eq!(meta.fields.len(), 4);

        let tags = &meta.fields[1].field_type;
        assert_eq!(tags.type_id, KnownTypeId::List.id());
        assert!(tags.generics[0].nullable);
        assert_eq!(tags.generics[0].type_id, KnownTypeId::String.id());

        let inner = &meta.fields[2];
        assert!(inner.nullable && inner.ref_tracking);
        assert_eq!(inner.field_type.type_id, (7 << 8) | 16);

        let scores = &meta.fields[3].field_type;
        assert_eq!(scores.generics.len(), 2);
        assert_eq!(scores.generics[1].type_id, KnownTypeId::Float64.id());

        assert!(TypeMeta::from_spec(registry.get_by_type::<u8>().unwrap(), &registry, true).is_err());
    }
}
