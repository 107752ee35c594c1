//! Type identity model: builtin ids, user type specifications and their registry.

mod known;
mod registry;
mod type_ref;

use std::any::TypeId;

pub use known::{extract_known_type, kind_of, KnownTypeId};
pub use registry::TypeSpecificationRegistry;
pub use type_ref::{FieldDescriptor, FieldRef, ForyType, TypeRef, TypeShape};

use crate::{error::Result, viewer::ByteViewer};

/// Discards one encoded value of a registered ext type.
pub type ExtSkipFn = for<'a, 'b> fn(&'a mut ByteViewer<'b>) -> Result<()>;

/// How a user type is identified on the wire. Fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Registration {
    Id(u32),
    Name { namespace: String, type_name: String },
}

impl Registration {
    pub fn is_by_name(&self) -> bool {
        matches!(self, Self::Name { .. })
    }

    pub fn user_id(&self) -> Option<u32> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name { .. } => None,
        }
    }
}

/// Structural kind of a specification, one case per wire kind.
#[derive(Debug, Clone)]
pub enum SpecKind {
    Known(KnownTypeId),
    Struct {
        registration: Registration,
        fields: Vec<FieldDescriptor>,
    },
    /// Serialized as the variant index.
    Enum { registration: Registration },
    /// Serialized by the type's own serde impls.
    Ext {
        registration: Registration,
        skip: ExtSkipFn,
    },
}

/// Associates a runtime type with its wire identity.
#[derive(Debug, Clone)]
pub struct TypeSpecification {
    rust_type: Option<TypeId>,
    type_name: &'static str,
    reference_tracking: bool,
    kind: SpecKind,
}

impl TypeSpecification {
    pub(crate) fn known(rust_type: Option<TypeId>, type_name: &'static str, id: KnownTypeId) -> Self {
        Self {
            rust_type,
            type_name,
            reference_tracking: false,
            kind: SpecKind::Known(id),
        }
    }

    pub(crate) fn user(rust_type: TypeId, type_name: &'static str, kind: SpecKind) -> Self {
        Self {
            rust_type: Some(rust_type),
            type_name,
            reference_tracking: false,
            kind,
        }
    }

    pub fn kind(&self) -> &SpecKind {
        &self.kind
    }

    pub fn rust_type(&self) -> Option<TypeId> {
        self.rust_type
    }

    /// Rust type name, or the builtin kind for id-only entries.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn reference_tracking(&self) -> bool {
        self.reference_tracking
    }

    pub(crate) fn set_reference_tracking(&mut self, tracking: bool) {
        self.reference_tracking = tracking;
    }

    pub fn registration(&self) -> Option<&Registration> {
        match &self.kind {
            SpecKind::Known(_) => None,
            SpecKind::Struct { registration, .. }
            | SpecKind::Enum { registration }
            | SpecKind::Ext { registration, .. } => Some(registration),
        }
    }

    pub fn is_registered_by_name(&self) -> bool {
        self.registration().is_some_and(Registration::is_by_name)
    }

    pub fn is_user_type(&self) -> bool {
        !matches!(self.kind, SpecKind::Known(_))
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        match &self.kind {
            SpecKind::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Wire type id of this specification.
    pub fn type_id(&self, compatible: bool) -> u32 {
        get_type_id(self, compatible)
    }

    /// Structural kind byte of [Self::type_id].
    pub fn wire_kind(&self, compatible: bool) -> KnownTypeId {
        match &self.kind {
            SpecKind::Known(id) => *id,
            SpecKind::Enum { registration } => match registration.is_by_name() {
                true => KnownTypeId::NamedEnum,
                false => KnownTypeId::Enum,
            },
            SpecKind::Struct { registration, .. } => {
                match (compatible, registration.is_by_name()) {
                    (true, true) => KnownTypeId::NamedCompatibleStruct,
                    (true, false) => KnownTypeId::CompatibleStruct,
                    (false, true) => KnownTypeId::NamedStruct,
                    (false, false) => KnownTypeId::Struct,
                }
            }
            SpecKind::Ext { registration, .. } => match registration.is_by_name() {
                true => KnownTypeId::NamedExt,
                false => KnownTypeId::Ext,
            },
        }
    }
}

/// Wire id of a specification.
///
/// Named user types use the bare kind id; id-registered ones shift the user id
/// above the kind byte.
pub fn get_type_id(spec: &TypeSpecification, compatible: bool) -> u32 {
    let kind = spec.wire_kind(compatible).id();
    match spec.registration().and_then(Registration::user_id) {
        Some(user_id) => (user_id << 8) | kind,
        None => kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_skip(_: &mut ByteViewer<'_>) -> Result<()> {
        Ok(())
    }

    fn spec(kind: SpecKind) -> TypeSpecification {
        TypeSpecification::user(TypeId::of::<()>(), "()", kind)
    }

    fn named() -> Registration {
        Registration::Name {
            namespace: "demo".to_string(),
            type_name: "Thing".to_string(),
        }
    }

    #[test]
    fn test_get_type_id() {
        let by_id = spec(SpecKind::Struct {
            registration: Registration::Id(7),
            fields: vec![],
        });
        assert_eq!(get_type_id(&by_id, false), (7 << 8) | 15);
        assert_eq!(get_type_id(&by_id, true), (7 << 8) | 16);

        let by_name = spec(SpecKind::Struct {
            registration: named(),
            fields: vec![],
        });
        assert_eq!(get_type_id(&by_name, false), 17);
        assert_eq!(get_type_id(&by_name, true), 18);

        let enum_id = spec(SpecKind::Enum {
            registration: Registration::Id(3),
        });
        assert_eq!(get_type_id(&enum_id, true), (3 << 8) | 13);
        let enum_named = spec(SpecKind::Enum {
            registration: named(),
        });
        assert_eq!(get_type_id(&enum_named, false), 14);

        let ext_id = spec(SpecKind::Ext {
            registration: Registration::Id(9),
            skip: no_skip,
        });
        assert_eq!(get_type_id(&ext_id, false), (9 << 8) | 19);
        let ext_named = spec(SpecKind::Ext {
            registration: named(),
            skip: no_skip,
        });
        assert_eq!(get_type_id(&ext_named, true), 20);
        assert!(ext_named.is_registered_by_name());

        let known = TypeSpecification::known(None, "u32", KnownTypeId::UInt32);
        assert_eq!(get_type_id(&known, true), 66);
        assert!(!known.is_user_type());
    }
}
