//! Registry mapping runtime types and wire ids to their specifications.

use std::{any::TypeId, collections::HashMap};

use serde::de::DeserializeOwned;

use crate::{
    error::{ForyError, Result},
    ser_de::skip_ext,
};

use super::{
    FieldDescriptor, ForyType, KnownTypeId, Registration, SpecKind, TypeRef, TypeShape,
    TypeSpecification,
};

/// User ids are shifted above the kind byte and must fit the remaining 24 bits.
const MAX_USER_ID: u32 = (1 << 24) - 1;

/// Builtins that exist on the wire but have no dedicated Rust type here.
const ID_ONLY_KNOWN: &[KnownTypeId] = &[
    KnownTypeId::VarInt32,
    KnownTypeId::VarInt64,
    KnownTypeId::SliInt64,
    KnownTypeId::Float16,
    KnownTypeId::List,
    KnownTypeId::Set,
    KnownTypeId::Map,
    KnownTypeId::Duration,
    KnownTypeId::Timestamp,
    KnownTypeId::LocalDate,
];

/// Bidirectional type/id lookup, seeded with every builtin.
///
/// Read-only once populated, so one instance can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct TypeSpecificationRegistry {
    specs: Vec<TypeSpecification>,
    by_type: HashMap<TypeId, usize>,
    by_known: HashMap<KnownTypeId, usize>,
    by_user_id: HashMap<u32, usize>,
    by_name: HashMap<(String, String), usize>,
}

impl Default for TypeSpecificationRegistry {
    fn default() -> Self {
        let mut registry = Self {
            specs: Vec::new(),
            by_type: HashMap::new(),
            by_known: HashMap::new(),
            by_user_id: HashMap::new(),
            by_name: HashMap::new(),
        };

        registry.seed_known::<bool>(KnownTypeId::Boolean);
        registry.seed_known::<i8>(KnownTypeId::Int8);
        registry.seed_known::<i16>(KnownTypeId::Int16);
        registry.seed_known::<i32>(KnownTypeId::Int32);
        registry.seed_known::<i64>(KnownTypeId::Int64);
        registry.seed_known::<f32>(KnownTypeId::Float32);
        registry.seed_known::<f64>(KnownTypeId::Float64);
        registry.seed_known::<u8>(KnownTypeId::UInt8);
        registry.seed_known::<u16>(KnownTypeId::UInt16);
        registry.seed_known::<u32>(KnownTypeId::UInt32);
        registry.seed_known::<u64>(KnownTypeId::UInt64);
        registry.seed_known::<String>(KnownTypeId::String);
        registry.seed_known::<str>(KnownTypeId::String);
        registry.seed_known::<serde_bytes::ByteBuf>(KnownTypeId::Binary);

        for known in ID_ONLY_KNOWN {
            registry.push_known(TypeSpecification::known(None, "builtin", *known));
        }

        registry
    }
}

impl TypeSpecificationRegistry {
    fn seed_known<T: ?Sized + 'static>(&mut self, id: KnownTypeId) {
        let index = self.push_known(TypeSpecification::known(
            Some(TypeId::of::<T>()),
            std::any::type_name::<T>(),
            id,
        ));
        self.by_type.insert(TypeId::of::<T>(), index);
    }

    fn push_known(&mut self, spec: TypeSpecification) -> usize {
        let index = self.specs.len();
        if let super::SpecKind::Known(id) = spec.kind() {
            // first Rust type seeded for an id stays its canonical entry
            self.by_known.entry(*id).or_insert(index);
        }
        self.specs.push(spec);
        index
    }

    fn insert_user<T: ForyType>(&mut self, kind: SpecKind) -> Result<()> {
        let rust_type = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        if self.by_type.contains_key(&rust_type) {
            return Err(ForyError::mismatch(format!(
                "type `{}` is already registered",
                type_name
            )));
        }

        let index = self.specs.len();
        match &kind {
            SpecKind::Struct { registration, .. }
            | SpecKind::Enum { registration }
            | SpecKind::Ext { registration, .. } => match registration {
                Registration::Id(id) => {
                    if *id > MAX_USER_ID {
                        return Err(ForyError::Range {
                            value: *id as u64,
                            bits: 24,
                        });
                    }
                    if self.by_user_id.contains_key(id) {
                        return Err(ForyError::mismatch(format!(
                            "user type id {} is already registered",
                            id
                        )));
                    }
                    self.by_user_id.insert(*id, index);
                }
                Registration::Name {
                    namespace,
                    type_name: name,
                } => {
                    let key = (namespace.clone(), name.clone());
                    if self.by_name.contains_key(&key) {
                        return Err(ForyError::mismatch(format!(
                            "type name {}.{} is already registered",
                            namespace, name
                        )));
                    }
                    self.by_name.insert(key, index);
                }
            },
            SpecKind::Known(_) => {
                return Err(ForyError::mismatch("builtin kinds cannot be registered"))
            }
        }

        log::debug!("registered `{}` as {:?}", type_name, kind_label(&kind));
        self.by_type.insert(rust_type, index);
        self.specs
            .push(TypeSpecification::user(rust_type, type_name, kind));
        Ok(())
    }

    pub fn register_struct<T: ForyType>(
        &mut self,
        id: u32,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        check_fields::<T>(&fields)?;
        self.insert_user::<T>(SpecKind::Struct {
            registration: Registration::Id(id),
            fields,
        })
    }

    pub fn register_struct_by_name<T: ForyType>(
        &mut self,
        namespace: &str,
        type_name: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        check_fields::<T>(&fields)?;
        self.insert_user::<T>(SpecKind::Struct {
            registration: name_registration(namespace, type_name),
            fields,
        })
    }

    /// Register by the Rust type name, optionally keeping its module path as namespace.
    pub fn register_struct_by_type_name<T: ForyType>(
        &mut self,
        include_namespace: bool,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        let (namespace, type_name) = split_type_name::<T>(include_namespace);
        self.register_struct_by_name::<T>(&namespace, &type_name, fields)
    }

    pub fn register_enum<T: ForyType>(&mut self, id: u32) -> Result<()> {
        self.insert_user::<T>(SpecKind::Enum {
            registration: Registration::Id(id),
        })
    }

    pub fn register_enum_by_name<T: ForyType>(
        &mut self,
        namespace: &str,
        type_name: &str,
    ) -> Result<()> {
        self.insert_user::<T>(SpecKind::Enum {
            registration: name_registration(namespace, type_name),
        })
    }

    /// Register a type whose own serde impls form its codec.
    pub fn register_ext<T: ForyType + DeserializeOwned>(&mut self, id: u32) -> Result<()> {
        self.insert_user::<T>(SpecKind::Ext {
            registration: Registration::Id(id),
            skip: skip_ext::<T>,
        })
    }

    pub fn register_ext_by_name<T: ForyType + DeserializeOwned>(
        &mut self,
        namespace: &str,
        type_name: &str,
    ) -> Result<()> {
        self.insert_user::<T>(SpecKind::Ext {
            registration: name_registration(namespace, type_name),
            skip: skip_ext::<T>,
        })
    }

    /// Mark every value of `T` as trackable in [crate::RefMode::Tracking].
    pub fn track_references<T: ForyType + ?Sized>(&mut self) -> Result<()> {
        let index = *self
            .by_type
            .get(&TypeId::of::<T>())
            .ok_or_else(|| ForyError::UnregisteredType(std::any::type_name::<T>().to_string()))?;
        self.specs[index].set_reference_tracking(true);
        Ok(())
    }

    /// Exact match on the Rust type, falling back to the generic definition for collections.
    pub fn resolve(&self, type_ref: &TypeRef) -> Result<&TypeSpecification> {
        if let Some(index) = self.by_type.get(&type_ref.rust_type) {
            return Ok(&self.specs[*index]);
        }

        let definition = match type_ref.shape {
            TypeShape::Scalar => None,
            TypeShape::List(_) => Some(KnownTypeId::List),
            TypeShape::Set(_) => Some(KnownTypeId::Set),
            TypeShape::Map(..) => Some(KnownTypeId::Map),
        };

        definition
            .and_then(|known| self.get_known(known))
            .ok_or_else(|| ForyError::UnregisteredType(type_ref.type_name.to_string()))
    }

    pub fn get_by_type<T: ForyType + ?Sized>(&self) -> Result<&TypeSpecification> {
        self.resolve(&T::type_ref())
    }

    pub fn get_known(&self, id: KnownTypeId) -> Option<&TypeSpecification> {
        self.by_known.get(&id).map(|index| &self.specs[*index])
    }

    /// Lookup by wire type id. Named kinds need [Self::get_by_name] instead.
    pub fn get_by_id(&self, type_id: u32) -> Result<&TypeSpecification> {
        let kind = super::kind_of(type_id)?;

        if !kind.is_user_kind() {
            return self
                .get_known(kind)
                .ok_or_else(|| ForyError::UnregisteredType(format!("builtin {:?}", kind)));
        }
        if kind.is_named_kind() {
            return Err(ForyError::mismatch(format!(
                "{:?} is registered by name, not id",
                kind
            )));
        }

        let user_id = type_id >> 8;
        let spec = self
            .by_user_id
            .get(&user_id)
            .map(|index| &self.specs[*index])
            .ok_or_else(|| ForyError::UnregisteredType(format!("user type id {}", user_id)))?;

        match same_family(spec, kind) {
            true => Ok(spec),
            false => Err(ForyError::mismatch(format!(
                "id {} is `{}`, not a {:?}",
                user_id,
                spec.type_name(),
                kind
            ))),
        }
    }

    pub fn get_by_name(&self, namespace: &str, type_name: &str) -> Result<&TypeSpecification> {
        self.by_name
            .get(&(namespace.to_string(), type_name.to_string()))
            .map(|index| &self.specs[*index])
            .ok_or_else(|| ForyError::UnregisteredType(format!("{}.{}", namespace, type_name)))
    }
}

fn same_family(spec: &TypeSpecification, kind: KnownTypeId) -> bool {
    match spec.kind() {
        SpecKind::Struct { .. } => kind.is_struct_kind(),
        SpecKind::Enum { .. } => kind.is_enum_kind(),
        SpecKind::Ext { .. } => kind.is_ext_kind(),
        SpecKind::Known(id) => *id == kind,
    }
}

fn kind_label(kind: &SpecKind) -> &'static str {
    match kind {
        SpecKind::Known(_) => "known",
        SpecKind::Struct { .. } => "struct",
        SpecKind::Enum { .. } => "enum",
        SpecKind::Ext { .. } => "ext",
    }
}

fn name_registration(namespace: &str, type_name: &str) -> Registration {
    Registration::Name {
        namespace: namespace.to_string(),
        type_name: type_name.to_string(),
    }
}

fn check_fields<T: ?Sized>(fields: &[FieldDescriptor]) -> Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if fields[..i].iter().any(|f| f.name == field.name) {
            return Err(ForyError::mismatch(format!(
                "duplicate field `{}` in `{}`",
                field.name,
                std::any::type_name::<T>()
            )));
        }
    }
    Ok(())
}

/// Split `a::b::Name<..>` into (`a.b`, `Name`).
fn split_type_name<T: ?Sized>(include_namespace: bool) -> (String, String) {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);

    match base.rsplit_once("::") {
        Some((path, name)) if include_namespace => (path.replace("::", "."), name.to_string()),
        Some((_, name)) => (String::new(), name.to_string()),
        None => (String::new(), base.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[derive(Serialize, Deserialize)]
    enum Color {
        Red,
        Green,
    }

    crate::fory_type!(Point, Color);

    fn point_fields() -> Vec<FieldDescriptor> {
        vec![FieldDescriptor::of::<i32>("x"), FieldDescriptor::of::<i32>("y")]
    }

    #[test]
    fn test_builtins_seeded() {
        let registry = TypeSpecificationRegistry::default();

        assert_eq!(registry.get_by_type::<u32>().unwrap().type_id(false), 66);
        assert_eq!(registry.get_by_type::<String>().unwrap().type_id(false), 12);
        assert_eq!(registry.get_by_type::<str>().unwrap().type_id(false), 12);
        assert_eq!(registry.get_by_id(66).unwrap().type_name(), "u32");
        assert_eq!(registry.get_by_id(21).unwrap().type_id(false), 21);
    }

    #[test]
    fn test_generic_fallback() {
        let registry = TypeSpecificationRegistry::default();

        let spec = registry.get_by_type::<Vec<Option<String>>>().unwrap();
        assert_eq!(spec.type_id(false), KnownTypeId::List.id());
        let spec = registry
            .get_by_type::<HashMap<String, Vec<i64>>>()
            .unwrap();
        assert_eq!(spec.type_id(false), KnownTypeId::Map.id());
    }

    #[test]
    fn test_unregistered() {
        let registry = TypeSpecificationRegistry::default();
        assert!(matches!(
            registry.get_by_type::<Point>(),
            Err(ForyError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_register_user_types() {
        let mut registry = TypeSpecificationRegistry::default();
        registry.register_struct::<Point>(100, point_fields()).unwrap();
        registry
            .register_enum_by_name::<Color>("demo", "Color")
            .unwrap();

        let point = registry.get_by_type::<Point>().unwrap();
        assert_eq!(point.type_id(false), (100 << 8) | 15);
        assert_eq!(point.fields().len(), 2);
        assert_eq!(
            registry.get_by_id((100 << 8) | 16).unwrap().type_name(),
            point.type_name()
        );
        // same user id, wrong family
        assert!(registry.get_by_id((100 << 8) | 13).is_err());

        let color = registry.get_by_name("demo", "Color").unwrap();
        assert!(color.is_registered_by_name());
        assert_eq!(color.type_id(true), 14);

        assert!(registry.register_enum::<Color>(5).is_err());
        assert!(registry.register_struct::<Point>(101, point_fields()).is_err());
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let mut registry = TypeSpecificationRegistry::default();
        let dup = vec![FieldDescriptor::of::<i32>("x"), FieldDescriptor::of::<i64>("x")];
        assert!(registry.register_struct::<Point>(1, dup).is_err());
        assert!(matches!(
            registry.register_struct::<Point>(1 << 24, point_fields()),
            Err(ForyError::Range { .. })
        ));
    }

    #[test]
    fn test_register_by_type_name() {
        let mut registry = TypeSpecificationRegistry::default();
        registry
            .register_struct_by_type_name::<Point>(true, point_fields())
            .unwrap();

        let (namespace, name) = split_type_name::<Point>(true);
        assert_eq!(name, "Point");
        assert!(namespace.ends_with("types.registry.tests"));
        assert!(registry.get_by_name(&namespace, "Point").is_ok());

        assert_eq!(split_type_name::<Vec<u8>>(false).1, "Vec");
    }
}
