//! Static type shapes for Rust types and the field descriptors built from them.

use std::{
    any::TypeId,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
};

/// Generic shape of a runtime type. Only collections carry nested arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    /// Resolved purely through the registry: a builtin scalar or a registered user type.
    Scalar,
    List(Box<FieldRef>),
    Set(Box<FieldRef>),
    Map(Box<FieldRef>, Box<FieldRef>),
}

/// Identity of a Rust type as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub rust_type: TypeId,
    pub type_name: &'static str,
    pub shape: TypeShape,
}

impl TypeRef {
    pub fn scalar<T: ?Sized + 'static>() -> Self {
        Self {
            rust_type: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            shape: TypeShape::Scalar,
        }
    }

    fn with_shape<T: ?Sized + 'static>(shape: TypeShape) -> Self {
        Self {
            shape,
            ..Self::scalar::<T>()
        }
    }
}

/// A type reference plus whether the position admits null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub type_ref: TypeRef,
    pub nullable: bool,
}

/// Implemented by every type that crosses the wire.
///
/// The shape drives schema encoding and lets the data codec find element types
/// of collections; values themselves travel through serde.
pub trait ForyType: 'static {
    /// Whether `Option<Self>`-like null is part of the type.
    const NULLABLE: bool = false;

    fn type_ref() -> TypeRef;

    fn field_ref() -> FieldRef {
        FieldRef {
            type_ref: Self::type_ref(),
            nullable: Self::NULLABLE,
        }
    }

    /// Whether this particular value is null.
    fn is_null(&self) -> bool {
        false
    }
}

macro_rules! scalar_fory_type {
    ($($ty: ty),* $(,)?) => {
        $(
            impl ForyType for $ty {
                fn type_ref() -> TypeRef {
                    TypeRef::scalar::<Self>()
                }
            }
        )*
    };
}

scalar_fory_type! {
    bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, str, serde_bytes::ByteBuf,
}

impl<T: ForyType> ForyType for Option<T> {
    const NULLABLE: bool = true;

    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn is_null(&self) -> bool {
        self.is_none()
    }
}

impl<T: ForyType> ForyType for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::with_shape::<Self>(TypeShape::List(Box::new(T::field_ref())))
    }
}

impl<T: ForyType> ForyType for HashSet<T> {
    fn type_ref() -> TypeRef {
        TypeRef::with_shape::<Self>(TypeShape::Set(Box::new(T::field_ref())))
    }
}

impl<T: ForyType> ForyType for BTreeSet<T> {
    fn type_ref() -> TypeRef {
        TypeRef::with_shape::<Self>(TypeShape::Set(Box::new(T::field_ref())))
    }
}

impl<K: ForyType, V: ForyType> ForyType for HashMap<K, V> {
    fn type_ref() -> TypeRef {
        TypeRef::with_shape::<Self>(TypeShape::Map(
            Box::new(K::field_ref()),
            Box::new(V::field_ref()),
        ))
    }
}

impl<K: ForyType, V: ForyType> ForyType for BTreeMap<K, V> {
    fn type_ref() -> TypeRef {
        TypeRef::with_shape::<Self>(TypeShape::Map(
            Box::new(K::field_ref()),
            Box::new(V::field_ref()),
        ))
    }
}

impl<T: ForyType + ?Sized> ForyType for Box<T> {
    const NULLABLE: bool = T::NULLABLE;

    fn type_ref() -> TypeRef {
        T::type_ref()
    }
}

impl<T: ForyType + ?Sized> ForyType for &'static T {
    const NULLABLE: bool = T::NULLABLE;

    fn type_ref() -> TypeRef {
        T::type_ref()
    }
}

/// Implement [ForyType] for user types that register as struct, enum or ext.
///
/// ```ignore
/// fory_type!(Person, Color);
/// ```
#[macro_export]
macro_rules! fory_type {
    ($($ty: ty),* $(,)?) => {
        $(
            impl $crate::ForyType for $ty {
                fn type_ref() -> $crate::TypeRef {
                    $crate::TypeRef::scalar::<Self>()
                }
            }
        )*
    };
}

/// A field of a registered struct, listed in serialization order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub field: FieldRef,
    /// Write a trackable reference flag for this field.
    pub ref_tracking: bool,
}

impl FieldDescriptor {
    /// Describe a field of Rust type `T`; nullability follows `Option`.
    pub fn of<T: ForyType + ?Sized>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: FieldRef {
                type_ref: T::type_ref(),
                nullable: T::NULLABLE,
            },
            ref_tracking: false,
        }
    }

    pub fn tracked(mut self) -> Self {
        self.ref_tracking = true;
        self
    }

    pub fn nullable(&self) -> bool {
        self.field.nullable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        let list = <Vec<Option<i32>>>::type_ref();
        match list.shape {
            TypeShape::List(element) => {
                assert!(element.nullable);
                assert_eq!(element.type_ref.rust_type, TypeId::of::<i32>());
            }
            other => panic!("unexpected shape {:?}", other),
        }

        let map = <HashMap<String, Vec<u8>>>::type_ref();
        assert!(matches!(map.shape, TypeShape::Map(..)));
        assert_eq!(map.rust_type, TypeId::of::<HashMap<String, Vec<u8>>>());
    }

    #[test]
    fn test_descriptor_nullability() {
        assert!(FieldDescriptor::of::<Option<String>>("nick").nullable());
        assert!(!FieldDescriptor::of::<String>("name").nullable());
        assert!(FieldDescriptor::of::<u32>("id").tracked().ref_tracking);
        assert_eq!(
            <Option<u64>>::type_ref(),
            <u64>::type_ref(),
        );
    }
}
