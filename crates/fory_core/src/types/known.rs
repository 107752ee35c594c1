//! Builtin type ids shared by every language runtime.
//!
//! These numbers are the interoperability contract and must never be renumbered.

use crate::error::{ForyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum KnownTypeId {
    Boolean = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    VarInt32 = 5,
    Int64 = 6,
    VarInt64 = 7,
    SliInt64 = 8,
    Float16 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    Enum = 13,
    NamedEnum = 14,
    Struct = 15,
    CompatibleStruct = 16,
    NamedStruct = 17,
    NamedCompatibleStruct = 18,
    Ext = 19,
    NamedExt = 20,
    List = 21,
    Set = 22,
    Map = 23,
    Duration = 24,
    Timestamp = 25,
    LocalDate = 26,
    Decimal = 27,
    Binary = 28,
    Array = 29,
    BoolArray = 30,
    Int8Array = 31,
    Int16Array = 32,
    Int32Array = 33,
    Int64Array = 34,
    Float16Array = 35,
    Float32Array = 36,
    Float64Array = 37,
    Tensor = 38,
    ArrowRecordBatch = 39,
    ArrowTable = 40,
    UInt8 = 64,
    UInt16 = 65,
    UInt32 = 66,
    UInt64 = 68,
}

impl KnownTypeId {
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Look up the structural kind byte of a wire id.
    pub fn from_id(id: u32) -> Result<Self> {
        use KnownTypeId::*;

        const TABLE: [KnownTypeId; 40] = [
            Boolean,
            Int8,
            Int16,
            Int32,
            VarInt32,
            Int64,
            VarInt64,
            SliInt64,
            Float16,
            Float32,
            Float64,
            String,
            Enum,
            NamedEnum,
            Struct,
            CompatibleStruct,
            NamedStruct,
            NamedCompatibleStruct,
            Ext,
            NamedExt,
            List,
            Set,
            Map,
            Duration,
            Timestamp,
            LocalDate,
            Decimal,
            Binary,
            Array,
            BoolArray,
            Int8Array,
            Int16Array,
            Int32Array,
            Int64Array,
            Float16Array,
            Float32Array,
            Float64Array,
            Tensor,
            ArrowRecordBatch,
            ArrowTable,
        ];

        match id {
            1..=40 => Ok(TABLE[id as usize - 1]),
            64 => Ok(UInt8),
            65 => Ok(UInt16),
            66 => Ok(UInt32),
            68 => Ok(UInt64),
            _ => Err(ForyError::mismatch(format!("unknown type id {}", id))),
        }
    }

    /// Kind of a user-defined type: struct, enum or ext in any registration mode.
    pub fn is_user_kind(self) -> bool {
        use KnownTypeId::*;
        matches!(
            self,
            Enum | NamedEnum
                | Struct
                | CompatibleStruct
                | NamedStruct
                | NamedCompatibleStruct
                | Ext
                | NamedExt
        )
    }

    pub fn is_struct_kind(self) -> bool {
        use KnownTypeId::*;
        matches!(
            self,
            Struct | CompatibleStruct | NamedStruct | NamedCompatibleStruct
        )
    }

    pub fn is_enum_kind(self) -> bool {
        matches!(self, Self::Enum | Self::NamedEnum)
    }

    pub fn is_ext_kind(self) -> bool {
        matches!(self, Self::Ext | Self::NamedExt)
    }

    /// Kinds whose type info carries a namespace and type name.
    pub fn is_named_kind(self) -> bool {
        use KnownTypeId::*;
        matches!(
            self,
            NamedEnum | NamedStruct | NamedCompatibleStruct | NamedExt
        )
    }

    /// Kinds whose schema travels in the meta section.
    pub fn is_compatible_struct(self) -> bool {
        matches!(self, Self::CompatibleStruct | Self::NamedCompatibleStruct)
    }

    /// Whether the data stage can decode values of this kind.
    pub fn is_supported_payload(self) -> bool {
        use KnownTypeId::*;
        !matches!(
            self,
            Decimal
                | Array
                | BoolArray
                | Int8Array
                | Int16Array
                | Int32Array
                | Int64Array
                | Float16Array
                | Float32Array
                | Float64Array
                | Tensor
                | ArrowRecordBatch
                | ArrowTable
        )
    }
}

/// Recover the structural kind byte regardless of the shifted user id.
pub fn extract_known_type(type_id: u32) -> u32 {
    type_id & 0xff
}

/// Structural kind of a wire type id.
pub fn kind_of(type_id: u32) -> Result<KnownTypeId> {
    KnownTypeId::from_id(extract_known_type(type_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_stable() {
        assert_eq!(KnownTypeId::Boolean.id(), 1);
        assert_eq!(KnownTypeId::String.id(), 12);
        assert_eq!(KnownTypeId::NamedCompatibleStruct.id(), 18);
        assert_eq!(KnownTypeId::Binary.id(), 28);
        assert_eq!(KnownTypeId::ArrowTable.id(), 40);
        assert_eq!(KnownTypeId::UInt32.id(), 66);
        assert_eq!(KnownTypeId::UInt64.id(), 68);

        for id in (1..=40).chain([64, 65, 66, 68]) {
            assert_eq!(KnownTypeId::from_id(id).unwrap().id(), id);
        }
        assert!(KnownTypeId::from_id(0).is_err());
        assert!(KnownTypeId::from_id(67).is_err());
    }

    #[test]
    fn test_extract_known_type() {
        let id = (300 << 8) | KnownTypeId::CompatibleStruct.id();
        assert_eq!(extract_known_type(id), 16);
        assert_eq!(kind_of(id).unwrap(), KnownTypeId::CompatibleStruct);
        assert!(kind_of(id).unwrap().is_user_kind());
        assert!(!KnownTypeId::List.is_user_kind());
    }
}
