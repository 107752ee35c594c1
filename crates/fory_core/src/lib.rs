//! Core of the fory serialization engine: wire codecs, type metadata and the message protocol.

pub mod config;
pub mod error;
pub mod fsm;
pub mod hash;
pub mod meta;
pub mod meta_string;
pub mod protocol;
pub mod ser_de;
pub mod types;
pub mod varint;
pub mod viewer;

pub use config::{defaults, ForyConfig};
pub use error::{ForyError, Result};
pub use meta::{FieldMeta, FieldTypeMeta, TypeMeta};
pub use protocol::{
    Fory, HeaderInfo, Language, Message, MessageLayout, ReadContext, RefFlag, RefMode,
    WriteContext,
};
pub use types::{
    FieldDescriptor, FieldRef, ForyType, KnownTypeId, TypeRef, TypeShape, TypeSpecification,
    TypeSpecificationRegistry,
};
