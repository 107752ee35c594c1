//! Serialization and deserialization of the data stage
//!
//! Values cross the wire through serde. Registered structs, enums and collections are
//! laid out by their specifications; ext types use their own serde impls.

mod consts;
mod de;
mod ext;
mod ser;

use serde::{Deserialize, Serialize};

use crate::{
    config::ForyConfig,
    error::Result,
    meta::FieldTypeMeta,
    protocol::{type_info::Resolved, ReadContext, WriteContext},
    types::{FieldRef, TypeSpecificationRegistry},
    viewer::ByteViewer,
};

pub use ext::skip_ext;

use self::{de::DataDeserializer, ser::DataSerializer, ser::Slot};

/// Serialize the data stage of a top-level value into the context buffer
pub(crate) fn write_value<T: Serialize + ?Sized>(
    value: &T,
    field: &FieldRef,
    ctx: &mut WriteContext,
    registry: &TypeSpecificationRegistry,
    config: ForyConfig,
) -> Result<()> {
    let mut serializer = DataSerializer::new(ctx, registry, config, Slot::root(field));

    value.serialize(&mut serializer)?;

    serializer.finish()
}

/// Deserialize the data stage of a top-level value, consuming `input` to its end
pub(crate) fn read_value<'de, T: Deserialize<'de>>(
    input: ByteViewer<'de>,
    ty: FieldTypeMeta,
    resolved: Resolved,
    ctx: &mut ReadContext,
    registry: &TypeSpecificationRegistry,
    config: ForyConfig,
) -> Result<T> {
    let mut deserializer = DataDeserializer::new(input, ctx, registry, config, ty, resolved);

    let value = T::deserialize(&mut deserializer)?;
    deserializer.finish()?;

    Ok(value)
}
