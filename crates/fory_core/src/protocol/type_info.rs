//! The type info stage: a wire type id plus, for some kinds, a schema or name reference.

use std::sync::Arc;

use crate::{
    config::ForyConfig,
    error::{ForyError, Result},
    meta::TypeMeta,
    meta_string::{NAMESPACE_FACTORY, TYPE_NAME_FACTORY},
    types::{
        kind_of, ExtSkipFn, KnownTypeId, Registration, SpecKind, TypeSpecification,
        TypeSpecificationRegistry,
    },
    varint::{read_varuint32, write_varuint32},
    viewer::ByteViewer,
};

use super::context::{ReadContext, WriteContext};

/// What a reader knows about the value that follows the type info.
#[derive(Debug, Clone)]
pub(crate) enum Resolved {
    Known(KnownTypeId),
    /// Struct fields in the writer's order.
    Struct(Arc<TypeMeta>),
    Enum,
    /// Skip function of the local registration, if any.
    Ext(Option<ExtSkipFn>),
}

/// Whether the type info of `kind` carries a meta reference.
fn uses_meta_ref(kind: KnownTypeId, compatible: bool) -> bool {
    kind.is_compatible_struct() || (compatible && kind.is_named_kind())
}

pub(crate) fn write_type_info(
    ctx: &mut WriteContext,
    registry: &TypeSpecificationRegistry,
    spec: &TypeSpecification,
    compatible: bool,
) -> Result<()> {
    let WriteContext {
        buffer,
        metas,
        meta_strings,
    } = ctx;

    write_varuint32(buffer, spec.type_id(compatible));

    let kind = spec.wire_kind(compatible);
    if uses_meta_ref(kind, compatible) {
        let entry = metas.register(spec, registry)?;
        write_varuint32(buffer, entry.encode_reference());
    } else if let Some(Registration::Name {
        namespace,
        type_name,
    }) = spec.registration()
    {
        meta_strings.write(buffer, &NAMESPACE_FACTORY, namespace)?;
        meta_strings.write(buffer, &TYPE_NAME_FACTORY, type_name)?;
    }

    Ok(())
}

/// Read a type info and resolve it against the message's schemas and the local registry.
pub(crate) fn read_type_info(
    viewer: &mut ByteViewer<'_>,
    ctx: &mut ReadContext,
    registry: &TypeSpecificationRegistry,
    config: &ForyConfig,
) -> Result<Resolved> {
    let type_id = read_varuint32(viewer)?;
    let kind = kind_of(type_id)?;

    if !kind.is_supported_payload() {
        return Err(ForyError::unsupported(format!("{:?} payloads", kind)));
    }
    if !kind.is_user_kind() {
        return Ok(Resolved::Known(kind));
    }

    if uses_meta_ref(kind, config.compatible) {
        let reference = read_varuint32(viewer)? as usize;
        if reference & 1 == 0 {
            return Err(ForyError::protocol("inline type meta is not supported"));
        }
        let meta = (reference >> 1)
            .checked_sub(1)
            .and_then(|index| ctx.metas.get(index))
            .cloned()
            .ok_or_else(|| {
                ForyError::protocol(format!("type meta reference {} out of range", reference))
            })?;
        return from_meta(kind, meta, registry);
    }

    let spec = match kind.is_named_kind() {
        true => {
            let namespace = ctx.meta_strings.read(viewer, &NAMESPACE_FACTORY)?;
            let type_name = ctx.meta_strings.read(viewer, &TYPE_NAME_FACTORY)?;
            registry.get_by_name(&namespace, &type_name)?
        }
        false => registry.get_by_id(type_id)?,
    };
    from_spec(kind, spec, ctx, registry)
}

fn from_meta(
    kind: KnownTypeId,
    meta: Arc<TypeMeta>,
    registry: &TypeSpecificationRegistry,
) -> Result<Resolved> {
    if kind.is_struct_kind() {
        return Ok(Resolved::Struct(meta));
    }
    if kind.is_enum_kind() {
        return Ok(Resolved::Enum);
    }

    let local = match meta.registered_by_name {
        true => registry.get_by_name(&meta.namespace, &meta.type_name).ok(),
        false => registry.get_by_id(meta.type_id).ok(),
    };
    Ok(Resolved::Ext(local.and_then(skip_fn)))
}

fn from_spec(
    kind: KnownTypeId,
    spec: &TypeSpecification,
    ctx: &mut ReadContext,
    registry: &TypeSpecificationRegistry,
) -> Result<Resolved> {
    match spec.kind() {
        SpecKind::Struct { .. } if kind.is_struct_kind() => {
            Ok(Resolved::Struct(ctx.local_meta(spec, registry)?))
        }
        SpecKind::Enum { .. } if kind.is_enum_kind() => Ok(Resolved::Enum),
        SpecKind::Ext { skip, .. } if kind.is_ext_kind() => Ok(Resolved::Ext(Some(*skip))),
        _ => Err(ForyError::mismatch(format!(
            "`{}` is registered locally, but the message carries a {:?}",
            spec.type_name(),
            kind
        ))),
    }
}

fn skip_fn(spec: &TypeSpecification) -> Option<ExtSkipFn> {
    match spec.kind() {
        SpecKind::Ext { skip, .. } => Some(*skip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldDescriptor;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Point {
        x: i32,
    }

    #[derive(Serialize, Deserialize)]
    enum Shade {
        Dark,
    }

    crate::fory_type!(Point, Shade);

    fn registry() -> TypeSpecificationRegistry {
        let mut registry = TypeSpecificationRegistry::default();
        registry
            .register_struct_by_name::<Point>("geo", "Point", vec![FieldDescriptor::of::<i32>("x")])
            .unwrap();
        registry.register_enum::<Shade>(9).unwrap();
        registry
    }

    #[test]
    fn test_named_struct_round_trip() {
        let registry = registry();
        let spec = registry.get_by_type::<Point>().unwrap();

        for compatible in [false, true] {
            let config = ForyConfig::default().compatible(compatible);
            let mut writer = WriteContext::default();
            write_type_info(&mut writer, &registry, spec, compatible).unwrap();
            write_type_info(&mut writer, &registry, spec, compatible).unwrap();

            let mut reader = ReadContext::default();
            if compatible {
                assert_eq!(writer.metas.len(), 1);
                let blob = &writer.metas.blobs()[0];
                reader.push_meta(
                    crate::meta::decode_type_meta(&mut ByteViewer::from_slice(blob)).unwrap(),
                );
            }

            let bytes = writer.buffer.to_vec();
            let mut viewer = ByteViewer::from_slice(&bytes);
            for _ in 0..2 {
                match read_type_info(&mut viewer, &mut reader, &registry, &config).unwrap() {
                    Resolved::Struct(meta) => assert_eq!(meta.type_name, "Point"),
                    other => panic!("unexpected {:?}", other),
                }
            }
            assert!(viewer.is_end());
        }
    }

    #[test]
    fn test_id_enum_and_known() {
        let registry = registry();
        let spec = registry.get_by_type::<Shade>().unwrap();
        let mut writer = WriteContext::default();
        write_type_info(&mut writer, &registry, spec, false).unwrap();
        write_varuint32(&mut writer.buffer, KnownTypeId::Int64.id());
        write_varuint32(&mut writer.buffer, KnownTypeId::Tensor.id());

        let bytes = writer.buffer.to_vec();
        let mut viewer = ByteViewer::from_slice(&bytes);
        let mut reader = ReadContext::default();
        let config = ForyConfig::default();

        assert!(matches!(
            read_type_info(&mut viewer, &mut reader, &registry, &config).unwrap(),
            Resolved::Enum
        ));
        assert!(matches!(
            read_type_info(&mut viewer, &mut reader, &registry, &config).unwrap(),
            Resolved::Known(KnownTypeId::Int64)
        ));
        assert!(matches!(
            read_type_info(&mut viewer, &mut reader, &registry, &config),
            Err(ForyError::Unsupported(_))
        ));
    }

    #[test]
    fn test_kind_disagreement() {
        let registry = registry();
        // id 9 is an enum locally, the message claims a struct
        let mut bytes = Vec::new();
        write_varuint32(&mut bytes, (9 << 8) | KnownTypeId::Struct.id());

        assert!(matches!(
            read_type_info(
                &mut ByteViewer::from_slice(&bytes),
                &mut ReadContext::default(),
                &registry,
                &ForyConfig::default()
            ),
            Err(ForyError::TypeMismatch(_))
        ));
    }
}
