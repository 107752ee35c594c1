//! Type meta decoding.

use tokio::io::AsyncRead;

use crate::{
    error::{ForyError, Result},
    meta_string::{
        MetaStringEncoding, MetaStringFactory, FIELD_NAME_FACTORY, NAMESPACE_FACTORY,
        TYPE_NAME_FACTORY,
    },
    varint::{read_exact, read_varuint32, read_varuint32_async, write_varuint32},
    viewer::ByteViewer,
};

use super::{
    encoder::fingerprint, FieldMeta, FieldTypeMeta, TypeMeta, BIG_NAME_THRESHOLD,
    FIELD_NAME_SIZE_THRESHOLD, HASH_SHIFT, META_SIZE_MASK, REGISTER_BY_NAME_FLAG,
    SMALL_FIELD_COUNT,
};

/// Decode one blob and verify its fingerprint.
pub fn decode_type_meta(viewer: &mut ByteViewer<'_>) -> Result<TypeMeta> {
    let header = viewer.read_u64_le()?;
    let mut size = (header & META_SIZE_MASK) as usize;
    if size == META_SIZE_MASK as usize {
        size += read_varuint32(viewer)? as usize;
    }

    let body = viewer.next_bytes(size)?;
    let expected = header >> HASH_SHIFT;
    let actual = fingerprint(body) >> HASH_SHIFT;
    if expected != actual {
        return Err(ForyError::MetaHashMismatch { expected, actual });
    }

    let mut body = ByteViewer::from_slice(body);
    let meta = read_body(&mut body)?;
    if !body.is_end() {
        return Err(ForyError::protocol(format!(
            "{} trailing byte(s) after type meta {}",
            body.distance_to_end(),
            meta.display_name()
        )));
    }

    log::trace!("decoded type meta {}", meta.display_name());
    Ok(meta)
}

/// Read one blob from a stream. Only the bytes of that blob are consumed.
pub async fn read_type_meta_async<R: AsyncRead + Unpin>(source: &mut R) -> Result<TypeMeta> {
    let mut raw = vec![0_u8; 8];
    read_exact(source, &mut raw).await?;

    let mut header = [0_u8; 8];
    header.copy_from_slice(&raw);
    let mut size = (u64::from_le_bytes(header) & META_SIZE_MASK) as usize;
    if size == META_SIZE_MASK as usize {
        let extra = read_varuint32_async(source).await?;
        write_varuint32(&mut raw, extra);
        size += extra as usize;
    }

    let start = raw.len();
    raw.resize(start + size, 0);
    read_exact(source, &mut raw[start..]).await?;

    decode_type_meta(&mut ByteViewer::from_slice(&raw))
}

fn read_body(viewer: &mut ByteViewer<'_>) -> Result<TypeMeta> {
    let header = viewer.next_byte()?;
    let mut count = (header as usize) & SMALL_FIELD_COUNT;
    if count == SMALL_FIELD_COUNT {
        count += read_varuint32(viewer)? as usize;
    }
    let registered_by_name = header & REGISTER_BY_NAME_FLAG != 0;

    let (type_id, namespace, type_name) = match registered_by_name {
        true => (
            0,
            read_name(viewer, &NAMESPACE_FACTORY)?,
            read_name(viewer, &TYPE_NAME_FACTORY)?,
        ),
        false => (read_varuint32(viewer)?, String::new(), String::new()),
    };

    // each field takes at least two bytes
    let mut fields = Vec::with_capacity(count.min(viewer.distance_to_end() / 2));
    for _ in 0..count {
        fields.push(read_field(viewer)?);
    }

    Ok(TypeMeta {
        registered_by_name,
        type_id,
        namespace,
        type_name,
        fields,
    })
}

fn read_name(viewer: &mut ByteViewer<'_>, factory: &MetaStringFactory) -> Result<String> {
    let header = viewer.next_byte()?;
    let encoding = MetaStringEncoding::from_flag(header & 0b11)?;
    let mut len = (header >> 2) as usize;
    if len == BIG_NAME_THRESHOLD {
        len += read_varuint32(viewer)? as usize;
    }

    factory.decode(encoding, viewer.next_bytes(len)?)
}

fn read_field(viewer: &mut ByteViewer<'_>) -> Result<FieldMeta> {
    let header = viewer.next_byte()?;
    let encoding = MetaStringEncoding::from_flag(header >> 6)?;
    let mut size = ((header >> 2) & 0b1111) as usize;
    if size == FIELD_NAME_SIZE_THRESHOLD {
        size += read_varuint32(viewer)? as usize;
    }
    let nullable = header & 0b10 != 0;
    let ref_tracking = header & 0b01 != 0;

    let mut field_type = FieldTypeMeta {
        type_id: read_varuint32(viewer)?,
        nullable,
        ref_tracking,
        generics: vec![],
    };
    read_generics(viewer, &mut field_type)?;

    let name = FIELD_NAME_FACTORY.decode(encoding, viewer.next_bytes(size + 1)?)?;

    Ok(FieldMeta {
        name,
        nullable,
        ref_tracking,
        field_type,
    })
}

fn read_generics(viewer: &mut ByteViewer<'_>, field_type: &mut FieldTypeMeta) -> Result<()> {
    for _ in 0..FieldTypeMeta::arity(field_type.kind()?) {
        let value = read_varuint32(viewer)?;
        let mut nested = FieldTypeMeta {
            type_id: value >> 2,
            nullable: value & 0b10 != 0,
            ref_tracking: value & 0b01 != 0,
            generics: vec![],
        };
        read_generics(viewer, &mut nested)?;
        field_type.generics.push(nested);
    }
    Ok(())
}
