//! Type meta encoding.

use bytes::BufMut;

use crate::{
    config::defaults::META_HASH_SEED,
    error::{ForyError, Result},
    hash::murmurhash3_x64_128_seeded,
    meta_string::{MetaStringFactory, FIELD_NAME_FACTORY, NAMESPACE_FACTORY, TYPE_NAME_FACTORY},
    varint::write_varuint32,
};

use super::{
    FieldMeta, FieldTypeMeta, TypeMeta, BIG_NAME_THRESHOLD, FIELD_NAME_SIZE_THRESHOLD,
    HAS_FIELDS_FLAG, HASH_SHIFT, META_SIZE_MASK, REGISTER_BY_NAME_FLAG, SMALL_FIELD_COUNT,
};

/// Fingerprint bits of the global header for a blob body. The low [HASH_SHIFT] bits are zero.
pub(crate) fn fingerprint(body: &[u8]) -> u64 {
    let (h1, _) = murmurhash3_x64_128_seeded(body, META_HASH_SEED);
    ((h1 as i64) << HASH_SHIFT).wrapping_abs() as u64
}

/// Encode a complete blob, global header included.
pub fn encode_type_meta(meta: &TypeMeta) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    write_meta_header(&mut body, meta);
    match meta.registered_by_name {
        true => {
            write_name(&mut body, &NAMESPACE_FACTORY, &meta.namespace)?;
            write_name(&mut body, &TYPE_NAME_FACTORY, &meta.type_name)?;
        }
        false => write_varuint32(&mut body, meta.type_id),
    }
    for field in &meta.fields {
        write_field(&mut body, field)?;
    }

    let size = body.len() as u64;
    let mut header = fingerprint(&body);
    if !meta.fields.is_empty() {
        header |= HAS_FIELDS_FLAG;
    }
    header |= size.min(META_SIZE_MASK);

    let mut out = Vec::with_capacity(body.len() + 13);
    out.put_u64_le(header);
    if size >= META_SIZE_MASK {
        write_varuint32(&mut out, (size - META_SIZE_MASK) as u32);
    }
    out.extend_from_slice(&body);

    log::trace!(
        "encoded type meta {} ({} bytes)",
        meta.display_name(),
        out.len()
    );
    Ok(out)
}

fn write_meta_header<B: BufMut>(buf: &mut B, meta: &TypeMeta) {
    let count = meta.fields.len();
    let mut header = count.min(SMALL_FIELD_COUNT) as u8;
    if meta.registered_by_name {
        header |= REGISTER_BY_NAME_FLAG;
    }

    buf.put_u8(header);
    if count >= SMALL_FIELD_COUNT {
        write_varuint32(buf, (count - SMALL_FIELD_COUNT) as u32);
    }
}

/// `[len << 2 | flag][continuation?][bytes]`
fn write_name<B: BufMut>(buf: &mut B, factory: &MetaStringFactory, value: &str) -> Result<()> {
    let encoded = factory.encode(value)?;
    let len = encoded.bytes.len();
    let flag = encoded.encoding.flag();

    match len >= BIG_NAME_THRESHOLD {
        true => {
            buf.put_u8((BIG_NAME_THRESHOLD as u8) << 2 | flag);
            write_varuint32(buf, (len - BIG_NAME_THRESHOLD) as u32);
        }
        false => buf.put_u8((len as u8) << 2 | flag),
    }
    buf.put_slice(&encoded.bytes);
    Ok(())
}

/// `[flag:2][len-1:4][nullable:1][ref:1][continuation?][type][name bytes]`
fn write_field<B: BufMut>(buf: &mut B, field: &FieldMeta) -> Result<()> {
    let encoded = FIELD_NAME_FACTORY.encode(&field.name)?;
    let size = encoded
        .bytes
        .len()
        .checked_sub(1)
        .ok_or_else(|| ForyError::mismatch("field names cannot be empty"))?;

    let mut header = encoded.encoding.flag() << 6;
    header |= (size.min(FIELD_NAME_SIZE_THRESHOLD) as u8) << 2;
    if field.nullable {
        header |= 0b10;
    }
    if field.ref_tracking {
        header |= 0b01;
    }

    buf.put_u8(header);
    if size >= FIELD_NAME_SIZE_THRESHOLD {
        write_varuint32(buf, (size - FIELD_NAME_SIZE_THRESHOLD) as u32);
    }

    write_varuint32(buf, field.field_type.type_id);
    write_generics(buf, &field.field_type)?;

    buf.put_slice(&encoded.bytes);
    Ok(())
}

fn write_generics<B: BufMut>(buf: &mut B, field_type: &FieldTypeMeta) -> Result<()> {
    let arity = FieldTypeMeta::arity(field_type.kind()?);
    if field_type.generics.len() != arity {
        return Err(ForyError::mismatch(format!(
            "type {} expects {} type argument(s), found {}",
            field_type.type_id,
            arity,
            field_type.generics.len()
        )));
    }

    for nested in &field_type.generics {
        let value = (nested.type_id as u64) << 2
            | (nested.nullable as u64) << 1
            | nested.ref_tracking as u64;
        let value = u32::try_from(value).map_err(|_| ForyError::Range { value, bits: 32 })?;

        write_varuint32(buf, value);
        write_generics(buf, nested)?;
    }
    Ok(())
}
