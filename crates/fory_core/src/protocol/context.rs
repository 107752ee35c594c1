//! Caller-owned, reusable per-call state.
//!
//! A context must not be shared between messages in flight: its dedup indices are
//! only meaningful within one message. Each call resets the context it is handed.

use std::{any::TypeId, collections::HashMap, sync::Arc};

use bytes::BytesMut;

use crate::{
    error::{ForyError, Result},
    meta::{FieldTypeMeta, MetaStringTable, TypeMeta, TypeMetaRegistry, TypeMetaStringRegistry},
    types::{TypeSpecification, TypeSpecificationRegistry},
};

use super::type_info::Resolved;

/// Writer state: the working buffer and the session dedup registries.
#[derive(Debug, Default)]
pub struct WriteContext {
    pub(crate) buffer: BytesMut,
    pub(crate) metas: TypeMetaRegistry,
    pub(crate) meta_strings: TypeMetaStringRegistry,
}

impl WriteContext {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.metas.clear();
        self.meta_strings.clear();
    }

    /// Schemas queued by the last message.
    pub fn type_metas(&self) -> &TypeMetaRegistry {
        &self.metas
    }
}

/// A value recorded under [super::RefFlag::RefValue], replayed by later back-references.
#[derive(Debug, Clone)]
pub(crate) struct RefEntry {
    /// Start of the payload within the data section.
    pub position: usize,
    pub ty: FieldTypeMeta,
    pub resolved: Resolved,
}

/// Reader state: schemas of the message, meta strings and the reference table.
#[derive(Debug, Default)]
pub struct ReadContext {
    pub(crate) metas: Vec<Arc<TypeMeta>>,
    pub(crate) meta_strings: MetaStringTable,
    pub(crate) refs: Vec<RefEntry>,
    /// Schemas derived from the local specifications of the engine of the current call.
    local: HashMap<TypeId, Arc<TypeMeta>>,
}

impl ReadContext {
    pub fn reset(&mut self) {
        self.metas.clear();
        self.meta_strings.clear();
        self.refs.clear();
        // the next call may come from an engine with different registrations
        self.local.clear();
    }

    /// Schemas read from the meta section of the last message.
    pub fn type_metas(&self) -> impl Iterator<Item = &TypeMeta> {
        self.metas.iter().map(|meta| meta.as_ref())
    }

    pub(crate) fn push_meta(&mut self, meta: TypeMeta) {
        log::debug!("type meta #{}: {}", self.metas.len(), meta.display_name());
        self.metas.push(Arc::new(meta));
    }

    pub(crate) fn reference(&self, id: u32) -> Result<RefEntry> {
        self.refs
            .get(id as usize)
            .cloned()
            .ok_or_else(|| ForyError::protocol(format!("reference {} was never recorded", id)))
    }

    /// Schema of a locally registered struct, as a non-compatible writer lays it out.
    pub(crate) fn local_meta(
        &mut self,
        spec: &TypeSpecification,
        registry: &TypeSpecificationRegistry,
    ) -> Result<Arc<TypeMeta>> {
        let rust_type = spec
            .rust_type()
            .ok_or_else(|| ForyError::mismatch(format!("`{}` is a builtin", spec.type_name())))?;

        if let Some(meta) = self.local.get(&rust_type) {
            return Ok(meta.clone());
        }

        let meta = Arc::new(TypeMeta::from_spec(spec, registry, false)?);
        self.local.insert(rust_type, meta.clone());
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_capacity() {
        let mut ctx = WriteContext::with_capacity(64);
        ctx.buffer.extend_from_slice(&[1, 2, 3]);
        ctx.reset();

        assert!(ctx.buffer.is_empty());
        assert!(ctx.buffer.capacity() >= 64);
        assert!(ctx.type_metas().is_empty());
    }

    #[test]
    fn test_missing_reference() {
        let ctx = ReadContext::default();
        assert!(matches!(ctx.reference(0), Err(ForyError::Protocol(_))));
    }
}
