//! Message protocol
//!
//! Every message passes through the same stages:
//!
//! ```text
//! [header][offset placeholder, compatible only][ref flag][type info][data][meta section, compatible only]
//! ```
//!
//! [Fory] drives a [Stage] machine through them for both directions.

pub(crate) mod context;
mod header;
mod message;
mod reference;
pub(crate) mod type_info;

use bytes::BufMut;
use futures::executor::block_on;
use serde::{
    de::{DeserializeOwned, IntoDeserializer},
    Serialize,
};
use tokio::io::{AsyncBufRead, AsyncReadExt};

use crate::{
    config::ForyConfig,
    error::{ForyError, Result},
    fsm::{state_transitions, TransitableState},
    meta::{read_type_meta_async, FieldTypeMeta, TypeMeta},
    ser_de::{read_value, write_value},
    types::{FieldDescriptor, ForyType, TypeSpecificationRegistry},
    varint::{read_exact, read_varuint32, read_varuint32_async},
    viewer::ByteViewer,
};

pub use context::{ReadContext, WriteContext};
pub(crate) use context::RefEntry;
pub use header::{
    HeaderInfo, Language, IS_LITTLE_ENDIAN_FLAG, IS_NULL_FLAG, IS_OOB_FLAG, IS_XLANG_FLAG,
};
pub use message::Message;
pub use reference::{RefFlag, RefMode};

use self::type_info::{read_type_info, write_type_info};

/// Position of a message within its stage sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum Stage {
    #[default]
    Header,
    Reference,
    TypeInfo,
    Data,
    Complete,
}

/// Stage transition events
#[derive(Debug, Clone, Copy)]
pub enum StageEvent {
    HeaderDone,
    /// The header marks the whole message null.
    NullHeader,
    RefDone,
    /// A null flag ends the message.
    RefShortCircuit,
    TypeInfoDone,
    DataDone,
}

state_transitions! {
    type State = Stage;
    type Event = StageEvent;

    Header + HeaderDone => Reference;
    Header + NullHeader => Complete;
    Reference + RefDone => TypeInfo;
    Reference + RefShortCircuit => Complete;
    TypeInfo + TypeInfoDone => Data;
    Data + DataDone => Complete;
}

impl Stage {
    /// Ingest `event`, failing if it does not move the message forward.
    pub fn advance(&mut self, event: StageEvent) -> Result<()> {
        let before = *self;
        self.ingest(event);

        if *self == before {
            return Err(ForyError::protocol(format!(
                "{:?} is not valid in the {:?} stage",
                event, before
            )));
        }
        log::debug!("stage {:?} -> {:?}", before, self);
        Ok(())
    }
}

/// Top-level structure of a message, as reported by [Fory::inspect_from].
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLayout {
    pub header: HeaderInfo,
    /// Patched offset of a compatible message.
    pub meta_offset: Option<u32>,
    /// Absent when the header is null or the ref mode writes no flag.
    pub ref_flag: Option<RefFlag>,
    pub type_id: Option<u32>,
    /// Bytes between the end of the header (or offset) and the meta section.
    pub body_len: usize,
    pub metas: Vec<TypeMeta>,
}

/// One message read off a source, before its data is decoded.
struct Frame {
    offset: Option<u32>,
    body: Vec<u8>,
}

/// The serialization engine: a configuration plus the shared type registry.
///
/// Registration needs `&mut self`; serializing and deserializing only read the
/// engine, so one instance serves any number of concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct Fory {
    config: ForyConfig,
    registry: TypeSpecificationRegistry,
}

impl Fory {
    pub fn new(config: ForyConfig) -> Self {
        Self {
            config,
            registry: TypeSpecificationRegistry::default(),
        }
    }

    pub fn config(&self) -> &ForyConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeSpecificationRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeSpecificationRegistry {
        &mut self.registry
    }

    pub fn register_struct<T: ForyType>(&mut self, id: u32, fields: Vec<FieldDescriptor>) -> Result<()> {
        self.registry.register_struct::<T>(id, fields)
    }

    pub fn register_struct_by_name<T: ForyType>(
        &mut self,
        namespace: &str,
        type_name: &str,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        self.registry
            .register_struct_by_name::<T>(namespace, type_name, fields)
    }

    pub fn register_struct_by_type_name<T: ForyType>(
        &mut self,
        include_namespace: bool,
        fields: Vec<FieldDescriptor>,
    ) -> Result<()> {
        self.registry
            .register_struct_by_type_name::<T>(include_namespace, fields)
    }

    pub fn register_enum<T: ForyType>(&mut self, id: u32) -> Result<()> {
        self.registry.register_enum::<T>(id)
    }

    pub fn register_enum_by_name<T: ForyType>(&mut self, namespace: &str, type_name: &str) -> Result<()> {
        self.registry.register_enum_by_name::<T>(namespace, type_name)
    }

    pub fn register_ext<T: ForyType + DeserializeOwned>(&mut self, id: u32) -> Result<()> {
        self.registry.register_ext::<T>(id)
    }

    pub fn register_ext_by_name<T: ForyType + DeserializeOwned>(
        &mut self,
        namespace: &str,
        type_name: &str,
    ) -> Result<()> {
        self.registry.register_ext_by_name::<T>(namespace, type_name)
    }

    pub fn track_references<T: ForyType + ?Sized>(&mut self) -> Result<()> {
        self.registry.track_references::<T>()
    }

    /// Serialize one value with a fresh context.
    pub fn serialize<T: Serialize + ForyType + ?Sized>(&self, value: &T) -> Result<Message> {
        self.serialize_with(&mut WriteContext::default(), value)
    }

    /// Serialize one value, reusing the buffer and registries of `ctx`.
    pub fn serialize_with<T: Serialize + ForyType + ?Sized>(
        &self,
        ctx: &mut WriteContext,
        value: &T,
    ) -> Result<Message> {
        ctx.reset();
        let mut stage = Stage::default();

        let is_null = value.is_null();
        HeaderInfo::local(&self.config, is_null).write(&mut ctx.buffer);
        if is_null {
            stage.advance(StageEvent::NullHeader)?;
            return Ok(Message::single(ctx.buffer.split().freeze()));
        }
        stage.advance(StageEvent::HeaderDone)?;

        let placeholder = match self.config.compatible {
            true => {
                let position = ctx.buffer.len();
                ctx.buffer.put_u32_le(0);
                Some(position)
            }
            false => None,
        };

        let field = T::field_ref();
        let spec = self.registry.resolve(&field.type_ref)?;
        let flag = match self.config.ref_mode {
            RefMode::None => None,
            RefMode::NullOnly => Some(RefFlag::NotNull),
            RefMode::Tracking if spec.reference_tracking() => Some(RefFlag::RefValue),
            RefMode::Tracking => Some(RefFlag::NotNull),
        };
        if let Some(flag) = flag {
            ctx.buffer.put_u8(flag.to_byte());
        }
        stage.advance(StageEvent::RefDone)?;

        write_type_info(ctx, &self.registry, spec, self.config.compatible)?;
        stage.advance(StageEvent::TypeInfoDone)?;

        write_value(value, &field, ctx, &self.registry, self.config)?;
        stage.advance(StageEvent::DataDone)?;

        match placeholder {
            Some(position) => {
                let offset = ctx.buffer.len() - position - 4;
                let offset = u32::try_from(offset).map_err(|_| ForyError::Range {
                    value: offset as u64,
                    bits: 32,
                })?;
                ctx.metas.write_section(&mut ctx.buffer);
                Ok(Message::patched(ctx.buffer.split(), position, offset))
            }
            None => Ok(Message::single(ctx.buffer.split().freeze())),
        }
    }

    /// Deserialize one in-memory message.
    pub fn deserialize<T: DeserializeOwned + ForyType>(&self, bytes: &[u8]) -> Result<T> {
        let mut source = bytes;
        block_on(self.deserialize_from(&mut source))
    }

    /// Read and deserialize one message from `source` with a fresh context.
    pub async fn deserialize_from<T, R>(&self, source: &mut R) -> Result<T>
    where
        T: DeserializeOwned + ForyType,
        R: AsyncBufRead + Unpin,
    {
        self.deserialize_with(&mut ReadContext::default(), source).await
    }

    /// Read and deserialize one message, reusing `ctx`.
    ///
    /// Compatible messages are framed, so a stream may carry several of them.
    /// Otherwise `source` is read to its end.
    pub async fn deserialize_with<T, R>(&self, ctx: &mut ReadContext, source: &mut R) -> Result<T>
    where
        T: DeserializeOwned + ForyType,
        R: AsyncBufRead + Unpin,
    {
        ctx.reset();
        let mut stage = Stage::default();

        let Some(frame) = self.read_frame(ctx, source).await? else {
            stage.advance(StageEvent::NullHeader)?;
            return null_value::<T>();
        };
        stage.advance(StageEvent::HeaderDone)?;

        let mut input = ByteViewer::from_slice(&frame.body);
        let flag = match self.config.ref_mode {
            RefMode::None => RefFlag::NotNull,
            _ => RefFlag::from_byte(input.next_byte()?)?,
        };
        match flag {
            RefFlag::Null => {
                stage.advance(StageEvent::RefShortCircuit)?;
                return null_value::<T>();
            }
            RefFlag::Ref => return Err(ForyError::protocol("back-reference at the top level")),
            RefFlag::NotNull | RefFlag::RefValue => stage.advance(StageEvent::RefDone)?,
        }

        let type_id = read_varuint32(&mut input.clone())?;
        let resolved = read_type_info(&mut input, ctx, &self.registry, &self.config)?;
        let mut ty =
            FieldTypeMeta::from_field_ref(&self.registry, &T::field_ref(), false, self.config.compatible)?;
        ty.type_id = type_id;
        stage.advance(StageEvent::TypeInfoDone)?;

        if flag == RefFlag::RefValue {
            ctx.refs.push(RefEntry {
                position: input.position(),
                ty: ty.clone(),
                resolved: resolved.clone(),
            });
        }

        let value = read_value(input, ty, resolved, ctx, &self.registry, self.config)?;
        stage.advance(StageEvent::DataDone)?;
        Ok(value)
    }

    /// Read one message and report its structure without decoding the data.
    pub async fn inspect_from<R: AsyncBufRead + Unpin>(&self, source: &mut R) -> Result<MessageLayout> {
        let mut ctx = ReadContext::default();
        let header = HeaderInfo::read(source, &self.config).await?;

        let mut layout = MessageLayout {
            header,
            meta_offset: None,
            ref_flag: None,
            type_id: None,
            body_len: 0,
            metas: vec![],
        };
        if header.is_null {
            return Ok(layout);
        }

        let frame = self.read_body(header, &mut ctx, source).await?;
        let mut input = ByteViewer::from_slice(&frame.body);
        layout.meta_offset = frame.offset;
        layout.body_len = frame.body.len();
        layout.metas = ctx.type_metas().cloned().collect();

        if self.config.ref_mode != RefMode::None {
            let flag = RefFlag::from_byte(input.next_byte()?)?;
            layout.ref_flag = Some(flag);
            if flag == RefFlag::Null {
                return Ok(layout);
            }
        }
        layout.type_id = Some(read_varuint32(&mut input)?);

        Ok(layout)
    }

    /// Read the header and the framed body. `None` for a null message.
    async fn read_frame<R: AsyncBufRead + Unpin>(
        &self,
        ctx: &mut ReadContext,
        source: &mut R,
    ) -> Result<Option<Frame>> {
        let header = HeaderInfo::read(source, &self.config).await?;
        if header.is_null {
            return Ok(None);
        }
        self.read_body(header, ctx, source).await.map(Some)
    }

    async fn read_body<R: AsyncBufRead + Unpin>(
        &self,
        header: HeaderInfo,
        ctx: &mut ReadContext,
        source: &mut R,
    ) -> Result<Frame> {
        let mut body = Vec::new();

        if !self.config.compatible {
            source.read_to_end(&mut body).await?;
            return Ok(Frame {
                offset: None,
                body,
            });
        }

        let mut offset = [0_u8; 4];
        read_exact(source, &mut offset).await?;
        let offset = u32::from_le_bytes(offset);

        let read = (&mut *source).take(offset as u64).read_to_end(&mut body).await?;
        if read < offset as usize {
            return Err(ForyError::UnexpectedEof {
                needed: offset as usize - read,
            });
        }

        let count = read_varuint32_async(source).await?;
        for _ in 0..count {
            ctx.push_meta(read_type_meta_async(source).await?);
        }
        log::debug!(
            "{:?} message: {} body bytes, {} type meta(s)",
            header.source_language(),
            offset,
            count
        );

        Ok(Frame {
            offset: Some(offset),
            body,
        })
    }
}

/// Value of a null message: `None` for nullable types, an error otherwise.
fn null_value<T: DeserializeOwned + ForyType>() -> Result<T> {
    if !T::NULLABLE {
        return Err(ForyError::NullValue(std::any::type_name::<T>().to_string()));
    }
    T::deserialize(IntoDeserializer::<'_, ForyError>::into_deserializer(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KnownTypeId;

    #[test]
    fn test_stage_transitions() {
        let mut stage = Stage::default();
        stage.advance(StageEvent::HeaderDone).unwrap();
        stage.advance(StageEvent::RefDone).unwrap();
        assert!(matches!(
            stage.advance(StageEvent::DataDone),
            Err(ForyError::Protocol(_))
        ));
        stage.advance(StageEvent::TypeInfoDone).unwrap();
        stage.advance(StageEvent::DataDone).unwrap();
        assert_eq!(stage, Stage::Complete);

        let mut null = Stage::default();
        null.advance(StageEvent::NullHeader).unwrap();
        assert_eq!(null, Stage::Complete);
        assert!(null.advance(StageEvent::HeaderDone).is_err());
    }

    #[test]
    fn test_u32_without_ref_flag() {
        let fory = Fory::new(ForyConfig::default().ref_mode(RefMode::None));
        let message = fory.serialize(&u32::MAX).unwrap();

        assert_eq!(
            message.to_vec(),
            [0xd4, 0x62, 0x06, 6, 66, 255, 255, 255, 255]
        );
        assert_eq!(fory.deserialize::<u32>(&message.to_vec()).unwrap(), u32::MAX);
    }

    #[test]
    fn test_null_message() {
        let fory = Fory::default();
        let bytes = fory.serialize(&None::<String>).unwrap().to_vec();

        assert_eq!(bytes, [0xd4, 0x62, 0x07, 6]);
        assert_eq!(fory.deserialize::<Option<String>>(&bytes).unwrap(), None);
        assert!(matches!(
            fory.deserialize::<String>(&bytes),
            Err(ForyError::NullValue(_))
        ));
    }

    #[test]
    fn test_top_level_reference_rejected() {
        let fory = Fory::default();
        let bytes = [0xd4, 0x62, 0x06, 6, RefFlag::Ref.to_byte(), 0];

        assert!(matches!(
            fory.deserialize::<u32>(&bytes),
            Err(ForyError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_inspect() {
        let fory = Fory::new(ForyConfig::default().compatible(true));
        let mut message = fory.serialize(&vec![1_i64, 2]).unwrap();
        let layout = fory.inspect_from(&mut message).await.unwrap();

        assert!(layout.header.is_xlang);
        assert_eq!(layout.header.source_language(), Some(Language::Rust));
        assert_eq!(layout.ref_flag, Some(RefFlag::NotNull));
        assert_eq!(layout.type_id, Some(KnownTypeId::List.id()));
        assert_eq!(layout.meta_offset, Some(layout.body_len as u32));
        assert!(layout.metas.is_empty());
        assert!(message.is_empty());
    }

    #[tokio::test]
    async fn test_deserialize_from_message() {
        for compatible in [false, true] {
            let fory = Fory::new(ForyConfig::default().compatible(compatible));
            let value = vec!["left".to_string(), "right".to_string()];

            let mut message = fory.serialize(&value).unwrap();
            let output: Vec<String> = fory.deserialize_from(&mut message).await.unwrap();
            assert_eq!(output, value);
            assert!(message.is_empty());
        }
    }

    #[tokio::test]
    async fn test_message_fill_buf_walks_segments() {
        use tokio::io::AsyncBufReadExt;

        let fory = Fory::new(ForyConfig::default().compatible(true));
        let mut message = fory.serialize(&7_u16).unwrap();
        let expected = message.to_vec();

        let mut chunks = Vec::new();
        loop {
            let chunk = message.fill_buf().await.unwrap();
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            chunks.push(chunk.to_vec());
            message.consume(len);
        }

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), expected);
    }

    #[derive(serde::Serialize)]
    struct Narrow {
        a: u8,
    }

    #[derive(serde::Serialize)]
    struct Wide {
        a: u8,
        b: u8,
    }

    #[derive(Debug, PartialEq, serde::Deserialize)]
    struct Local {
        a: u8,
        #[serde(default)]
        b: u8,
    }

    crate::fory_type!(Narrow, Wide, Local);

    #[test]
    fn test_context_reused_across_engines() {
        let engine = |fields: &[&str]| {
            let descriptors = || -> Vec<FieldDescriptor> {
                fields.iter().map(|name| FieldDescriptor::of::<u8>(*name)).collect()
            };
            let mut writer = Fory::default();
            let mut reader = Fory::default();
            match fields.len() {
                1 => writer.register_struct::<Narrow>(9, descriptors()).unwrap(),
                _ => writer.register_struct::<Wide>(9, descriptors()).unwrap(),
            }
            reader.register_struct::<Local>(9, descriptors()).unwrap();
            (writer, reader)
        };
        let (wide_writer, wide_reader) = engine(&["a", "b"]);
        let (narrow_writer, narrow_reader) = engine(&["a"]);

        let wide = wide_writer.serialize(&Wide { a: 1, b: 2 }).unwrap().to_vec();
        let narrow = narrow_writer.serialize(&Narrow { a: 3 }).unwrap().to_vec();

        let mut ctx = ReadContext::default();
        let first: Local =
            block_on(wide_reader.deserialize_with(&mut ctx, &mut wide.as_slice())).unwrap();
        let second: Local =
            block_on(narrow_reader.deserialize_with(&mut ctx, &mut narrow.as_slice())).unwrap();

        assert_eq!(first, Local { a: 1, b: 2 });
        assert_eq!(second, Local { a: 3, b: 0 });
    }
}
