//! Cross-language binary serialization with schema evolution.
//!
//! ```ignore
//! use fory::{fory_type, FieldDescriptor, Fory};
//!
//! #[derive(serde::Serialize, serde::Deserialize)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//! fory_type!(Point);
//!
//! let mut fory = Fory::default();
//! fory.register_struct_by_name::<Point>("geo", "Point", vec![
//!     FieldDescriptor::of::<i32>("x"),
//!     FieldDescriptor::of::<i32>("y"),
//! ])?;
//!
//! let message = fory.serialize(&Point { x: 1, y: 2 })?;
//! let point: Point = fory.deserialize(&message.to_vec())?;
//! ```

pub use fory_core::{
    config::defaults, fory_type, hash, meta, meta_string, varint, FieldDescriptor, FieldMeta,
    FieldTypeMeta, Fory, ForyConfig, ForyError, ForyType, HeaderInfo, KnownTypeId, Language,
    Message, MessageLayout, ReadContext, RefFlag, RefMode, Result, TypeMeta, TypeRef,
    TypeSpecification, TypeSpecificationRegistry, WriteContext,
};

/// End to end tests through the public API
#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_bytes::ByteBuf;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Color {
        Red,
        Green,
        Blue,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Address {
        city: String,
        zip: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u8,
        color: Color,
        tags: BTreeSet<String>,
        home: Option<Address>,
        past: Vec<Address>,
        scores: HashMap<String, f64>,
        avatar: ByteBuf,
    }

    fory_type!(Color, Address, Person);

    fn person_fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::of::<String>("name"),
            FieldDescriptor::of::<u8>("age"),
            FieldDescriptor::of::<Color>("color"),
            FieldDescriptor::of::<BTreeSet<String>>("tags"),
            FieldDescriptor::of::<Option<Address>>("home"),
            FieldDescriptor::of::<Vec<Address>>("past"),
            FieldDescriptor::of::<HashMap<String, f64>>("scores"),
            FieldDescriptor::of::<ByteBuf>("avatar"),
        ]
    }

    fn engine(config: ForyConfig) -> Fory {
        let _ = pretty_env_logger::try_init();

        let mut fory = Fory::new(config);
        fory.register_enum_by_name::<Color>("demo", "Color").unwrap();
        fory.register_struct_by_name::<Address>(
            "demo",
            "Address",
            vec![
                FieldDescriptor::of::<String>("city"),
                FieldDescriptor::of::<u32>("zip"),
            ],
        )
        .unwrap();
        fory.register_struct::<Person>(100, person_fields()).unwrap();
        fory
    }

    fn configs() -> Vec<ForyConfig> {
        let mut configs = vec![];
        for xlang in [true, false] {
            for compatible in [false, true] {
                for ref_mode in [RefMode::None, RefMode::NullOnly, RefMode::Tracking] {
                    configs.push(
                        ForyConfig::default()
                            .xlang(xlang)
                            .compatible(compatible)
                            .ref_mode(ref_mode),
                    );
                }
            }
        }
        configs
    }

    fn person() -> Person {
        Person {
            name: "Ada".to_string(),
            age: 36,
            color: Color::Blue,
            tags: BTreeSet::from(["math".to_string(), "engines".to_string()]),
            home: Some(Address {
                city: "London".to_string(),
                zip: 1815,
            }),
            past: vec![
                Address {
                    city: "Marylebone".to_string(),
                    zip: 1,
                },
                Address {
                    city: "Ockham".to_string(),
                    zip: 2,
                },
            ],
            scores: HashMap::from([("notes".to_string(), 9.5)]),
            avatar: ByteBuf::from(vec![0x89, b'P', b'N', b'G']),
        }
    }

    fn round_trip<T>(fory: &Fory, value: T)
    where
        T: ForyType + Serialize + serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = fory.serialize(&value).unwrap().to_vec();
        let output: T = fory.deserialize(&bytes).unwrap();
        assert_eq!(output, value, "config {:?}", fory.config());
    }

    #[test]
    fn test_known_scalars() {
        for config in configs() {
            let fory = Fory::new(config);

            round_trip(&fory, true);
            round_trip(&fory, i8::MIN);
            round_trip(&fory, i16::MAX);
            round_trip(&fory, -7_i32);
            round_trip(&fory, i64::MIN);
            round_trip(&fory, 200_u8);
            round_trip(&fory, 60_000_u16);
            round_trip(&fory, u32::MAX);
            round_trip(&fory, u64::MAX);
            round_trip(&fory, f32::MIN_POSITIVE);
            round_trip(&fory, std::f64::consts::PI);
            round_trip(&fory, String::new());
            round_trip(&fory, "日本語 text".to_string());
            round_trip(&fory, ByteBuf::from(vec![1_u8, 2, 3]));
            round_trip(&fory, Some(5_i32));
            round_trip(&fory, None::<i32>);
        }
    }

    #[test]
    fn test_nested_structs() {
        for config in configs() {
            let fory = engine(config);
            round_trip(&fory, person());
            round_trip(&fory, vec![person(), person()]);
            round_trip(
                &fory,
                HashMap::from([(1_i32, Color::Red), (2, Color::Green)]),
            );
        }
    }

    #[test]
    fn test_end_to_end_u32_bytes() {
        let fory = Fory::new(ForyConfig::default().ref_mode(RefMode::None));
        let message = fory.serialize(&4294967295_u32).unwrap();

        assert_eq!(
            message.to_vec(),
            [0xd4, 0x62, 0x06, 6, 66, 255, 255, 255, 255]
        );
    }

    #[test]
    fn test_compatible_offset() {
        let fory = engine(ForyConfig::default().compatible(true));
        let message = fory.serialize(&person()).unwrap();
        let bytes = message.to_vec();

        // magic, bitmap, language, then the patched offset
        let offset = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let mut meta_section = &bytes[8 + offset..];
        let count = futures::executor::block_on(varint::read_varuint32_async(&mut meta_section));
        assert_eq!(count.unwrap(), 3);

        let segments: Vec<usize> = message.segments().map(|s| s.len()).collect();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1], 4);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProfileV1 {
        user_name: String,
        age: u32,
        legacy_ids: Vec<i64>,
        home: Option<Address>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ProfileV2 {
        #[serde(rename = "userName")]
        user_name: String,
        home: Option<Address>,
        #[serde(default)]
        email: String,
        age: u64,
    }

    fory_type!(ProfileV1, ProfileV2);

    #[test]
    fn test_compatible_evolution() {
        let config = ForyConfig::default().compatible(true);

        let mut writer = engine(config);
        writer
            .register_struct_by_name::<ProfileV1>(
                "demo",
                "Profile",
                vec![
                    FieldDescriptor::of::<String>("user_name"),
                    FieldDescriptor::of::<u32>("age"),
                    FieldDescriptor::of::<Vec<i64>>("legacy_ids"),
                    FieldDescriptor::of::<Option<Address>>("home"),
                ],
            )
            .unwrap();

        let mut reader = engine(config);
        reader
            .register_struct_by_name::<ProfileV2>(
                "demo",
                "Profile",
                vec![
                    FieldDescriptor::of::<String>("userName"),
                    FieldDescriptor::of::<Option<Address>>("home"),
                    FieldDescriptor::of::<String>("email"),
                    FieldDescriptor::of::<u64>("age"),
                ],
            )
            .unwrap();

        let v1 = ProfileV1 {
            user_name: "grace".to_string(),
            age: 85,
            legacy_ids: vec![7, 8, 9],
            home: Some(Address {
                city: "Arlington".to_string(),
                zip: 22201,
            }),
        };
        let bytes = writer.serialize(&v1).unwrap().to_vec();
        let v2: ProfileV2 = reader.deserialize(&bytes).unwrap();

        assert_eq!(
            v2,
            ProfileV2 {
                user_name: "grace".to_string(),
                home: v1.home.clone(),
                email: String::new(),
                age: 85,
            }
        );
    }

    #[test]
    fn test_context_dedup() {
        let fory = engine(ForyConfig::default().compatible(true));
        let addresses = person().past;

        let mut write_ctx = WriteContext::default();
        let first = fory.serialize_with(&mut write_ctx, &addresses).unwrap().to_vec();
        assert_eq!(write_ctx.type_metas().len(), 1);
        let second = fory.serialize_with(&mut write_ctx, &addresses).unwrap().to_vec();
        assert_eq!(write_ctx.type_metas().len(), 1);
        assert_eq!(first, second);

        let mut read_ctx = ReadContext::default();
        for bytes in [&first, &second] {
            let mut source = bytes.as_slice();
            let output: Vec<Address> =
                futures::executor::block_on(fory.deserialize_with(&mut read_ctx, &mut source))
                    .unwrap();
            assert_eq!(output, addresses);
            assert_eq!(read_ctx.type_metas().count(), 1);
        }
    }

    #[test]
    fn test_meta_strings_written_once() {
        let fory = engine(ForyConfig::default());

        let one = fory.serialize(&person().past[..1].to_vec()).unwrap().len();
        let two = fory.serialize(&person().past).unwrap().len();
        let repeat = fory
            .serialize(&vec![person().past[0].clone(), person().past[0].clone()])
            .unwrap()
            .len();

        // a repeated element costs its data plus two single-byte name references
        let element = one - fory.serialize(&Vec::<Address>::new()).unwrap().len();
        assert!(repeat < one + element);
        assert!(two > one);
    }

    #[tokio::test]
    async fn test_stream_of_messages() {
        let fory = engine(ForyConfig::default().compatible(true));

        let mut stream = Vec::new();
        fory.serialize(&person()).unwrap().write_to(&mut stream).await.unwrap();
        fory.serialize(&Color::Green).unwrap().write_to(&mut stream).await.unwrap();

        let mut source = stream.as_slice();
        let first: Person = fory.deserialize_from(&mut source).await.unwrap();
        let second: Color = fory.deserialize_from(&mut source).await.unwrap();

        assert_eq!(first, person());
        assert_eq!(second, Color::Green);
        assert!(source.is_empty());
    }

    #[test]
    fn test_header_errors() {
        let fory = Fory::default();

        let bad_magic = [0x00, 0x62, 0x06, 6, 0xff, 66, 0, 0, 0, 0];
        assert!(matches!(
            fory.deserialize::<u32>(&bad_magic),
            Err(ForyError::Protocol(_))
        ));

        let big_endian = [0xd4, 0x62, 0x04, 6, 0xff, 66, 0, 0, 0, 0];
        assert!(matches!(
            fory.deserialize::<u32>(&big_endian),
            Err(ForyError::Protocol(_))
        ));

        let out_of_band = [0xd4, 0x62, 0x0e, 6, 0xff, 66, 0, 0, 0, 0];
        assert!(matches!(
            fory.deserialize::<u32>(&out_of_band),
            Err(ForyError::Unsupported(_))
        ));

        let native = Fory::new(ForyConfig::default().xlang(false));
        let bytes = native.serialize(&7_u32).unwrap().to_vec();
        assert!(fory.deserialize::<u32>(&bytes).is_err());
        assert_eq!(native.deserialize::<u32>(&bytes).unwrap(), 7);

        assert!(matches!(
            fory.deserialize::<u32>(&[0xd4, 0x62]),
            Err(ForyError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_unregistered_type() {
        let fory = Fory::default();
        assert!(matches!(
            fory.serialize(&person()),
            Err(ForyError::UnregisteredType(_))
        ));
    }

    #[test]
    fn test_defaults_reexported() {
        assert_eq!(defaults::MAGIC_NUMBER, 0x62d4);
        assert_eq!(defaults::LANGUAGE_CODE, 6);
        assert_eq!(defaults::META_HASH_SEED, 47);
        assert_eq!(ForyConfig::default().max_depth, 5);
    }
}
