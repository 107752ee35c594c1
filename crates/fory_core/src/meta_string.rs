//! Compact encodings for identifier-like strings.
//!
//! Type names, namespaces and field names are packed below 8 bits per char when their
//! alphabet allows it. A factory per name kind picks the encoder by a fixed priority
//! order and reports a 2-bit flag that travels on the wire next to the bytes.

mod encoders;
mod stats;

use std::hash::{Hash, Hasher};

pub use encoders::MetaStringEncoder;
pub use stats::StringStats;

use crate::{
    config::defaults::META_HASH_SEED,
    error::{ForyError, Result},
    hash::murmurhash3_x64_128_seeded,
};

/// Two-bit encoding flag written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetaStringEncoding {
    Utf8 = 0,
    AllToLowerSpecial = 1,
    LowerUpperDigitSpecial = 2,
    FirstToLowerSpecial = 3,
}

impl MetaStringEncoding {
    pub fn flag(self) -> u8 {
        self as u8
    }

    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0 => Ok(Self::Utf8),
            1 => Ok(Self::AllToLowerSpecial),
            2 => Ok(Self::LowerUpperDigitSpecial),
            3 => Ok(Self::FirstToLowerSpecial),
            _ => Err(ForyError::UnsupportedEncoding(flag)),
        }
    }
}

/// An encoded name and the flag needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaString {
    pub encoding: MetaStringEncoding,
    pub bytes: Vec<u8>,
}

/// Encoder selection for one kind of name.
#[derive(Debug)]
pub struct MetaStringFactory {
    specials: [char; 2],
    /// Candidates in priority order. UTF-8 is the implicit fallback.
    rules: &'static [(MetaStringEncoder, MetaStringEncoding)],
}

const TYPE_SPECIALS: [char; 2] = ['$', '_'];
const NAMESPACE_SPECIALS: [char; 2] = ['.', '_'];

pub static FIELD_NAME_FACTORY: MetaStringFactory = MetaStringFactory {
    specials: TYPE_SPECIALS,
    rules: &[
        (
            MetaStringEncoder::SixBit {
                specials: TYPE_SPECIALS,
            },
            MetaStringEncoding::LowerUpperDigitSpecial,
        ),
        (
            MetaStringEncoder::AllToLower,
            MetaStringEncoding::AllToLowerSpecial,
        ),
    ],
};

pub static TYPE_NAME_FACTORY: MetaStringFactory = MetaStringFactory {
    specials: TYPE_SPECIALS,
    rules: &[
        (
            MetaStringEncoder::SixBit {
                specials: TYPE_SPECIALS,
            },
            MetaStringEncoding::LowerUpperDigitSpecial,
        ),
        (
            MetaStringEncoder::FirstToLower,
            MetaStringEncoding::FirstToLowerSpecial,
        ),
        (
            MetaStringEncoder::AllToLower,
            MetaStringEncoding::AllToLowerSpecial,
        ),
    ],
};

pub static NAMESPACE_FACTORY: MetaStringFactory = MetaStringFactory {
    specials: NAMESPACE_SPECIALS,
    rules: &[
        (
            MetaStringEncoder::SixBit {
                specials: NAMESPACE_SPECIALS,
            },
            MetaStringEncoding::LowerUpperDigitSpecial,
        ),
        (
            MetaStringEncoder::AllToLower,
            MetaStringEncoding::AllToLowerSpecial,
        ),
    ],
};

impl MetaStringFactory {
    /// First eligible encoder in priority order, or UTF-8.
    pub fn select(&self, value: &str) -> (MetaStringEncoder, MetaStringEncoding) {
        let stats = StringStats::compute(value, self.specials);

        self.rules
            .iter()
            .find(|(encoder, _)| encoder.evaluate(&stats, value))
            .copied()
            .unwrap_or((MetaStringEncoder::Utf8, MetaStringEncoding::Utf8))
    }

    pub fn encode(&self, value: &str) -> Result<MetaString> {
        let (encoder, encoding) = self.select(value);
        Ok(MetaString {
            encoding,
            bytes: encoder.encode(value)?,
        })
    }

    /// Decoder for a flag read off the wire.
    pub fn encoder_for(&self, encoding: MetaStringEncoding) -> Result<MetaStringEncoder> {
        if encoding == MetaStringEncoding::Utf8 {
            return Ok(MetaStringEncoder::Utf8);
        }
        self.rules
            .iter()
            .find(|(_, e)| *e == encoding)
            .map(|(encoder, _)| *encoder)
            .ok_or(ForyError::UnsupportedEncoding(encoding.flag()))
    }

    pub fn decode(&self, encoding: MetaStringEncoding, bytes: &[u8]) -> Result<String> {
        self.encoder_for(encoding)?.decode(bytes)
    }
}

/// An encoded name plus its 64-bit content hash.
///
/// The hash keeps the encoding flag in its low byte and is never zero.
/// Equality and hashing for map keys use the content hash.
#[derive(Debug, Clone)]
pub struct MetaStringBytes {
    bytes: Vec<u8>,
    encoding: MetaStringEncoding,
    hash: u64,
}

impl MetaStringBytes {
    pub fn new(meta: MetaString) -> Self {
        let hash = Self::compute_hash(&meta.bytes, meta.encoding);
        Self {
            bytes: meta.bytes,
            encoding: meta.encoding,
            hash,
        }
    }

    /// Rebuild from wire parts. `hash` is trusted as read.
    pub fn from_parts(bytes: Vec<u8>, encoding: MetaStringEncoding, hash: u64) -> Self {
        Self {
            bytes,
            encoding,
            hash,
        }
    }

    pub fn compute_hash(bytes: &[u8], encoding: MetaStringEncoding) -> u64 {
        let (h1, _) = murmurhash3_x64_128_seeded(bytes, META_HASH_SEED);
        let mut hash = (h1 as i64).wrapping_abs() as u64;
        if hash == 0 {
            hash += 256;
        }
        (hash & 0xffff_ffff_ffff_ff00) | encoding.flag() as u64
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoding(&self) -> MetaStringEncoding {
        self.encoding
    }

    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for MetaStringBytes {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bytes == other.bytes
    }
}

impl Eq for MetaStringBytes {}

impl Hash for MetaStringBytes {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_priority() {
        // digits route to six-bit in every factory
        for factory in [&FIELD_NAME_FACTORY, &TYPE_NAME_FACTORY, &NAMESPACE_FACTORY] {
            let (encoder, encoding) = factory.select("Value2");
            assert_eq!(encoding, MetaStringEncoding::LowerUpperDigitSpecial);
            assert!(matches!(encoder, MetaStringEncoder::SixBit { .. }));
        }

        assert_eq!(
            TYPE_NAME_FACTORY.select("Person").1,
            MetaStringEncoding::FirstToLowerSpecial
        );
        // field names never use first-to-lower
        assert_eq!(
            FIELD_NAME_FACTORY.select("Person").1,
            MetaStringEncoding::AllToLowerSpecial
        );
        assert_eq!(
            NAMESPACE_FACTORY.select("org.example").1,
            MetaStringEncoding::AllToLowerSpecial
        );
        assert_eq!(NAMESPACE_FACTORY.select("").1, MetaStringEncoding::Utf8);
        assert_eq!(
            NAMESPACE_FACTORY.select("my-crate").1,
            MetaStringEncoding::Utf8
        );
        assert_eq!(TYPE_NAME_FACTORY.select("ABCD").1, MetaStringEncoding::Utf8);
    }

    #[test]
    fn test_six_bit_never_demoted() {
        let names = ["a1", "HTTP2Server", "user_id9", "X9", "v1_2_3"];
        for name in names {
            for factory in [&FIELD_NAME_FACTORY, &TYPE_NAME_FACTORY] {
                assert_eq!(
                    factory.select(name).1,
                    MetaStringEncoding::LowerUpperDigitSpecial,
                    "{}",
                    name
                );
            }
        }
    }

    #[test]
    fn test_factory_round_trip() {
        let names = ["Person", "myField", "org.apache.fory", "snake_case", "x", "ÜberType", "A$b"];
        for name in names {
            for factory in [&FIELD_NAME_FACTORY, &TYPE_NAME_FACTORY, &NAMESPACE_FACTORY] {
                let meta = factory.encode(name).unwrap();
                assert_eq!(factory.decode(meta.encoding, &meta.bytes).unwrap(), name);
            }
        }
    }

    #[test]
    fn test_unknown_flag() {
        assert!(matches!(
            MetaStringEncoding::from_flag(4),
            Err(ForyError::UnsupportedEncoding(4))
        ));
        assert!(FIELD_NAME_FACTORY
            .decode(MetaStringEncoding::FirstToLowerSpecial, &[0])
            .is_err());
    }

    #[test]
    fn test_meta_string_bytes_hash() {
        let meta = TYPE_NAME_FACTORY.encode("Person").unwrap();
        let a = MetaStringBytes::new(meta.clone());
        let b = MetaStringBytes::new(meta);

        assert_eq!(a, b);
        assert_ne!(a.hash_code(), 0);
        assert_eq!(
            a.hash_code() & 0xff,
            MetaStringEncoding::FirstToLowerSpecial.flag() as u64
        );
    }
}
