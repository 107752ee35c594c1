//! Message header: magic number, bitmap and source language.

use bytes::BufMut;
use tokio::io::AsyncRead;

use crate::{
    config::{defaults, ForyConfig},
    error::{ForyError, Result},
    varint::read_byte,
    viewer::ByteViewer,
};

pub const IS_NULL_FLAG: u8 = 1 << 0;
pub const IS_LITTLE_ENDIAN_FLAG: u8 = 1 << 1;
pub const IS_XLANG_FLAG: u8 = 1 << 2;
pub const IS_OOB_FLAG: u8 = 1 << 3;

/// Language that produced a cross-language message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Language {
    Xlang = 0,
    Java = 1,
    Python = 2,
    Cpp = 3,
    Go = 4,
    JavaScript = 5,
    Rust = 6,
    Dart = 7,
}

impl Language {
    pub fn from_code(code: u8) -> Option<Self> {
        use Language::*;

        [Xlang, Java, Python, Cpp, Go, JavaScript, Rust, Dart]
            .into_iter()
            .find(|lang| *lang as u8 == code)
    }
}

/// Parsed header of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    pub is_null: bool,
    pub is_little_endian: bool,
    pub is_xlang: bool,
    pub is_oob: bool,
    /// Raw source-language byte. Present only in xlang messages.
    pub language: Option<u8>,
}

impl HeaderInfo {
    /// Header this process writes under `config`.
    pub fn local(config: &ForyConfig, is_null: bool) -> Self {
        Self {
            is_null,
            is_little_endian: true,
            is_xlang: config.xlang,
            is_oob: false,
            language: config.xlang.then_some(defaults::LANGUAGE_CODE),
        }
    }

    pub fn bitmap(&self) -> u8 {
        let mut bitmap = 0;
        for (set, flag) in [
            (self.is_null, IS_NULL_FLAG),
            (self.is_little_endian, IS_LITTLE_ENDIAN_FLAG),
            (self.is_xlang, IS_XLANG_FLAG),
            (self.is_oob, IS_OOB_FLAG),
        ] {
            if set {
                bitmap |= flag;
            }
        }
        bitmap
    }

    fn from_bitmap(bitmap: u8) -> Self {
        Self {
            is_null: bitmap & IS_NULL_FLAG != 0,
            is_little_endian: bitmap & IS_LITTLE_ENDIAN_FLAG != 0,
            is_xlang: bitmap & IS_XLANG_FLAG != 0,
            is_oob: bitmap & IS_OOB_FLAG != 0,
            language: None,
        }
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) {
        if self.is_xlang {
            buf.put_u16_le(defaults::MAGIC_NUMBER);
        }
        buf.put_u8(self.bitmap());
        if let Some(language) = self.language {
            buf.put_u8(language);
        }
    }

    pub fn source_language(&self) -> Option<Language> {
        self.language.and_then(Language::from_code)
    }

    /// Check the header against the local configuration.
    pub fn validate(&self, config: &ForyConfig) -> Result<()> {
        if !self.is_little_endian {
            return Err(ForyError::protocol("big-endian messages are not supported"));
        }
        if self.is_xlang != config.xlang {
            return Err(ForyError::protocol(format!(
                "message xlang flag is {}, local configuration expects {}",
                self.is_xlang, config.xlang
            )));
        }
        if self.is_oob {
            return Err(ForyError::unsupported("out-of-band buffers"));
        }
        if let Some(code) = self.language {
            if Language::from_code(code).is_none() {
                log::warn!("unknown source language code {}", code);
            }
        }
        Ok(())
    }

    /// Read a header from a stream. Reads the magic number only when `config` expects xlang.
    pub async fn read<R: AsyncRead + Unpin>(source: &mut R, config: &ForyConfig) -> Result<Self> {
        if config.xlang {
            let magic = u16::from_le_bytes([read_byte(source).await?, read_byte(source).await?]);
            check_magic(magic)?;
        }

        let mut header = Self::from_bitmap(read_byte(source).await?);
        if header.is_xlang && config.xlang {
            header.language = Some(read_byte(source).await?);
        }

        header.validate(config)?;
        Ok(header)
    }

    /// Slice counterpart of [Self::read].
    pub fn parse(viewer: &mut ByteViewer<'_>, config: &ForyConfig) -> Result<Self> {
        if config.xlang {
            check_magic(viewer.read_u16_le()?)?;
        }

        let mut header = Self::from_bitmap(viewer.next_byte()?);
        if header.is_xlang && config.xlang {
            header.language = Some(viewer.next_byte()?);
        }

        header.validate(config)?;
        Ok(header)
    }
}

fn check_magic(magic: u16) -> Result<()> {
    match magic == defaults::MAGIC_NUMBER {
        true => Ok(()),
        false => Err(ForyError::protocol(format!(
            "bad magic number {:#06x}, expected {:#06x}",
            magic,
            defaults::MAGIC_NUMBER
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_header_bytes() {
        let mut buf = Vec::new();
        HeaderInfo::local(&ForyConfig::default(), false).write(&mut buf);
        assert_eq!(buf, [0xd4, 0x62, IS_LITTLE_ENDIAN_FLAG | IS_XLANG_FLAG, 6]);

        let mut buf = Vec::new();
        HeaderInfo::local(&ForyConfig::default().xlang(false), true).write(&mut buf);
        assert_eq!(buf, [IS_LITTLE_ENDIAN_FLAG | IS_NULL_FLAG]);
    }

    #[test]
    fn test_parse_errors() {
        let xlang = ForyConfig::default();
        let native = ForyConfig::default().xlang(false);

        let bad_magic = [0xd5, 0x62, 6, 6];
        assert!(matches!(
            HeaderInfo::parse(&mut ByteViewer::from_slice(&bad_magic), &xlang),
            Err(ForyError::Protocol(_))
        ));

        let big_endian = [0xd4, 0x62, IS_XLANG_FLAG, 6];
        assert!(matches!(
            HeaderInfo::parse(&mut ByteViewer::from_slice(&big_endian), &xlang),
            Err(ForyError::Protocol(_))
        ));

        let xlang_message = [0xd4, 0x62, 6, 6];
        assert!(matches!(
            HeaderInfo::parse(&mut ByteViewer::from_slice(&xlang_message), &native),
            Err(ForyError::Protocol(_))
        ));

        let oob = [IS_LITTLE_ENDIAN_FLAG | IS_OOB_FLAG];
        assert!(matches!(
            HeaderInfo::parse(&mut ByteViewer::from_slice(&oob), &native),
            Err(ForyError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_read_matches_parse() {
        let config = ForyConfig::default();
        let bytes = [0xd4_u8, 0x62, 6, 1];
        let header = HeaderInfo::read(&mut &bytes[..], &config).await.unwrap();

        assert_eq!(header, HeaderInfo::parse(&mut ByteViewer::from_slice(&bytes), &config).unwrap());
        assert_eq!(header.source_language(), Some(Language::Java));
        assert!(!header.is_null);
    }
}
