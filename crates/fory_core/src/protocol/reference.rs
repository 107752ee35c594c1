//! Reference flags.

use crate::error::{ForyError, Result};

/// The byte preceding a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum RefFlag {
    Null = -3,
    /// Back-reference; a `varuint32` ref id follows.
    Ref = -2,
    /// Literal value that is not tracked.
    NotNull = -1,
    /// Literal value that later `Ref` flags may point back to.
    RefValue = 0,
}

impl RefFlag {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte as i8 {
            -3 => Ok(Self::Null),
            -2 => Ok(Self::Ref),
            -1 => Ok(Self::NotNull),
            0 => Ok(Self::RefValue),
            other => Err(ForyError::protocol(format!("invalid reference flag {}", other))),
        }
    }

    pub fn to_byte(self) -> u8 {
        self as i8 as u8
    }
}

/// How the reference stage treats top-level values, and whether nested values may be tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RefMode {
    /// No reference flag at the top level.
    None,
    /// A flag that only distinguishes null from present values.
    #[default]
    NullOnly,
    /// Values of tracked types and fields are written as [RefFlag::RefValue].
    Tracking,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        assert_eq!(RefFlag::Null.to_byte(), 0xfd);
        assert_eq!(RefFlag::NotNull.to_byte(), 0xff);
        for flag in [RefFlag::Null, RefFlag::Ref, RefFlag::NotNull, RefFlag::RefValue] {
            assert_eq!(RefFlag::from_byte(flag.to_byte()).unwrap(), flag);
        }
        assert!(RefFlag::from_byte(1).is_err());
        assert!(RefFlag::from_byte(0xfc).is_err());
    }
}
