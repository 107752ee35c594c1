//! Shared constants between the ext serializer and deserializer.

/// Tag of `Some` inside an ext value.
pub const OPTION_SOME_VARIANT: u8 = u8::MAX;
/// Tag of `None` inside an ext value.
pub const OPTION_NONE_VARIANT: u8 = u8::MIN;

/// Encoding of the string header written by this runtime.
pub const STRING_UTF8: u64 = 2;
pub const STRING_LATIN1: u64 = 0;
pub const STRING_UTF16: u64 = 1;
