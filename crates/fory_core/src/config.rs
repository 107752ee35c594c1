//! Engine configuration.

use crate::protocol::RefMode;

/// Default constants shared by every runtime speaking the wire format.
pub mod defaults {
    /// Magic number written ahead of cross-language messages.
    pub const MAGIC_NUMBER: u16 = 0x62d4;

    /// Language code this runtime writes into the header.
    pub const LANGUAGE_CODE: u8 = 6;

    /// Seed of [crate::hash::murmurhash3_x64_128].
    pub const DEFAULT_HASH_SEED: u64 = 0;

    /// Seed for meta-string and schema fingerprints.
    pub const META_HASH_SEED: u64 = 47;

    pub const XLANG: bool = true;
    pub const COMPATIBLE: bool = false;

    /// Maximum nesting of user types within one value.
    pub const MAX_DEPTH: usize = 5;
}

/// Per-engine options. Immutable once handed to [crate::Fory].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForyConfig {
    /// Write the magic number and source language, and accept only xlang peers.
    pub xlang: bool,
    /// Embed full schemas so producer and consumer may differ.
    pub compatible: bool,
    /// How the reference stage treats values.
    pub ref_mode: RefMode,
    pub max_depth: usize,
}

impl Default for ForyConfig {
    fn default() -> Self {
        Self {
            xlang: defaults::XLANG,
            compatible: defaults::COMPATIBLE,
            ref_mode: RefMode::NullOnly,
            max_depth: defaults::MAX_DEPTH,
        }
    }
}

impl ForyConfig {
    pub fn xlang(mut self, xlang: bool) -> Self {
        self.xlang = xlang;
        self
    }

    pub fn compatible(mut self, compatible: bool) -> Self {
        self.compatible = compatible;
        self
    }

    pub fn ref_mode(mut self, ref_mode: RefMode) -> Self {
        self.ref_mode = ref_mode;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
