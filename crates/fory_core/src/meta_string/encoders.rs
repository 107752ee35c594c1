//! The bit-packing encoders and their inverses.

use crate::error::{ForyError, Result};

use super::stats::StringStats;

const FIVE_BITS: usize = 5;
const SIX_BITS: usize = 6;
const STRIP_FLAG: u8 = 0x80;

/// Upper-case marker used by the all-to-lower transform.
const UPPER_MARKER: char = '|';

/// One string-to-bits strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaStringEncoder {
    /// Raw UTF-8 bytes, always eligible.
    Utf8,
    /// `a-z . _ $ |` at 5 bits per char.
    FiveBit,
    /// `a-z A-Z 0-9` plus two specials at 6 bits per char.
    SixBit { specials: [char; 2] },
    /// Single leading capital, lowered then packed as five-bit.
    FirstToLower,
    /// Every capital expanded to `|` + lowercase, then packed as five-bit.
    AllToLower,
}

impl MetaStringEncoder {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::FiveBit => "five-bit",
            Self::SixBit { .. } => "six-bit",
            Self::FirstToLower => "first-to-lower",
            Self::AllToLower => "all-to-lower",
        }
    }

    /// Whether this encoder can and should be used for `value`.
    pub fn evaluate(&self, stats: &StringStats, value: &str) -> bool {
        let len = value.len();
        match self {
            Self::Utf8 => true,
            Self::FiveBit => {
                stats.can_lower_special && (len + stats.upper_count) * 5 < len * 6
            }
            Self::SixBit { .. } => stats.can_lower_upper_digit_special && stats.digit_count > 0,
            Self::FirstToLower => {
                let mut chars = value.chars();
                stats.upper_count == 1
                    && chars.next().is_some_and(|c| c.is_ascii_uppercase())
                    && chars.all(|c| five_bit_code(c).is_some())
            }
            Self::AllToLower => {
                let encodable = value.chars().all(|c| {
                    c.is_ascii_uppercase() || (c != UPPER_MARKER && five_bit_code(c).is_some())
                });
                encodable && (len + stats.upper_count) * 5 < len * 6
            }
        }
    }

    pub fn encode(&self, value: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(value.as_bytes().to_vec()),
            Self::FiveBit => self.pack_five(value.chars()),
            Self::SixBit { specials } => {
                let codes = value
                    .chars()
                    .map(|c| {
                        six_bit_code(c, *specials).ok_or(ForyError::UnsupportedCharacter {
                            ch: c,
                            encoding: self.name(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(pack(&codes, SIX_BITS))
            }
            Self::FirstToLower => {
                let mut chars = value.chars();
                match chars.next() {
                    Some(first) => {
                        self.pack_five(std::iter::once(first.to_ascii_lowercase()).chain(chars))
                    }
                    None => Ok(pack(&[], FIVE_BITS)),
                }
            }
            Self::AllToLower => {
                let expanded = value.chars().flat_map(|c| match c.is_ascii_uppercase() {
                    true => [Some(UPPER_MARKER), Some(c.to_ascii_lowercase())],
                    false => [Some(c), None],
                });
                self.pack_five(expanded.flatten())
            }
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| ForyError::InvalidString(e.to_string())),
            Self::FiveBit => unpack_five(bytes),
            Self::SixBit { specials } => Ok(unpack(bytes, SIX_BITS)
                .into_iter()
                .map(|code| six_bit_char(code, *specials))
                .collect()),
            Self::FirstToLower => {
                let lowered = unpack_five(bytes)?;
                let mut chars = lowered.chars();
                Ok(match chars.next() {
                    Some(first) => std::iter::once(first.to_ascii_uppercase())
                        .chain(chars)
                        .collect(),
                    None => lowered,
                })
            }
            Self::AllToLower => {
                let lowered = unpack_five(bytes)?;
                let mut out = String::with_capacity(lowered.len());
                let mut chars = lowered.chars();
                while let Some(c) = chars.next() {
                    match c {
                        UPPER_MARKER => match chars.next() {
                            Some(next) => out.push(next.to_ascii_uppercase()),
                            None => {
                                return Err(ForyError::InvalidString(
                                    "dangling upper-case marker".to_string(),
                                ))
                            }
                        },
                        _ => out.push(c),
                    }
                }
                Ok(out)
            }
        }
    }

    fn pack_five(&self, chars: impl Iterator<Item = char>) -> Result<Vec<u8>> {
        let codes = chars
            .map(|c| {
                five_bit_code(c).ok_or(ForyError::UnsupportedCharacter {
                    ch: c,
                    encoding: self.name(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(pack(&codes, FIVE_BITS))
    }
}

fn five_bit_code(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        '.' => Some(26),
        '_' => Some(27),
        '$' => Some(28),
        UPPER_MARKER => Some(29),
        _ => None,
    }
}

fn five_bit_char(code: u8) -> Result<char> {
    match code {
        0..=25 => Ok((b'a' + code) as char),
        26 => Ok('.'),
        27 => Ok('_'),
        28 => Ok('$'),
        29 => Ok(UPPER_MARKER),
        _ => Err(ForyError::InvalidString(format!(
            "five-bit code {} has no character",
            code
        ))),
    }
}

fn six_bit_code(c: char, specials: [char; 2]) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a'),
        'A'..='Z' => Some(c as u8 - b'A' + 26),
        '0'..='9' => Some(c as u8 - b'0' + 52),
        _ if c == specials[0] => Some(62),
        _ if c == specials[1] => Some(63),
        _ => None,
    }
}

fn six_bit_char(code: u8, specials: [char; 2]) -> char {
    match code {
        0..=25 => (b'a' + code) as char,
        26..=51 => (b'A' + code - 26) as char,
        52..=61 => (b'0' + code - 52) as char,
        62 => specials[0],
        _ => specials[1],
    }
}

fn unpack_five(bytes: &[u8]) -> Result<String> {
    unpack(bytes, FIVE_BITS)
        .into_iter()
        .map(five_bit_char)
        .collect()
}

/// Pack `bits`-wide codes MSB-first behind a leading strip flag.
///
/// The flag is set when the trailing padding could hold a whole extra code,
/// so the decoder knows to drop the phantom code it would otherwise read.
fn pack(codes: &[u8], bits: usize) -> Vec<u8> {
    let total_bits = codes.len() * bits + 1;
    let byte_len = (codes.len() * bits + 8) / 8;
    let mut out = vec![0_u8; byte_len];

    let mut pos = 1;
    for code in codes {
        for i in (0..bits).rev() {
            if (code >> i) & 1 == 1 {
                out[pos / 8] |= 0x80 >> (pos % 8);
            }
            pos += 1;
        }
    }

    if byte_len * 8 >= total_bits + bits {
        out[0] |= STRIP_FLAG;
    }

    out
}

fn unpack(bytes: &[u8], bits: usize) -> Vec<u8> {
    let Some(first) = bytes.first() else {
        return Vec::new();
    };

    let mut count = (bytes.len() * 8 - 1) / bits;
    if first & STRIP_FLAG != 0 {
        count = count.saturating_sub(1);
    }

    let mut codes = Vec::with_capacity(count);
    let mut pos = 1;
    for _ in 0..count {
        let mut code = 0_u8;
        for _ in 0..bits {
            let bit = (bytes[pos / 8] >> (7 - pos % 8)) & 1;
            code = (code << 1) | bit;
            pos += 1;
        }
        codes.push(code);
    }

    codes
}
