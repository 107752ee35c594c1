//! Variable-length integer codecs.
//!
//! Each byte carries 7 payload bits, least significant group first. The MSB of a byte
//! is set when more bytes follow. The 64-bit flavour stores 8 full bits in its 9th byte
//! so every `u64` fits in 9 bytes. These byte sequences are part of the wire contract.

use bytes::BufMut;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{
    error::{ForyError, Result},
    viewer::ByteViewer,
};

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7f;

/// Largest value accepted by the 36-bit codec.
pub const VARUINT36_MAX: u64 = (1 << 36) - 1;

/// Byte budget and bit width of a varint flavour.
#[derive(Debug, Clone, Copy)]
struct Budget {
    max_bytes: usize,
    bits: u32,
    /// The last byte holds 8 payload bits instead of 7.
    full_last: bool,
}

const BUDGET_32: Budget = Budget {
    max_bytes: 5,
    bits: 32,
    full_last: false,
};
const BUDGET_36: Budget = Budget {
    max_bytes: 6,
    bits: 36,
    full_last: false,
};
const BUDGET_64: Budget = Budget {
    max_bytes: 9,
    bits: 64,
    full_last: true,
};

/// Incremental decoder shared by the slice and async readers.
struct Accumulator {
    budget: Budget,
    value: u64,
    read: usize,
}

impl Accumulator {
    fn new(budget: Budget) -> Self {
        Self {
            budget,
            value: 0,
            read: 0,
        }
    }

    /// Feed the next byte. Returns the value once the last byte is seen.
    fn push(&mut self, byte: u8) -> Result<Option<u64>> {
        let shift = 7 * self.read as u32;

        if self.budget.full_last && self.read == self.budget.max_bytes - 1 {
            self.value |= (byte as u64) << shift;
            return Ok(Some(self.value));
        }

        self.value |= ((byte & PAYLOAD_MASK) as u64) << shift;
        self.read += 1;

        if byte & CONTINUATION == 0 {
            if self.budget.bits < 64 && self.value >> self.budget.bits != 0 {
                return Err(ForyError::Overflow {
                    bits: self.budget.bits,
                });
            }
            return Ok(Some(self.value));
        }

        match self.read == self.budget.max_bytes {
            true => Err(ForyError::Overflow {
                bits: self.budget.bits,
            }),
            false => Ok(None),
        }
    }
}

fn write_groups<B: BufMut>(buf: &mut B, mut value: u64) {
    while value >= CONTINUATION as u64 {
        buf.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Write a `u32` in 1..=5 bytes.
pub fn write_varuint32<B: BufMut>(buf: &mut B, value: u32) {
    write_groups(buf, value as u64)
}

/// Write a value below 2^36 in 1..=6 bytes.
pub fn write_varuint36<B: BufMut>(buf: &mut B, value: u64) -> Result<()> {
    if value > VARUINT36_MAX {
        return Err(ForyError::Range { value, bits: 36 });
    }
    write_groups(buf, value);
    Ok(())
}

/// Write a `u64` in 1..=9 bytes.
pub fn write_varuint64<B: BufMut>(buf: &mut B, mut value: u64) {
    for _ in 0..BUDGET_64.max_bytes - 1 {
        if value < CONTINUATION as u64 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Zigzag-map then write as a 64-bit varint.
pub fn write_varint64<B: BufMut>(buf: &mut B, value: i64) {
    write_varuint64(buf, zigzag64(value))
}

/// Zigzag-map then write as a 32-bit varint.
pub fn write_varint32<B: BufMut>(buf: &mut B, value: i32) {
    write_varuint32(buf, zigzag32(value))
}

pub fn encode_varuint32(value: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(BUDGET_32.max_bytes);
    write_varuint32(&mut out, value);
    out
}

pub fn encode_varuint36(value: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(BUDGET_36.max_bytes);
    write_varuint36(&mut out, value)?;
    Ok(out)
}

pub fn encode_varuint64(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(BUDGET_64.max_bytes);
    write_varuint64(&mut out, value);
    out
}

pub fn encode_varint64(value: i64) -> Vec<u8> {
    encode_varuint64(zigzag64(value))
}

fn read_with(viewer: &mut ByteViewer<'_>, budget: Budget) -> Result<u64> {
    let mut acc = Accumulator::new(budget);
    loop {
        if let Some(value) = acc.push(viewer.next_byte()?)? {
            return Ok(value);
        }
    }
}

pub fn read_varuint32(viewer: &mut ByteViewer<'_>) -> Result<u32> {
    read_with(viewer, BUDGET_32).map(|v| v as u32)
}

pub fn read_varuint36(viewer: &mut ByteViewer<'_>) -> Result<u64> {
    read_with(viewer, BUDGET_36)
}

pub fn read_varuint64(viewer: &mut ByteViewer<'_>) -> Result<u64> {
    read_with(viewer, BUDGET_64)
}

pub fn read_varint64(viewer: &mut ByteViewer<'_>) -> Result<i64> {
    read_varuint64(viewer).map(unzigzag64)
}

pub fn read_varint32(viewer: &mut ByteViewer<'_>) -> Result<i32> {
    read_varuint32(viewer).map(unzigzag32)
}

/// Read one byte from an async source, mapping end of stream to [ForyError::UnexpectedEof].
pub(crate) async fn read_byte<R: AsyncRead + Unpin>(source: &mut R) -> Result<u8> {
    match source.read_u8().await {
        Ok(b) => Ok(b),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ForyError::UnexpectedEof { needed: 1 })
        }
        Err(e) => Err(e.into()),
    }
}

/// Fill `buf` from an async source, mapping a short read to [ForyError::UnexpectedEof].
pub(crate) async fn read_exact<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    match source.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ForyError::UnexpectedEof { needed: buf.len() })
        }
        Err(e) => Err(e.into()),
    }
}

async fn read_with_async<R: AsyncRead + Unpin>(source: &mut R, budget: Budget) -> Result<u64> {
    let mut acc = Accumulator::new(budget);
    loop {
        if let Some(value) = acc.push(read_byte(source).await?)? {
            return Ok(value);
        }
    }
}

/// Async counterpart of [read_varuint32]. Suspends only between bytes.
pub async fn read_varuint32_async<R: AsyncRead + Unpin>(source: &mut R) -> Result<u32> {
    read_with_async(source, BUDGET_32).await.map(|v| v as u32)
}

pub async fn read_varuint64_async<R: AsyncRead + Unpin>(source: &mut R) -> Result<u64> {
    read_with_async(source, BUDGET_64).await
}

pub fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

pub fn unzigzag32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}
