//! Forward-only cursor over a borrowed byte slice.

use crate::error::{ForyError, Result};

/// A reference into an existing slice of bytes.
///
/// Every decoder in the crate reads through a viewer. The cursor only moves
/// forward; there is no seek back except by creating a new viewer with [ByteViewer::at].
#[derive(Debug, Clone)]
pub struct ByteViewer<'arr> {
    slice: &'arr [u8],
    offset: usize,
}

/// Impl little-endian fixed width reads
macro_rules! read_le {
    ($fn_name: ident, $num_type: ty) => {
        #[doc = concat!("Read a little-endian `", stringify!($num_type), "` and advance.")]
        pub fn $fn_name(&mut self) -> Result<$num_type> {
            const NUM_BYTES: usize = std::mem::size_of::<$num_type>();
            Ok(<$num_type>::from_le_bytes(self.next_bytes_fixed::<NUM_BYTES>()?))
        }
    };
}

impl<'arr> ByteViewer<'arr> {
    /// Create a new viewer on a byte slice
    pub fn from_slice(s: &'arr [u8]) -> Self {
        Self { slice: s, offset: 0 }
    }

    /// Create a viewer on the same slice, starting at `offset`.
    pub fn at(s: &'arr [u8], offset: usize) -> Self {
        Self {
            slice: s,
            offset: offset.min(s.len()),
        }
    }

    /// The full underlying slice, independent of the cursor.
    pub fn slice(&self) -> &'arr [u8] {
        self.slice
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Number of bytes left in the view.
    pub fn distance_to_end(&self) -> usize {
        self.slice.len() - self.offset
    }

    pub fn is_end(&self) -> bool {
        self.distance_to_end() == 0
    }

    /// Returns the remainder of the slice without advancing.
    pub fn rest(&self) -> &'arr [u8] {
        &self.slice[self.offset..]
    }

    /// Peek at the next byte in the slice
    pub fn peek(&self) -> Option<u8> {
        self.slice.get(self.offset).copied()
    }

    fn require(&self, size: usize) -> Result<()> {
        match self.distance_to_end() >= size {
            true => Ok(()),
            false => Err(ForyError::UnexpectedEof {
                needed: size - self.distance_to_end(),
            }),
        }
    }

    /// Advance the view on the underlying slice.
    pub fn advance(&mut self, steps: usize) -> Result<()> {
        self.require(steps)?;
        self.offset += steps;
        Ok(())
    }

    /// Return the next byte and advance the view
    pub fn next_byte(&mut self) -> Result<u8> {
        self.require(1)?;
        let b = self.slice[self.offset];
        self.offset += 1;

        Ok(b)
    }

    /// Returns the next slice of bytes and advances the cursor.
    pub fn next_bytes(&mut self, size: usize) -> Result<&'arr [u8]> {
        self.require(size)?;
        let view = &self.slice[self.offset..(self.offset + size)];
        self.offset += size;

        Ok(view)
    }

    /// Returns a copy of the next slice of bytes as a fixed-size array.
    pub fn next_bytes_fixed<const ARR_SIZE: usize>(&mut self) -> Result<[u8; ARR_SIZE]> {
        let mut arr = [0_u8; ARR_SIZE];
        arr.copy_from_slice(self.next_bytes(ARR_SIZE)?);

        Ok(arr)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.next_byte()? as i8)
    }

    read_le! {read_u16_le, u16}
    read_le! {read_i16_le, i16}
    read_le! {read_u32_le, u32}
    read_le! {read_i32_le, i32}
    read_le! {read_u64_le, u64}
    read_le! {read_i64_le, i64}
    read_le! {read_f32_le, f32}
    read_le! {read_f64_le, f64}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_reads_forward() {
        let bytes = [1_u8, 0x34, 0x12, 0xff, 0xff, 0xff, 0xff, 9];
        let mut viewer = ByteViewer::from_slice(&bytes);

        assert_eq!(viewer.next_byte().unwrap(), 1);
        assert_eq!(viewer.read_u16_le().unwrap(), 0x1234);
        assert_eq!(viewer.read_i32_le().unwrap(), -1);
        assert_eq!(viewer.peek(), Some(9));
        assert_eq!(viewer.distance_to_end(), 1);
        assert_eq!(viewer.next_bytes(1).unwrap(), &[9]);
        assert!(viewer.is_end());
    }

    #[test]
    fn test_viewer_eof() {
        let bytes = [1_u8, 2];
        let mut viewer = ByteViewer::from_slice(&bytes);

        match viewer.read_u32_le() {
            Err(ForyError::UnexpectedEof { needed }) => assert_eq!(needed, 2),
            other => panic!("expected eof, got {:?}", other),
        }
        // failed reads do not move the cursor
        assert_eq!(viewer.position(), 0);
        assert!(viewer.advance(3).is_err());
    }
}
