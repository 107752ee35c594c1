//! Serialized messages as chains of immutable buffer segments.

use std::{
    collections::VecDeque,
    io,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

/// One serialized message.
///
/// A compatible-mode message is three segments sharing one allocation: the bytes
/// before the offset placeholder, the patched offset, and everything after it.
/// Reading through [Buf] or [AsyncBufRead] consumes the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    segments: VecDeque<Bytes>,
}

impl Message {
    pub(crate) fn single(bytes: Bytes) -> Self {
        Self {
            segments: VecDeque::from([bytes]),
        }
    }

    /// Freeze `buffer` and replace the 4 bytes at `position` with `offset`, without copying.
    pub(crate) fn patched(buffer: BytesMut, position: usize, offset: u32) -> Self {
        let mut post = buffer.freeze();
        let pre = post.split_to(position);
        post.advance(4);

        Self {
            segments: VecDeque::from([pre, Bytes::copy_from_slice(&offset.to_le_bytes()), post]),
        }
    }

    /// Remaining segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &Bytes> {
        self.segments.iter()
    }

    /// Remaining length in bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the remaining bytes into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }

    /// Flush every segment to `sink`. The message is left untouched.
    pub async fn write_to<W: AsyncWrite + Unpin>(&self, sink: &mut W) -> io::Result<()> {
        for segment in &self.segments {
            sink.write_all(segment).await?;
        }
        sink.flush().await
    }

    fn drop_empty(&mut self) {
        while self.segments.front().is_some_and(Bytes::is_empty) {
            self.segments.pop_front();
        }
    }
}

impl Buf for Message {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn chunk(&self) -> &[u8] {
        self.segments
            .iter()
            .find(|segment| !segment.is_empty())
            .map(|segment| segment.as_ref())
            .unwrap_or_default()
    }

    fn advance(&mut self, mut cnt: usize) {
        while cnt > 0 {
            self.drop_empty();
            let Some(front) = self.segments.front_mut() else {
                panic!("advance past the end of the message");
            };
            let step = cnt.min(front.len());
            front.advance(step);
            cnt -= step;
        }
        self.drop_empty();
    }
}

impl AsyncRead for Message {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        while buf.remaining() > 0 && this.has_remaining() {
            let chunk = this.chunk();
            let n = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..n]);
            this.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

impl AsyncBufRead for Message {
    fn poll_fill_buf(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        this.drop_empty();
        Poll::Ready(Ok(Buf::chunk(&*this)))
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        self.get_mut().advance(amt)
    }
}
