//! File access abstractions used by encode and prove.
//!
//! The engine never touches the filesystem directly: `encode` consumes a
//! [`SimpleFile`] sequentially, and `prove` issues positioned reads through a
//! [`SeekableFile`]. [`StreamFile`] adapts any [`std::io::Read`] (plus
//! [`Seek`](std::io::Seek) where needed), so plain files, sockets, and
//! in-memory cursors all work.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use crate::error::Result;

/// Sequential byte source.
pub trait SimpleFile {
    /// Fill `buf` as fully as the underlying stream allows and return the
    /// number of bytes written. A short count signals end of input; zero
    /// means the stream is exhausted.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Positioned byte source.
pub trait SeekableFile: SimpleFile {
    /// Seek to `offset` from the start and report the position actually
    /// reached. Callers detect failure by comparing the result with the
    /// requested offset.
    fn seek(&mut self, offset: u64) -> Result<u64>;

    /// Bytes between the current position and the end of the stream.
    fn bytes_remaining(&mut self) -> Result<u64>;
}

/// Adapter exposing a [`Read`] stream as a [`SimpleFile`] (and, when the
/// inner type also implements [`Seek`], as a [`SeekableFile`]).
pub struct StreamFile<R> {
    inner: R,
}

impl<R> StreamFile<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> SimpleFile for StreamFile<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Seek> SeekableFile for StreamFile<R> {
    fn seek(&mut self, offset: u64) -> Result<u64> {
        Ok(self.inner.seek(SeekFrom::Start(offset))?)
    }

    fn bytes_remaining(&mut self) -> Result<u64> {
        let pos = self.inner.stream_position()?;
        let end = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(end.saturating_sub(pos))
    }
}
