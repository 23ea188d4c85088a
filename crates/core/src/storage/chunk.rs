//! Fixed-size chunking of a byte source.

use std::path::Path;

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Pulls fixed-size chunks out of an async byte source.
///
/// Every chunk is exactly `chunk_size` bytes except the last, which holds the
/// non-empty remainder. Bytes from a read that crosses a chunk boundary stay
/// buffered for the next chunk, so at most about two chunks are held at once.
/// The sequence ends after the last chunk or after the first read failure.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    buffer: BytesMut,
    finished: bool,
    bytes_read: u64,
}

impl ChunkReader<File> {
    /// Open a file on disk for chunked reading.
    ///
    /// # Errors
    ///
    /// Returns `StreamReadFailure` if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self, StorageError> {
        let file = File::open(path)
            .await
            .map_err(StorageError::StreamReadFailure)?;
        Ok(Self::new(file, chunk_size))
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wrap a reader. A zero chunk size is treated as one byte.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            reader,
            chunk_size,
            buffer: BytesMut::with_capacity(chunk_size),
            finished: false,
            bytes_read: 0,
        }
    }

    /// Next chunk, or `None` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns `StreamReadFailure` if the underlying read fails. The sequence
    /// is terminated afterwards.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError> {
        while !self.finished && self.buffer.len() < self.chunk_size {
            self.buffer.reserve(self.chunk_size - self.buffer.len());
            match self.reader.read_buf(&mut self.buffer).await {
                Ok(0) => self.finished = true,
                Ok(n) => self.bytes_read += n as u64,
                Err(e) => {
                    self.finished = true;
                    self.buffer.clear();
                    return Err(StorageError::StreamReadFailure(e));
                }
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }

        let len = self.buffer.len().min(self.chunk_size);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Total bytes pulled from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Configured chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
