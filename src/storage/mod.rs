//! Append-only sample storage split into fixed-capacity chunks.

use std::fmt;
use std::mem;
use std::ops::Range;

use tracing::debug;

use crate::error::{Error, Result};

mod cursor;

pub use cursor::ChunkCursor;

/// Upper bound for the size of a single storage chunk in bytes.
pub const MAX_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Growable sequence of fixed-capacity chunks holding samples of type `T`.
///
/// Stored samples are never moved once written: growth only ever adds chunks. A fresh chunk is
/// allocated as soon as the current one fills up, so the last chunk always has room for at least
/// one more sample until the buffer is closed and compacted.
pub struct ChunkedBuffer<T> {
    chunks: Vec<Vec<T>>,
    chunk_len: usize,
    len: u64,
    closed: bool,
}

impl<T: Copy> ChunkedBuffer<T> {
    /// Creates an empty buffer whose chunks hold at most `max_chunk_bytes` bytes.
    ///
    /// The per-chunk sample count is rounded down to a multiple of `alignment` so that blocks of
    /// `alignment` samples starting at aligned indices never straddle two chunks.
    pub fn new(max_chunk_bytes: usize, alignment: usize) -> Result<Self> {
        let unit_size = mem::size_of::<T>();
        if unit_size == 0 {
            return Err(Error::config("sample unit size may not be zero"));
        }
        if alignment == 0 {
            return Err(Error::config("chunk alignment may not be zero"));
        }
        if max_chunk_bytes > isize::MAX as usize {
            return Err(Error::config(format!(
                "chunk of {max_chunk_bytes} bytes exceeds the largest possible allocation"
            )));
        }
        let chunk_len = (max_chunk_bytes / unit_size) / alignment * alignment;
        if chunk_len == 0 {
            return Err(Error::config(format!(
                "chunk of {max_chunk_bytes} bytes cannot hold {alignment} samples of {unit_size} bytes"
            )));
        }
        Ok(Self {
            chunks: Vec::new(),
            chunk_len,
            len: 0,
            closed: false,
        })
    }

    /// Size of a single sample in bytes.
    #[inline]
    pub fn unit_size(&self) -> usize {
        mem::size_of::<T>()
    }

    /// Number of samples a full chunk holds.
    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Chunk capacity in bytes.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_len * self.unit_size()
    }

    /// Number of samples stored.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if no samples have been stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks currently allocated.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` once the buffer stopped accepting samples.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Stops accepting further samples. Compaction is only possible on a closed buffer.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Bytes currently held by chunk allocations.
    pub fn memory_usage(&self) -> usize {
        self.chunks
            .iter()
            .map(|chunk| chunk.capacity() * self.unit_size())
            .sum()
    }

    /// Appends `data` to the end of the buffer.
    ///
    /// Every chunk the append needs, including the eagerly allocated successor of a chunk that
    /// this append fills completely, is reserved before any sample is copied. If one of those
    /// allocations fails the buffer is left untouched.
    pub fn append(&mut self, data: &[T]) -> Result<()> {
        if self.closed {
            return Err(Error::Completed);
        }
        if data.is_empty() {
            return Ok(());
        }

        let new_len = self.len + data.len() as u64;
        let needed = (new_len / self.chunk_len as u64) as usize + 1;
        if needed > self.chunks.len() {
            let fresh = self.allocate_chunks(needed - self.chunks.len())?;
            self.chunks.extend(fresh);
        }

        let mut cursor = ChunkCursor::at(self.len, self.chunk_len);
        let mut remaining = data;
        while !remaining.is_empty() {
            let take = remaining.len().min(self.chunk_len - cursor.offset);
            let chunk = &mut self.chunks[cursor.chunk];
            debug_assert_eq!(chunk.len(), cursor.offset);
            chunk.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            cursor.advance(take as u64, self.chunk_len);
        }
        self.len = new_len;
        Ok(())
    }

    fn allocate_chunks(&mut self, count: usize) -> Result<Vec<Vec<T>>> {
        let chunk_size = self.chunk_size();
        self.chunks
            .try_reserve(count)
            .map_err(|err| Error::alloc(count * mem::size_of::<Vec<T>>(), err))?;
        let mut fresh = Vec::new();
        fresh
            .try_reserve_exact(count)
            .map_err(|err| Error::alloc(count * mem::size_of::<Vec<T>>(), err))?;
        for _ in 0..count {
            let mut chunk = Vec::new();
            chunk
                .try_reserve_exact(self.chunk_len)
                .map_err(|err| Error::alloc(chunk_size, err))?;
            fresh.push(chunk);
        }
        debug!(
            count,
            chunk_size,
            total_chunks = self.chunks.len() + count,
            "allocated sample chunks"
        );
        Ok(fresh)
    }

    /// Returns the sample at `index`, if stored.
    #[inline]
    pub fn get(&self, index: u64) -> Option<T> {
        if index >= self.len {
            return None;
        }
        self.value_at(ChunkCursor::at(index, self.chunk_len))
    }

    /// Returns the sample at `index` or an [`Error::OutOfRange`].
    pub fn sample_at(&self, index: u64) -> Result<T> {
        self.get(index)
            .ok_or_else(|| Error::out_of_range(index, self.len))
    }

    /// Returns the sample a cursor points at.
    #[inline]
    pub fn value_at(&self, cursor: ChunkCursor) -> Option<T> {
        self.chunks.get(cursor.chunk)?.get(cursor.offset).copied()
    }

    /// Returns a cursor positioned at `index`.
    pub fn cursor(&self, index: u64) -> ChunkCursor {
        ChunkCursor::at(index, self.chunk_len)
    }

    /// Copies `dest.len()` samples starting at `start` into `dest`.
    pub fn read_range(&self, start: u64, dest: &mut [T]) -> Result<()> {
        let end = self.checked_end(start, dest.len())?;
        let mut filled = 0;
        for piece in self.slices(start..end) {
            dest[filled..filled + piece.len()].copy_from_slice(piece);
            filled += piece.len();
        }
        Ok(())
    }

    /// Iterates over the contiguous runs of samples making up `range`, one slice per chunk
    /// touched.
    pub fn slices(&self, range: Range<u64>) -> Slices<'_, T> {
        let end = range.end.min(self.len);
        Slices {
            buffer: self,
            cursor: ChunkCursor::at(range.start, self.chunk_len),
            remaining: end.saturating_sub(range.start),
        }
    }

    fn checked_end(&self, start: u64, count: usize) -> Result<u64> {
        let end = start
            .checked_add(count as u64)
            .ok_or_else(|| Error::range("range end overflows"))?;
        if end > self.len {
            return Err(Error::range(format!(
                "samples {start}..{end} exceed stored count {}",
                self.len
            )));
        }
        Ok(end)
    }

    /// Releases the unused tail of the last chunk. Returns the number of bytes released.
    ///
    /// Only a closed buffer is compacted; an open buffer is left as is and `0` is returned.
    pub fn compact(&mut self) -> usize {
        if !self.closed {
            return 0;
        }
        let before = self.memory_usage();
        while self.chunks.last().is_some_and(|chunk| chunk.is_empty()) {
            self.chunks.pop();
        }
        if let Some(last) = self.chunks.last_mut() {
            last.shrink_to_fit();
        }
        self.chunks.shrink_to_fit();
        let released = before.saturating_sub(self.memory_usage());
        debug!(
            released,
            chunks = self.chunks.len(),
            "compacted sample storage"
        );
        released
    }
}

impl<T> fmt::Debug for ChunkedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedBuffer")
            .field("len", &self.len)
            .field("chunk_len", &self.chunk_len)
            .field("chunks", &self.chunks.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Iterator returned by [`ChunkedBuffer::slices`].
pub struct Slices<'a, T> {
    buffer: &'a ChunkedBuffer<T>,
    cursor: ChunkCursor,
    remaining: u64,
}

impl<'a, T: Copy> Iterator for Slices<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.buffer.chunks.get(self.cursor.chunk)?;
        let available = chunk.len().checked_sub(self.cursor.offset)?;
        let take = (available as u64).min(self.remaining) as usize;
        if take == 0 {
            return None;
        }
        let piece = &chunk[self.cursor.offset..self.cursor.offset + take];
        self.remaining -= take as u64;
        self.cursor.advance(take as u64, self.buffer.chunk_len);
        Some(piece)
    }
}
