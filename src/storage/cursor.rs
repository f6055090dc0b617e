/// Position inside a [`ChunkedBuffer`](super::ChunkedBuffer), expressed as a chunk index and an
/// offset within that chunk.
///
/// Sequential readers keep a cursor instead of a flat sample index so that the division needed
/// to locate a sample is paid once when the cursor is created rather than on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkCursor {
    /// Index of the chunk the cursor points into.
    pub chunk: usize,
    /// Sample offset within the chunk.
    pub offset: usize,
}

impl ChunkCursor {
    /// Resolves a flat sample index into a cursor for chunks of `chunk_len` samples.
    #[inline]
    pub fn at(index: u64, chunk_len: usize) -> Self {
        let chunk_len = chunk_len as u64;
        Self {
            chunk: (index / chunk_len) as usize,
            offset: (index % chunk_len) as usize,
        }
    }

    /// Moves the cursor forward by `count` samples, carrying into following chunks as needed.
    #[inline]
    pub fn advance(&mut self, count: u64, chunk_len: usize) {
        let offset = self.offset as u64 + count;
        let chunk_len = chunk_len as u64;
        if offset < chunk_len {
            self.offset = offset as usize;
        } else {
            self.chunk += (offset / chunk_len) as usize;
            self.offset = (offset % chunk_len) as usize;
        }
    }

    /// Converts the cursor back into a flat sample index.
    #[inline]
    pub fn index(&self, chunk_len: usize) -> u64 {
        self.chunk as u64 * chunk_len as u64 + self.offset as u64
    }
}
