//! Uniform access to a source file's bytes, backed either by a memory map
//! or by a plain buffered reader, behind the same `fill_buf`/`consume` shape
//! the teacher's [`crate::buffer::BufReaderWithPosition`] already uses for
//! sequential access.

use std::fs::File;

use memmap2::Mmap;

use crate::buffer::BufReaderWithPosition;
use crate::error::Result;

pub(crate) enum ByteSource {
    Mapped { mmap: Mmap, pos: usize },
    Streamed(BufReaderWithPosition<File>),
}

impl ByteSource {
    pub fn mapped(file: &File) -> Result<Self> {
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self::Mapped { mmap, pos: 0 })
    }

    pub fn streamed(file: File, buffer_size: usize) -> Self {
        Self::Streamed(BufReaderWithPosition::with_capacity(buffer_size, file))
    }

    #[inline(always)]
    pub fn position(&self) -> u64 {
        match self {
            Self::Mapped { pos, .. } => *pos as u64,
            Self::Streamed(inner) => inner.position(),
        }
    }

    /// Returns the next slice of unread bytes, or an empty slice at EOF.
    /// For a memory-mapped source this returns the *entire* remaining file
    /// on the first call: no copy happens, it is just a view into the
    /// existing mapping, so there is no streaming benefit to chunking it.
    #[inline(always)]
    pub fn fill_buf(&mut self) -> Result<&[u8]> {
        match self {
            Self::Mapped { mmap, pos } => Ok(&mmap[*pos..]),
            Self::Streamed(inner) => Ok(inner.fill_buf()?),
        }
    }

    #[inline(always)]
    pub fn consume(&mut self, amt: usize) {
        match self {
            Self::Mapped { pos, .. } => *pos += amt,
            Self::Streamed(inner) => inner.consume(amt),
        }
    }
}
