//! Binary layout and (de)serialization of `meta.idx`, the small fixed+variable
//! length file that anchors an index set to the source file it was built
//! from and carries the handful of facts that are awkward to re-derive from
//! the column streams alone (dimensions, flags, ragged rows).

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::options::IndexWidth;

const MAGIC: &[u8; 6] = b"LZCSV\0";
const VERSION: u8 = 1;

#[derive(Debug, Clone)]
pub(crate) struct Meta {
    pub width: IndexWidth,
    pub skip_headers: bool,
    pub unquote: bool,
    pub rows: u64,
    pub cols: u64,
    pub source_path: PathBuf,
    pub source_size: u64,
    pub source_mtime_sec: u64,
    pub source_mtime_nsec: u32,
    /// Sparse per-row records for rows whose observed field count differs
    /// from `cols`: `(row, observed_width, overflow_start)`. `overflow_start`
    /// is the raw stored offset of the first *discarded* field of a row with
    /// *too many* fields (needed to bound the last configured column's end
    /// without rescanning); it is `0` when `observed_width <= cols`.
    pub ragged_rows: Vec<RaggedRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RaggedRow {
    pub row: u64,
    pub observed_width: u64,
    pub overflow_start: u64,
}

impl Meta {
    pub fn for_source(source_path: &Path, width: IndexWidth, skip_headers: bool, unquote: bool) -> Result<Self> {
        let metadata = fs::metadata(source_path)?;
        let mtime = metadata.modified()?.duration_since(UNIX_EPOCH).unwrap_or_default();

        Ok(Self {
            width,
            skip_headers,
            unquote,
            rows: 0,
            cols: 0,
            source_path: source_path.to_path_buf(),
            source_size: metadata.len(),
            source_mtime_sec: mtime.as_secs(),
            source_mtime_nsec: mtime.subsec_nanos(),
            ragged_rows: Vec::new(),
        })
    }

    /// Whether `source_path` still matches the size/mtime this metadata was
    /// built from, i.e. whether the on-disk index set is still valid.
    pub fn matches_source(&self) -> Result<bool> {
        let metadata = match fs::metadata(&self.source_path) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(false),
        };
        let mtime = metadata.modified()?.duration_since(UNIX_EPOCH).unwrap_or_default();

        Ok(metadata.len() == self.source_size
            && mtime.as_secs() == self.source_mtime_sec
            && mtime.subsec_nanos() == self.source_mtime_nsec)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.push(self.width.bytes());
        buf.push(self.skip_headers as u8);
        buf.push(self.unquote as u8);
        buf.extend_from_slice(&self.rows.to_le_bytes());
        buf.extend_from_slice(&self.cols.to_le_bytes());

        let path_bytes = self.source_path.to_string_lossy().into_owned().into_bytes();
        buf.extend_from_slice(&(path_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&path_bytes);

        buf.extend_from_slice(&self.source_size.to_le_bytes());
        buf.extend_from_slice(&self.source_mtime_sec.to_le_bytes());
        buf.extend_from_slice(&self.source_mtime_nsec.to_le_bytes());

        buf.extend_from_slice(&(self.ragged_rows.len() as u32).to_le_bytes());
        for ragged in &self.ragged_rows {
            buf.extend_from_slice(&ragged.row.to_le_bytes());
            buf.extend_from_slice(&ragged.observed_width.to_le_bytes());
            buf.extend_from_slice(&ragged.overflow_start.to_le_bytes());
        }

        fs::write(path, buf)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let mut file = fs::File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;

        let mut cursor = Cursor::new(&buf);

        let magic = cursor.take(6)?;
        if magic != MAGIC.as_slice() {
            return Err(Error::corrupt_index("bad meta.idx magic"));
        }

        let _version = cursor.take(1)?[0];
        let width = IndexWidth::from_bytes(cursor.take(1)?[0])
            .ok_or_else(|| Error::corrupt_index("unknown index width in meta.idx"))?;
        let skip_headers = cursor.take(1)?[0] != 0;
        let unquote = cursor.take(1)?[0] != 0;
        let rows = cursor.take_u64()?;
        let cols = cursor.take_u64()?;

        let path_len = cursor.take_u32()? as usize;
        let source_path = PathBuf::from(String::from_utf8_lossy(cursor.take(path_len)?).into_owned());

        let source_size = cursor.take_u64()?;
        let source_mtime_sec = cursor.take_u64()?;
        let source_mtime_nsec = cursor.take_u32()?;

        let ragged_count = cursor.take_u32()? as usize;
        let mut ragged_rows = Vec::with_capacity(ragged_count);
        for _ in 0..ragged_count {
            let row = cursor.take_u64()?;
            let observed_width = cursor.take_u64()?;
            let overflow_start = cursor.take_u64()?;
            ragged_rows.push(RaggedRow { row, observed_width, overflow_start });
        }

        Ok(Self {
            width,
            skip_headers,
            unquote,
            rows,
            cols,
            source_path,
            source_size,
            source_mtime_sec,
            source_mtime_nsec,
            ragged_rows,
        })
    }
}

/// A minimal forward-only cursor over an in-memory buffer, just enough to
/// decode `meta.idx`'s fixed and variable-length fields without pulling in
/// a serialization crate for a format this small.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::corrupt_index("meta.idx truncated"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u32(&mut self) -> Result<u32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(u32::from_le_bytes(bytes))
    }

    fn take_u64(&mut self) -> Result<u64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(u64::from_le_bytes(bytes))
    }
}
