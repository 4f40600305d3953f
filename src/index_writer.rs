//! Append-only writers for the fixed-width `anchors.idx` and `col_<k>.idx`
//! files that make up an index set. Each writer buffers through a
//! `BufWriter` and flushes in bulk on `finish`, the same shape the
//! teacher's output path used for writing CSV records.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::options::IndexWidth;

const QUOTED_BIT_16: u16 = 1 << 15;
const QUOTED_BIT_32: u32 = 1 << 31;
const QUOTED_BIT_64: u64 = 1 << 63;

/// Appends plain offsets (the anchor stream: one entry per row, plus the
/// trailing sentinel equal to the file's total length).
pub(crate) struct AnchorWriter {
    out: BufWriter<File>,
    width: IndexWidth,
}

impl AnchorWriter {
    pub fn create(path: &Path, width: IndexWidth) -> Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            width,
        })
    }

    pub fn push(&mut self, offset: u64) -> Result<()> {
        if offset > self.width.max_offset() {
            return Err(Error::index_overflow(offset, self.width.bytes() * 8));
        }

        match self.width {
            IndexWidth::W16 => self.out.write_all(&(offset as u16).to_le_bytes())?,
            IndexWidth::W32 => self.out.write_all(&(offset as u32).to_le_bytes())?,
            IndexWidth::W64 => self.out.write_all(&offset.to_le_bytes())?,
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Appends (offset, quoted) pairs for a single column, packing the quoted
/// flag into the top bit of each stored offset.
pub(crate) struct ColumnWriter {
    out: BufWriter<File>,
    width: IndexWidth,
}

impl ColumnWriter {
    pub fn create(path: &Path, width: IndexWidth) -> Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            width,
        })
    }

    pub fn push(&mut self, offset: u64, quoted: bool) -> Result<()> {
        if offset > self.width.max_offset() {
            return Err(Error::index_overflow(offset, self.width.bytes() * 8));
        }

        match self.width {
            IndexWidth::W16 => {
                let mut value = offset as u16;
                if quoted {
                    value |= QUOTED_BIT_16;
                }
                self.out.write_all(&value.to_le_bytes())?;
            }
            IndexWidth::W32 => {
                let mut value = offset as u32;
                if quoted {
                    value |= QUOTED_BIT_32;
                }
                self.out.write_all(&value.to_le_bytes())?;
            }
            IndexWidth::W64 => {
                let mut value = offset;
                if quoted {
                    value |= QUOTED_BIT_64;
                }
                self.out.write_all(&value.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Decode a single stored entry as `(offset, quoted)`, masking off the
/// reserved top bit. Used by both the column writer's own tests and the
/// query-time reader.
pub(crate) fn decode_column_entry(raw: u64, width: IndexWidth) -> (u64, bool) {
    match width {
        IndexWidth::W16 => {
            let value = raw as u16;
            ((value & !QUOTED_BIT_16) as u64, value & QUOTED_BIT_16 != 0)
        }
        IndexWidth::W32 => {
            let value = raw as u32;
            ((value & !QUOTED_BIT_32) as u64, value & QUOTED_BIT_32 != 0)
        }
        IndexWidth::W64 => (raw & !QUOTED_BIT_64, raw & QUOTED_BIT_64 != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_anchor_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("anchors.idx");

        let mut writer = AnchorWriter::create(&path, IndexWidth::W32)?;
        for offset in [0u64, 10, 25, 40] {
            writer.push(offset)?;
        }
        writer.finish()?;

        let bytes = fs::read(&path)?;
        assert_eq!(bytes.len(), 4 * 4);
        let values: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values, vec![0, 10, 25, 40]);
        Ok(())
    }

    #[test]
    fn test_column_quoted_bit() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("col_0.idx");

        let mut writer = ColumnWriter::create(&path, IndexWidth::W16)?;
        writer.push(5, false)?;
        writer.push(200, true)?;
        writer.finish()?;

        let bytes = fs::read(&path)?;
        let values: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
            .collect();

        assert_eq!(decode_column_entry(values[0] as u64, IndexWidth::W16), (5, false));
        assert_eq!(decode_column_entry(values[1] as u64, IndexWidth::W16), (200, true));
        Ok(())
    }

    #[test]
    fn test_overflow_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("anchors.idx");
        let mut writer = AnchorWriter::create(&path, IndexWidth::W16).unwrap();
        assert!(writer.push(1 << 20).is_err());
    }
}
