//! Random-access reader over one index set: the mmap-backed source file
//! plus the anchor stream, per-column streams, and header blob that
//! [`crate::indexer`] built for it.
//!
//! Every query (`cell`, `row_iter`, `col_iter`, `slice`) is O(1) expected
//! time: a handful of mmap reads, never a rescan of the source file.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::index_writer::decode_column_entry;
use crate::indexer;
use crate::meta::{Meta, RaggedRow};
use crate::options::{IndexDir, IndexWidth, LazyCsvBuilder};
use crate::slice::{ResolvedSlice, SliceIter};
use crate::utils::{resolve_index, terminator_len, unescape};

enum IndexLocation {
    Ephemeral(TempDir),
    At(PathBuf),
}

impl IndexLocation {
    fn path(&self) -> &Path {
        match self {
            Self::Ephemeral(dir) => dir.path(),
            Self::At(path) => path,
        }
    }
}

/// A handle onto one CSV file's index set, giving O(1) random access to
/// any cell, row, or column without ever loading the file or a decoded
/// representation of it into memory.
///
/// Build one with [`LazyCsvBuilder`]:
///
/// ```no_run
/// use lazycsv::LazyCsvBuilder;
///
/// let csv = LazyCsvBuilder::new().open("data.csv")?;
/// let first_cell = csv.cell(0, 0)?;
/// # Ok::<(), lazycsv::Error>(())
/// ```
pub struct LazyCsv {
    // Dropped first: these hold open mappings into files under
    // `index_dir`, so they must go before `index_dir` tries to remove
    // that directory (when ephemeral).
    columns: Vec<Mmap>,
    anchors: Mmap,
    index_dir: IndexLocation,
    meta: Meta,
    headers: Vec<Vec<u8>>,
    ragged: HashMap<u64, RaggedRow>,
    name: Vec<u8>,
    unquote: bool,
    quote: u8,
    // Dropped last.
    source: Option<Mmap>,
    #[allow(dead_code)]
    source_path: PathBuf,
}

impl LazyCsv {
    pub fn open(path: PathBuf, opts: LazyCsvBuilder) -> Result<Self> {
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{}: not a regular file", path.display()),
            )
            .into());
        }
        let canonical_path = fs::canonicalize(&path)?;

        let index_location = match &opts.index_dir {
            IndexDir::Ephemeral => IndexLocation::Ephemeral(TempDir::new()?),
            IndexDir::At(dir) => {
                if let Some(parent) = dir.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        return Err(Error::bad_argument("index_dir's parent directory does not exist"));
                    }
                }
                fs::create_dir_all(dir)?;
                IndexLocation::At(dir.clone())
            }
        };

        let meta_path = index_location.path().join("meta.idx");
        let had_existing_meta = meta_path.exists();
        let reusable = had_existing_meta
            .then(|| Meta::read_from(&meta_path).ok())
            .flatten()
            .filter(|m| {
                m.matches_source().unwrap_or(false) && m.skip_headers == opts.skip_headers && m.unquote == opts.unquote
            });

        let (meta, headers) = match reusable {
            Some(meta) => {
                let headers = read_headers_blob(&index_location.path().join("headers.blob"))?;
                (meta, headers)
            }
            None => {
                if had_existing_meta {
                    log::info!(
                        "index set at {} is stale or built with different options, rebuilding",
                        index_location.path().display()
                    );
                }
                match build_and_persist(&canonical_path, &opts, index_location.path(), &meta_path) {
                    Ok(result) => result,
                    Err(err) => {
                        // spec.md §7: a fatal indexing error discards the
                        // index, partial files included. An ephemeral
                        // `index_dir` gets this for free from `TempDir`'s
                        // `Drop`, but a caller-chosen one needs it done
                        // explicitly so it isn't left holding a corrupt,
                        // half-built index set.
                        remove_partial_index(index_location.path());
                        return Err(err);
                    }
                }
            }
        };

        let source = if meta.source_size == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&File::open(&canonical_path)?)? })
        };

        let anchors = unsafe { Mmap::map(&File::open(index_location.path().join("anchors.idx"))?)? };

        let mut columns = Vec::with_capacity(meta.cols as usize);
        for k in 0..meta.cols {
            let file = File::open(index_location.path().join(format!("col_{}.idx", k)))?;
            columns.push(unsafe { Mmap::map(&file)? });
        }

        let ragged = meta.ragged_rows.iter().map(|r| (r.row, *r)).collect();
        let name = path_bytes(&canonical_path);

        Ok(Self {
            columns,
            anchors,
            index_dir: index_location,
            meta,
            headers,
            ragged,
            name,
            unquote: opts.unquote,
            quote: opts.quote,
            source,
            source_path: canonical_path,
        })
    }

    pub fn headers(&self) -> &[Vec<u8>] {
        &self.headers
    }

    pub fn rows(&self) -> u64 {
        self.meta.rows
    }

    pub fn cols(&self) -> u64 {
        self.meta.cols
    }

    /// The absolute path of the source file, as raw bytes.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// The directory the on-disk index set lives in, whether ephemeral or
    /// caller-chosen.
    pub fn index_dir(&self) -> &Path {
        self.index_dir.path()
    }

    pub fn cell(&self, row: i64, col: i64) -> Result<Cow<'_, [u8]>> {
        let r = resolve_checked(row, self.meta.rows, "row")?;
        let c = resolve_checked(col, self.meta.cols, "col")?;

        let (start, end, quoted) = self.cell_span(r, c);
        let bytes = self.source_slice(start, end);

        Ok(if self.unquote && quoted {
            unescape(bytes, self.quote)
        } else {
            Cow::Borrowed(bytes)
        })
    }

    pub fn col_iter(&self, col: i64, reversed: bool) -> Result<ColIter<'_>> {
        let c = resolve_checked(col, self.meta.cols, "col")?;
        let step = if reversed { Some(-1) } else { None };
        let positions = ResolvedSlice::resolve(None, None, step, self.meta.rows).indices();
        Ok(ColIter { reader: self, col: c, positions })
    }

    pub fn row_iter(&self, row: i64, reversed: bool) -> Result<RowIter<'_>> {
        let r = resolve_checked(row, self.meta.rows, "row")?;
        let step = if reversed { Some(-1) } else { None };
        let positions = ResolvedSlice::resolve(None, None, step, self.meta.cols).indices();
        Ok(RowIter { reader: self, row: r, positions })
    }

    /// Half-open, Python-`slice`-style access over both dimensions at
    /// once: `(start, stop, step)` for rows, then for columns. `None`
    /// means "unspecified", negative values count from the end, and
    /// out-of-range bounds clamp rather than error (as opposed to
    /// [`Self::cell`]'s single out-of-range index, which is an error).
    pub fn slice(
        &self,
        rows: (Option<i64>, Option<i64>, Option<i64>),
        cols: (Option<i64>, Option<i64>, Option<i64>),
    ) -> GridSlice<'_> {
        let row_positions = ResolvedSlice::resolve(rows.0, rows.1, rows.2, self.meta.rows).indices();
        let col_positions: Vec<u64> = ResolvedSlice::resolve(cols.0, cols.1, cols.2, self.meta.cols)
            .indices()
            .collect();
        GridSlice { reader: self, rows: row_positions, cols: col_positions }
    }

    /// Resolve a cell's byte span, routing ragged rows to the
    /// empty-cell/overflow-aware paths before falling back to the generic
    /// next-column/next-row formula.
    fn cell_span(&self, r: u64, c: u64) -> (u64, u64, bool) {
        if let Some(ragged) = self.ragged.get(&r).copied() {
            if c >= ragged.observed_width {
                let end = self.row_content_end(r);
                return (end, end, false);
            }
            if ragged.observed_width < self.meta.cols && c == ragged.observed_width - 1 {
                let (raw_start, quoted) = self.column_entry(c, r);
                let strip = self.unquote && quoted;
                let start = raw_start + if strip { 1 } else { 0 };
                let end = self.row_content_end(r) - if strip { 1 } else { 0 };
                return (start, end, quoted);
            }
            if ragged.observed_width > self.meta.cols && c == self.meta.cols - 1 {
                let (raw_start, quoted) = self.column_entry(c, r);
                let strip = self.unquote && quoted;
                let start = raw_start + if strip { 1 } else { 0 };
                let end = ragged.overflow_start - 1 - if strip { 1 } else { 0 };
                return (start, end, quoted);
            }
        }
        self.normal_cell_span(r, c)
    }

    /// `end`'s stripping decision is keyed on *this* column's own quoted
    /// flag, not the next column's: the byte right before the next
    /// column's stored start is always the delimiter, regardless of how
    /// the next field is quoted, so only whether *this* field's own
    /// closing quote needs excluding matters here.
    fn normal_cell_span(&self, r: u64, c: u64) -> (u64, u64, bool) {
        let (raw_start, quoted) = self.column_entry(c, r);
        let strip = self.unquote && quoted;
        let start = raw_start + if strip { 1 } else { 0 };
        let end = if c + 1 < self.meta.cols {
            let (next_start, _) = self.column_entry(c + 1, r);
            next_start - 1 - if strip { 1 } else { 0 }
        } else {
            self.row_content_end(r) - if strip { 1 } else { 0 }
        };
        (start, end, quoted)
    }

    /// The offset just past this row's last content byte, i.e. where its
    /// terminator (`\r\n`, `\n`, `\r`, or nothing at EOF) begins.
    fn row_content_end(&self, r: u64) -> u64 {
        let next_anchor = self.anchor(r + 1);
        let prev = (next_anchor >= 1).then(|| self.source_byte(next_anchor - 1));
        let prev2 = (next_anchor >= 2).then(|| self.source_byte(next_anchor - 2));
        next_anchor - terminator_len(prev, prev2)
    }

    fn anchor(&self, idx: u64) -> u64 {
        read_width_le(&self.anchors, self.meta.width, idx)
    }

    fn column_entry(&self, c: u64, r: u64) -> (u64, bool) {
        let raw = read_width_le(&self.columns[c as usize], self.meta.width, r);
        decode_column_entry(raw, self.meta.width)
    }

    fn source_slice(&self, start: u64, end: u64) -> &[u8] {
        match &self.source {
            Some(mmap) => &mmap[start as usize..end as usize],
            None => &[],
        }
    }

    fn source_byte(&self, offset: u64) -> u8 {
        self.source.as_ref().expect("row_content_end only called when rows > 0")[offset as usize]
    }
}

fn resolve_checked(index: i64, len: u64, what: &'static str) -> Result<u64> {
    match resolve_index(index, len) {
        Some(resolved) if resolved < len => Ok(resolved),
        _ => Err(Error::out_of_range(what, index, len)),
    }
}

fn read_width_le(mmap: &[u8], width: IndexWidth, idx: u64) -> u64 {
    let stride = width.bytes() as usize;
    let offset = idx as usize * stride;
    match width {
        IndexWidth::W16 => u16::from_le_bytes(mmap[offset..offset + 2].try_into().unwrap()) as u64,
        IndexWidth::W32 => u32::from_le_bytes(mmap[offset..offset + 4].try_into().unwrap()) as u64,
        IndexWidth::W64 => u64::from_le_bytes(mmap[offset..offset + 8].try_into().unwrap()),
    }
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Runs one indexing pass and persists its outcome (`meta.idx` plus the
/// header blob) under `index_dir`. Split out of [`LazyCsv::open`] so a
/// failure anywhere in the sequence — the lexing pass itself, or either of
/// the two writes after it — can be treated as one atomic "build index set"
/// step for cleanup purposes.
fn build_and_persist(
    source_path: &Path,
    opts: &LazyCsvBuilder,
    index_dir: &Path,
    meta_path: &Path,
) -> Result<(Meta, Vec<Vec<u8>>)> {
    let outcome = indexer::build(source_path, opts, index_dir)?;
    outcome.meta.write_to(meta_path)?;
    write_headers_blob(&index_dir.join("headers.blob"), &outcome.headers)?;
    Ok((outcome.meta, outcome.headers))
}

/// Removes every file a (possibly partial) index build may have left under
/// `index_dir`, best-effort. Used when a build fails partway through so a
/// caller-chosen `index_dir` isn't left holding a corrupt index set.
fn remove_partial_index(index_dir: &Path) {
    let _ = fs::remove_file(index_dir.join("meta.idx"));
    let _ = fs::remove_file(index_dir.join("headers.blob"));
    let _ = fs::remove_file(index_dir.join("anchors.idx"));

    if let Ok(entries) = fs::read_dir(index_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("col_") && name.ends_with(".idx") {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

fn write_headers_blob(path: &Path, headers: &[Vec<u8>]) -> Result<()> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(headers.len() as u32).to_le_bytes());
    for cell in headers {
        buf.extend_from_slice(&(cell.len() as u32).to_le_bytes());
        buf.extend_from_slice(cell);
    }
    fs::write(path, buf)?;
    Ok(())
}

fn read_headers_blob(path: &Path) -> Result<Vec<Vec<u8>>> {
    let buf = fs::read(path)?;
    let mut pos = 0usize;

    fn take<'a>(pos: &mut usize, n: usize, buf: &'a [u8]) -> Result<&'a [u8]> {
        if *pos + n > buf.len() {
            return Err(Error::corrupt_index("headers.blob truncated"));
        }
        let slice = &buf[*pos..*pos + n];
        *pos += n;
        Ok(slice)
    }

    let count = u32::from_le_bytes(take(&mut pos, 4, &buf)?.try_into().unwrap()) as usize;

    let mut headers = Vec::with_capacity(count);
    for _ in 0..count {
        let len = u32::from_le_bytes(take(&mut pos, 4, &buf)?.try_into().unwrap()) as usize;
        headers.push(take(&mut pos, len, &buf)?.to_vec());
    }
    Ok(headers)
}

/// Cursor over one column's cells, in row order (or reverse). Single-pass
/// and finite.
pub struct ColIter<'a> {
    reader: &'a LazyCsv,
    col: u64,
    positions: SliceIter,
}

impl<'a> Iterator for ColIter<'a> {
    type Item = Result<Cow<'a, [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.positions.next()?;
        Some(self.reader.cell(row as i64, self.col as i64))
    }
}

/// Cursor over one row's cells, in column order (or reverse).
pub struct RowIter<'a> {
    reader: &'a LazyCsv,
    row: u64,
    positions: SliceIter,
}

impl<'a> Iterator for RowIter<'a> {
    type Item = Result<Cow<'a, [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        let col = self.positions.next()?;
        Some(self.reader.cell(self.row as i64, col as i64))
    }
}

/// A rectangular slice over both dimensions, yielded one resolved row at a
/// time as a `Vec` of its resolved cells.
pub struct GridSlice<'a> {
    reader: &'a LazyCsv,
    rows: SliceIter,
    cols: Vec<u64>,
}

impl<'a> Iterator for GridSlice<'a> {
    type Item = Result<Vec<Cow<'a, [u8]>>>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(self.cols.iter().map(|&col| self.reader.cell(row as i64, col as i64)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::LazyCsvBuilder;
    use bstr::ByteSlice;
    use std::io::Write as _;

    fn open_csv(contents: &[u8], configure: impl FnOnce(&mut LazyCsvBuilder)) -> LazyCsv {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();

        let mut builder = LazyCsvBuilder::new();
        configure(&mut builder);
        builder.open(file.path()).unwrap()
    }

    #[test]
    fn test_scenario_basic_grid() {
        let csv = open_csv(b"INDEX,A,B\n0,,2\n,,5", |_| {});
        assert_eq!(csv.headers(), &[b"INDEX".to_vec(), b"A".to_vec(), b"B".to_vec()]);
        assert_eq!(csv.rows(), 2);
        assert_eq!(csv.cols(), 3);

        assert_eq!(csv.cell(0, 0).unwrap().as_ref(), b"0");
        assert_eq!(csv.cell(0, 1).unwrap().as_ref(), b"");
        assert_eq!(csv.cell(0, 2).unwrap().as_ref(), b"2");
        assert_eq!(csv.cell(1, 0).unwrap().as_ref(), b"");
        assert_eq!(csv.cell(1, 1).unwrap().as_ref(), b"");
        assert_eq!(csv.cell(1, 2).unwrap().as_ref(), b"5");
    }

    #[test]
    fn test_scenario_skip_headers_all_empty() {
        let csv = open_csv(b",\n,\n,\n", |b| {
            b.skip_headers(true);
        });
        assert_eq!(csv.rows(), 3);
        assert_eq!(csv.cols(), 2);
        for r in 0..3 {
            for c in 0..2 {
                assert_eq!(csv.cell(r, c).unwrap().as_ref(), b"");
            }
        }
    }

    #[test]
    fn test_scenario_blank_lines() {
        let csv = open_csv(b"HEADER\n\n1\n\n2\n\n\n3\n", |_| {});
        assert_eq!(csv.headers(), &[b"HEADER".to_vec()]);
        let column: Vec<Vec<u8>> = csv
            .col_iter(0, false)
            .unwrap()
            .map(|c| c.unwrap().into_owned())
            .collect();
        assert_eq!(
            column,
            vec![
                b"".to_vec(),
                b"1".to_vec(),
                b"".to_vec(),
                b"2".to_vec(),
                b"".to_vec(),
                b"".to_vec(),
                b"3".to_vec(),
            ]
        );
    }

    #[test]
    fn test_scenario_ragged_short_row() {
        let csv = open_csv(b"x,y,z\r\n1,2\r\n3,1,3\r\n", |b| {
            b.skip_headers(true);
        });
        assert_eq!(csv.rows(), 3);
        assert_eq!(csv.cols(), 3);

        let col0: Vec<Vec<u8>> = csv.col_iter(0, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        let col1: Vec<Vec<u8>> = csv.col_iter(1, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        let col2: Vec<Vec<u8>> = csv.col_iter(2, false).unwrap().map(|c| c.unwrap().into_owned()).collect();

        assert_eq!(col0, vec![b"x".to_vec(), b"1".to_vec(), b"3".to_vec()]);
        assert_eq!(col1, vec![b"y".to_vec(), b"2".to_vec(), b"1".to_vec()]);
        assert_eq!(col2, vec![b"z".to_vec(), b"".to_vec(), b"3".to_vec()]);
    }

    #[test]
    fn test_ragged_long_row_extra_columns_discarded() {
        let csv = open_csv(b"x,y\r\n1,2,3\r\n4,5\r\n", |b| {
            b.skip_headers(true);
        });
        assert_eq!(csv.rows(), 2);
        assert_eq!(csv.cols(), 2);

        let col0: Vec<Vec<u8>> = csv.col_iter(0, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        let col1: Vec<Vec<u8>> = csv.col_iter(1, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        assert_eq!(col0, vec![b"x".to_vec(), b"1".to_vec(), b"4".to_vec()]);
        assert_eq!(col1, vec![b"y".to_vec(), b"2".to_vec(), b"5".to_vec()]);
    }

    #[test]
    fn test_reversed_row_iter_with_skip_headers() {
        let csv = open_csv(b"h0,h1,h2\na0,a1,a2\nb0,b1,b2\n", |b| {
            b.skip_headers(true);
        });
        let row0_rev: Vec<Vec<u8>> = csv.row_iter(0, true).unwrap().map(|c| c.unwrap().into_owned()).collect();
        assert_eq!(row0_rev, vec![b"h2".to_vec(), b"h1".to_vec(), b"h0".to_vec()]);
    }

    #[test]
    fn test_crlf_no_trailing_newline_at_eof() {
        let csv = open_csv(b"h1,h2,h3\r\n1,2,3\r\n4,5,6\r\n7,8,9", |_| {});
        assert_eq!(csv.rows(), 3);
        let col0: Vec<Vec<u8>> = csv.col_iter(0, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        assert_eq!(col0, vec![b"1".to_vec(), b"4".to_vec(), b"7".to_vec()]);
    }

    #[test]
    fn test_quoted_embedded_newline_preserved_without_unquote() {
        let csv = open_csv(b"a,b\n\"x\ny\",2\n", |b| {
            b.skip_headers(true).unquote(false);
        });
        assert_eq!(csv.rows(), 2);
        assert_eq!(csv.cell(1, 0).unwrap().as_ref(), b"\"x\ny\"");
    }

    #[test]
    fn test_quoted_embedded_newline_stripped_with_unquote() {
        let csv = open_csv(b"a,b\n\"x\ny\",2\n", |b| {
            b.skip_headers(true).unquote(true);
        });
        assert_eq!(csv.cell(1, 0).unwrap().as_ref(), b"x\ny");
    }

    #[test]
    fn test_wide_header_stress() {
        let mut data = vec![b'A'; 257];
        data.extend_from_slice(b"\r\n1\r\n2\r\n");
        let csv = open_csv(&data, |_| {});
        assert_eq!(csv.headers().len(), 1);
        assert_eq!(csv.headers()[0].len(), 257);
        let col0: Vec<Vec<u8>> = csv.col_iter(0, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        assert_eq!(col0, vec![b"1".to_vec(), b"2".to_vec()]);
    }

    #[test]
    fn test_negative_indices() {
        let csv = open_csv(b"a,b,c\n1,2,3\n4,5,6\n", |_| {});
        assert_eq!(csv.cell(-1, -1).unwrap().as_ref(), b"6");
        assert_eq!(csv.cell(-2, 0).unwrap().as_ref(), b"1");
    }

    #[test]
    fn test_out_of_range_fails() {
        let csv = open_csv(b"a,b\n1,2\n", |_| {});
        assert!(csv.cell(5, 0).is_err());
        assert!(csv.cell(0, 5).is_err());
        assert!(csv.cell(-5, 0).is_err());
    }

    #[test]
    fn test_reverse_iterators_match() {
        let csv = open_csv(b"a,b\n1,x\n2,y\n3,z\n", |_| {});
        let forward: Vec<Vec<u8>> = csv.col_iter(0, false).unwrap().map(|c| c.unwrap().into_owned()).collect();
        let mut reversed: Vec<Vec<u8>> = csv.col_iter(0, true).unwrap().map(|c| c.unwrap().into_owned()).collect();
        reversed.reverse();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_symmetry_negative_slice() {
        let csv = open_csv(b"a\n1\n2\n3\n4\n5\n", |_| {});
        let rows = csv.rows() as i64;
        for k in 1..=rows {
            let from_negative = csv.cell(-k, 0).unwrap().into_owned();
            let from_positive = csv.cell(rows - k, 0).unwrap().into_owned();
            assert_eq!(from_negative, from_positive);
        }
    }

    #[test]
    fn test_slice_grid() {
        let csv = open_csv(b"a,b,c,d\n1,2,3,4\n5,6,7,8\n9,10,11,12\n", |_| {});
        let rows: Vec<Vec<Vec<u8>>> = csv
            .slice((Some(0), Some(2), None), (Some(-2), None, None))
            .map(|r| r.unwrap().into_iter().map(|c| c.into_owned()).collect())
            .collect();
        assert_eq!(rows, vec![vec![b"3".to_vec(), b"4".to_vec()], vec![b"7".to_vec(), b"8".to_vec()]]);
    }

    #[test]
    fn test_empty_file() {
        let csv = open_csv(b"", |_| {});
        assert_eq!(csv.rows(), 0);
        assert_eq!(csv.cols(), 0);
        assert!(csv.headers().is_empty());
        assert!(csv.cell(0, 0).is_err());
    }

    #[test]
    fn test_explicit_index_dir_is_reused() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"a,b\n1,2\n").unwrap();
        source.flush().unwrap();

        let index_dir = tempfile::tempdir().unwrap();
        let first = LazyCsvBuilder::new()
            .index_dir(IndexDir::At(index_dir.path().to_path_buf()))
            .open(source.path())
            .unwrap();
        assert_eq!(first.cell(0, 0).unwrap().as_ref(), b"1");
        drop(first);

        // Re-open against the same directory: should reuse, not rebuild,
        // and read identically.
        let second = LazyCsvBuilder::new()
            .index_dir(IndexDir::At(index_dir.path().to_path_buf()))
            .open(source.path())
            .unwrap();
        assert_eq!(second.cell(0, 0).unwrap().as_ref(), b"1");
    }

    #[test]
    fn test_failed_build_leaves_no_partial_files_in_explicit_index_dir() {
        let mut source = tempfile::NamedTempFile::new().unwrap();
        source.write_all(b"a,b,c\n1,2,3\n4,5,6\n").unwrap();
        source.flush().unwrap();

        let index_dir = tempfile::tempdir().unwrap();
        let result = LazyCsvBuilder::new()
            .index_dir(IndexDir::At(index_dir.path().to_path_buf()))
            .index_width(IndexWidth::W16)
            .buffer_size(4)
            .header_cap(4)
            .open(source.path());

        assert!(result.is_err());
        let remaining: Vec<_> = fs::read_dir(index_dir.path()).unwrap().collect();
        assert!(remaining.is_empty(), "expected no leftover index files, found {:?}", remaining);
    }

    #[test]
    fn test_open_non_regular_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LazyCsvBuilder::new().open(dir.path()).unwrap_err();
        // spec.md §4.A / §7: non-regular-file/unreadable paths surface as
        // an I/O failure, not `BadArgument`.
        let io_err: std::io::Error = err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_ephemeral_index_dir_cleaned_up_on_drop() {
        let csv = open_csv(b"a,b\n1,2\n", |_| {});
        let index_path = csv.index_dir().to_path_buf();
        assert!(index_path.exists());
        drop(csv);
        assert!(!index_path.exists());
    }

    #[test]
    fn test_small_buffer_size_matches_mmap_across_boundaries() {
        // spec.md §8 "Boundary behaviours": delimiters straddling the
        // sequential read-buffer boundary must not affect output. Force the
        // streamed (non-mmap) path with a buffer small enough that nearly
        // every delimiter, quote, and terminator in this file lands on a
        // refill boundary.
        let contents: &[u8] = b"INDEX,A,B\n0,,2\n,,5\n\"q,u\"\"o\"\"ted\",x,\"y\nz\"\n";
        let mmap_csv = open_csv(contents, |b| {
            b.prefer_mmap(true);
        });
        let streamed_csv = open_csv(contents, |b| {
            b.prefer_mmap(false).buffer_size(3);
        });

        assert_eq!(streamed_csv.rows(), mmap_csv.rows());
        assert_eq!(streamed_csv.cols(), mmap_csv.cols());
        assert_eq!(streamed_csv.headers(), mmap_csv.headers());

        for r in 0..mmap_csv.rows() as i64 {
            for c in 0..mmap_csv.cols() as i64 {
                assert_eq!(
                    streamed_csv.cell(r, c).unwrap().into_owned(),
                    mmap_csv.cell(r, c).unwrap().into_owned(),
                    "mismatch at ({}, {})",
                    r,
                    c
                );
            }
        }
    }

    #[test]
    fn test_name_is_absolute_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"a\n1\n").unwrap();
        file.flush().unwrap();

        let builder = LazyCsvBuilder::new();
        let csv = builder.open(file.path()).unwrap();
        assert!(csv.name().to_str().unwrap().contains(file.path().file_name().unwrap().to_str().unwrap()));
    }
}
