//! Construction-time configuration, mirroring the teacher's `*Builder` types:
//! a plain struct of chainable setters terminating in a method that does the
//! actual work ([`LazyCsvBuilder::open`]).

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::reader::LazyCsv;

#[cfg(feature = "index-width-16")]
const DEFAULT_WIDTH: IndexWidth = IndexWidth::W16;
#[cfg(all(feature = "index-width-32", not(feature = "index-width-16")))]
const DEFAULT_WIDTH: IndexWidth = IndexWidth::W32;
#[cfg(all(
    feature = "index-width-64",
    not(feature = "index-width-16"),
    not(feature = "index-width-32")
))]
const DEFAULT_WIDTH: IndexWidth = IndexWidth::W64;

/// The on-disk offset width used when *building* a new index set. An index
/// set, once built, always records its own width in `meta.idx`, and a reader
/// always honours that recorded width regardless of which of these features
/// the running binary was compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    W16,
    W32,
    W64,
}

impl IndexWidth {
    pub(crate) fn bytes(self) -> u8 {
        match self {
            Self::W16 => 2,
            Self::W32 => 4,
            Self::W64 => 8,
        }
    }

    pub(crate) fn from_bytes(b: u8) -> Option<Self> {
        match b {
            2 => Some(Self::W16),
            4 => Some(Self::W32),
            8 => Some(Self::W64),
            _ => None,
        }
    }

    /// The largest offset this width can store, one bit narrower than the
    /// raw width because column streams reserve the top bit for the quoted
    /// flag.
    pub(crate) fn max_offset(self) -> u64 {
        match self {
            Self::W16 => (1u64 << 15) - 1,
            Self::W32 => (1u64 << 31) - 1,
            Self::W64 => (1u64 << 63) - 1,
        }
    }
}

impl Default for IndexWidth {
    fn default() -> Self {
        DEFAULT_WIDTH
    }
}

/// Where the built index set lives on disk.
#[derive(Debug, Clone)]
pub enum IndexDir {
    /// A freshly created temporary directory, removed when the [`LazyCsv`]
    /// is dropped.
    Ephemeral,
    /// A caller-chosen, persistent directory. Reused across runs: if it
    /// already holds a `meta.idx` whose recorded source size/mtime still
    /// match the source file, the existing index set is reused as-is rather
    /// than rebuilt.
    At(PathBuf),
}

impl Default for IndexDir {
    fn default() -> Self {
        Self::Ephemeral
    }
}

#[derive(Debug, Clone)]
pub struct LazyCsvBuilder {
    pub(crate) skip_headers: bool,
    pub(crate) unquote: bool,
    pub(crate) delimiter: u8,
    pub(crate) quote: u8,
    pub(crate) buffer_size: usize,
    pub(crate) header_cap: usize,
    pub(crate) index_dir: IndexDir,
    pub(crate) index_width: IndexWidth,
    pub(crate) prefer_mmap: bool,
}

impl Default for LazyCsvBuilder {
    fn default() -> Self {
        Self {
            skip_headers: false,
            unquote: true,
            delimiter: b',',
            quote: b'"',
            buffer_size: 1 << 20,
            header_cap: 128 * 1024 * 1024,
            index_dir: IndexDir::default(),
            index_width: IndexWidth::default(),
            prefer_mmap: false,
        }
    }
}

impl LazyCsvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the first row as a header row rather than as data row 0.
    pub fn skip_headers(&mut self, yes: bool) -> &mut Self {
        self.skip_headers = yes;
        self
    }

    /// Strip the surrounding quotes (and un-escape doubled quotes) from a
    /// cell's bytes when returning it. When `false`, cells are returned
    /// exactly as they appear in the source file, quotes included.
    pub fn unquote(&mut self, yes: bool) -> &mut Self {
        self.unquote = yes;
        self
    }

    pub fn delimiter(&mut self, byte: u8) -> &mut Self {
        self.delimiter = byte;
        self
    }

    pub fn quote(&mut self, byte: u8) -> &mut Self {
        self.quote = byte;
        self
    }

    /// Buffer size used when streaming the source file during construction.
    /// Irrelevant once an index set already exists on disk and matches.
    pub fn buffer_size(&mut self, size: usize) -> &mut Self {
        self.buffer_size = size;
        self
    }

    /// Maximum number of bytes the header row may occupy in memory.
    pub fn header_cap(&mut self, cap: usize) -> &mut Self {
        self.header_cap = cap;
        self
    }

    pub fn index_dir(&mut self, dir: IndexDir) -> &mut Self {
        self.index_dir = dir;
        self
    }

    pub fn index_width(&mut self, width: IndexWidth) -> &mut Self {
        self.index_width = width;
        self
    }

    /// Whether construction should memory-map the source file rather than
    /// streaming it through `buffer_size`-sized reads (the default). The
    /// indexing pass only ever walks forward once, so mapping buys it
    /// nothing over a sequential read and, for files much larger than RAM,
    /// costs address space and page faults a chunked read avoids; the
    /// reader maps the source unconditionally at query time regardless of
    /// this setting.
    pub fn prefer_mmap(&mut self, yes: bool) -> &mut Self {
        self.prefer_mmap = yes;
        self
    }

    pub fn open(&self, path: impl Into<PathBuf>) -> Result<LazyCsv> {
        let path = path.into();
        if self.delimiter == self.quote {
            return Err(Error::bad_argument("delimiter and quote must differ"));
        }
        if self.buffer_size == 0 {
            return Err(Error::bad_argument("buffer_size must be positive"));
        }
        LazyCsv::open(path, self.clone())
    }
}
