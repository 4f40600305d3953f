/*!
`lazycsv` gives random access to the cells of a CSV file without ever
materializing the file, or a decoded representation of it, in memory.

Opening a file with [`LazyCsvBuilder`] runs a single [`memchr`](https://docs.rs/memchr/)-accelerated
lexing pass over it and writes a small set of fixed-width binary index
files next to it (or in a temporary directory, by default): one stream of
row-start offsets, and one stream of cell-start offsets per column. From
then on, [`LazyCsv::cell`] answers in O(1) — a couple of mmap reads, never
a rescan of the source file — and [`LazyCsv::col_iter`] / [`LazyCsv::row_iter`]
/ [`LazyCsv::slice`] build on the same primitive for sequences and
rectangular selections.

This is not a port of the [`csv`](https://docs.rs/csv/) crate's streaming
model: there is no `Reader` you pull records out of in order. The entire
point is that a caller who wants cell `(4_000_000, 3)` without reading the
four million rows before it can have it, at the cost of one up-front
indexing pass and some disk space for the index files.

# Example

```no_run
use lazycsv::LazyCsvBuilder;

let csv = LazyCsvBuilder::new().open("data.csv")?;
println!("{:?}", csv.headers());
println!("{:?}", csv.cell(0, 0)?);
# Ok::<(), lazycsv::Error>(())
```

# Ragged rows

A row with fewer fields than the header is warn-and-padded (missing cells
read as empty); a row with more is warn-and-truncated (extra fields are
discarded). Either way the file is still indexed to completion, and the
warning fires at most once per construction.

# Caveats

Quoting is RFC 4180-style (`"`, doubled to escape). Index files are
rebuilt automatically when the source file's size or modification time no
longer match what was recorded, but are otherwise trusted as-is; removing
or corrupting them out from under a caller-chosen `index_dir` is not
detected beyond that size/mtime check.
*/
mod buffer;
mod byte_source;
mod debug;
mod error;
mod index_writer;
mod indexer;
mod lexer;
mod meta;
mod options;
mod reader;
mod slice;
mod utils;

pub use error::{Error, Result};
pub use options::{IndexDir, IndexWidth, LazyCsvBuilder};
pub use reader::{ColIter, GridSlice, LazyCsv, RowIter};
