//! Drives a single left-to-right [`Lexer`] pass over a source file and
//! produces, on disk under `index_dir`, the anchor stream, one stream per
//! column, and the header cells — everything [`crate::reader::LazyCsv`]
//! needs to answer `cell(r, c)` in O(1) without ever touching the lexer
//! again.
//!
//! Mirrors the teacher's core reader state machine in spirit (a single
//! pass driven straight through the bytes, no backtracking) but the
//! output is index files on disk rather than in-memory records.

use std::fs::File;
use std::path::Path;

use crate::byte_source::ByteSource;
use crate::error::{Error, Result};
use crate::index_writer::{AnchorWriter, ColumnWriter};
use crate::lexer::{Lexer, Token};
use crate::meta::{Meta, RaggedRow};
use crate::options::LazyCsvBuilder;

/// Everything learned from one indexing pass, besides what already lives in
/// `meta.idx`'s fixed fields.
pub(crate) struct BuildOutcome {
    pub meta: Meta,
    pub headers: Vec<Vec<u8>>,
}

pub(crate) fn build(source_path: &Path, opts: &LazyCsvBuilder, index_dir: &Path) -> Result<BuildOutcome> {
    let file = File::open(source_path)?;
    let total_len = file.metadata()?.len();
    let width = opts.index_width;

    let anchors_path = index_dir.join("anchors.idx");

    let mut meta = Meta::for_source(source_path, width, opts.skip_headers, opts.unquote)?;

    if total_len == 0 {
        let mut anchors = AnchorWriter::create(&anchors_path, width)?;
        anchors.push(0)?;
        anchors.finish()?;
        return Ok(BuildOutcome { meta, headers: Vec::new() });
    }

    let mut source = if opts.prefer_mmap {
        ByteSource::mapped(&file)?
    } else {
        ByteSource::streamed(file, opts.buffer_size)
    };

    let mut lexer = Lexer::new(opts.delimiter, opts.quote);
    let mut anchor_writer = AnchorWriter::create(&anchors_path, width)?;

    let mut row_fields: Vec<(u64, bool)> = Vec::new();
    let mut cols: Option<u64> = None;
    let mut column_writers: Vec<ColumnWriter> = Vec::new();
    let mut headers: Vec<Vec<u8>> = Vec::new();

    let expect_header_row = !opts.skip_headers;
    let mut header_raw: Vec<u8> = Vec::new();
    let mut header_row_open = expect_header_row;
    let mut header_decoded = false;

    let mut rows_lexed: u64 = 0;
    let mut data_rows: u64 = 0;
    let mut ragged_rows: Vec<RaggedRow> = Vec::new();
    let mut ragged_warned = false;

    loop {
        let base = source.position();
        let len = {
            let chunk = source.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            let mut row_err: Result<()> = Ok(());

            // Whether this chunk closes the header row is decided, and
            // acted on, *inside* the token closure below, before any later
            // token in this same chunk (e.g. the first data row, if it
            // shares a chunk with the header) can be mistaken for the row
            // that determines `cols`.
            lexer.feed(chunk, base, |token| {
                if row_err.is_err() {
                    return;
                }
                match token {
                    Token::Field { offset, quoted } => row_fields.push((offset, quoted)),
                    Token::Row { next_row_offset } => {
                        if rows_lexed == 0 && expect_header_row && !header_decoded {
                            let rel = (next_row_offset - base) as usize;
                            header_raw.extend_from_slice(&chunk[..rel]);
                            if header_raw.len() > opts.header_cap {
                                row_err = Err(Error::header_too_large(opts.header_cap));
                                return;
                            }
                            match decode_header_row(&header_raw, opts.delimiter, opts.quote, opts.unquote) {
                                Ok(decoded) => {
                                    if let Err(err) =
                                        open_column_writers(index_dir, width, decoded.len() as u64, &mut column_writers)
                                    {
                                        row_err = Err(err);
                                        return;
                                    }
                                    cols = Some(decoded.len() as u64);
                                    headers = decoded;
                                }
                                Err(err) => {
                                    row_err = Err(err);
                                    return;
                                }
                            }
                            header_row_open = false;
                            header_decoded = true;
                        } else if let Err(err) = handle_data_row(
                            &row_fields,
                            next_row_offset,
                            index_dir,
                            width,
                            &mut anchor_writer,
                            &mut column_writers,
                            &mut cols,
                            &mut ragged_rows,
                            &mut ragged_warned,
                            &mut data_rows,
                        ) {
                            row_err = Err(err);
                        }
                        rows_lexed += 1;
                        row_fields.clear();
                    }
                }
            });
            row_err?;

            // The header row didn't close in this chunk: the whole chunk
            // belongs to it.
            if header_row_open && expect_header_row && !header_decoded {
                header_raw.extend_from_slice(chunk);
                if header_raw.len() > opts.header_cap {
                    return Err(Error::header_too_large(opts.header_cap));
                }
            }

            len
        };
        source.consume(len);
    }

    let mut row_err: Result<()> = Ok(());
    lexer.finish(total_len, |token| {
        if row_err.is_err() {
            return;
        }
        if let Token::Row { next_row_offset } = token {
            if rows_lexed == 0 && expect_header_row {
                // A header-only file with no trailing terminator: `header_raw`
                // already holds every byte up to `total_len` from the loop
                // above, so there is nothing left to append.
                if !header_decoded {
                    match decode_header_row(&header_raw, opts.delimiter, opts.quote, opts.unquote) {
                        Ok(decoded) => headers = decoded,
                        Err(err) => {
                            row_err = Err(err);
                            return;
                        }
                    }
                    cols = Some(headers.len() as u64);
                    if let Err(err) = open_column_writers(index_dir, width, headers.len() as u64, &mut column_writers) {
                        row_err = Err(err);
                        return;
                    }
                    header_decoded = true;
                }
            } else if let Err(err) = handle_data_row(
                &row_fields,
                next_row_offset,
                index_dir,
                width,
                &mut anchor_writer,
                &mut column_writers,
                &mut cols,
                &mut ragged_rows,
                &mut ragged_warned,
                &mut data_rows,
            ) {
                row_err = Err(err);
            }
            rows_lexed += 1;
            row_fields.clear();
        }
    });
    row_err?;

    anchor_writer.push(total_len)?;
    anchor_writer.finish()?;
    for writer in column_writers {
        writer.finish()?;
    }

    meta.rows = data_rows;
    meta.cols = cols.unwrap_or(0);
    meta.ragged_rows = ragged_rows;

    Ok(BuildOutcome { meta, headers })
}

#[allow(clippy::too_many_arguments)]
fn handle_data_row(
    row_fields: &[(u64, bool)],
    _next_row_offset: u64,
    index_dir: &Path,
    width: crate::options::IndexWidth,
    anchor_writer: &mut AnchorWriter,
    column_writers: &mut Vec<ColumnWriter>,
    cols: &mut Option<u64>,
    ragged_rows: &mut Vec<RaggedRow>,
    ragged_warned: &mut bool,
    data_rows: &mut u64,
) -> Result<()> {
    let observed_width = row_fields.len() as u64;

    if cols.is_none() {
        open_column_writers(index_dir, width, observed_width, column_writers)?;
        *cols = Some(observed_width);
    }
    let c = cols.expect("cols set above");

    let row_start = row_fields[0].0;
    anchor_writer.push(row_start)?;

    if observed_width == c {
        for (k, &(offset, quoted)) in row_fields.iter().enumerate() {
            column_writers[k].push(offset, quoted)?;
        }
    } else if observed_width < c {
        warn_ragged(ragged_warned, *data_rows, c, observed_width);
        for (k, &(offset, quoted)) in row_fields.iter().enumerate() {
            column_writers[k].push(offset, quoted)?;
        }
        for writer in column_writers.iter_mut().take(c as usize).skip(observed_width as usize) {
            // Never read back: `cell`/`col_iter` short-circuit on the
            // ragged-row record before consulting this column's stream.
            writer.push(0, false)?;
        }
        ragged_rows.push(RaggedRow { row: *data_rows, observed_width, overflow_start: 0 });
    } else {
        warn_ragged(ragged_warned, *data_rows, c, observed_width);
        for (k, &(offset, quoted)) in row_fields.iter().enumerate().take(c as usize) {
            column_writers[k].push(offset, quoted)?;
        }
        let (overflow_start, _overflow_quoted) = row_fields[c as usize];
        ragged_rows.push(RaggedRow { row: *data_rows, observed_width, overflow_start });
    }

    *data_rows += 1;
    Ok(())
}

fn warn_ragged(warned: &mut bool, row: u64, expected: u64, observed: u64) {
    if !*warned {
        log::warn!(
            "ragged row at data row {}: expected {} columns, found {} (further ragged rows in this file will not be logged individually)",
            row,
            expected,
            observed
        );
        *warned = true;
    }
}

fn open_column_writers(
    index_dir: &Path,
    width: crate::options::IndexWidth,
    cols: u64,
    column_writers: &mut Vec<ColumnWriter>,
) -> Result<()> {
    for k in 0..cols {
        let path = index_dir.join(format!("col_{}.idx", k));
        column_writers.push(ColumnWriter::create(&path, width)?);
    }
    Ok(())
}

/// Re-lex a fully-buffered header row to recover its field boundaries, then
/// slice (and un-escape, if `unquote`) the corresponding bytes directly out
/// of `raw`. Headers are the one thing this crate ever decodes eagerly.
fn decode_header_row(raw: &[u8], delimiter: u8, quote: u8, unquote: bool) -> Result<Vec<Vec<u8>>> {
    let mut lexer = Lexer::new(delimiter, quote);
    let mut fields: Vec<(u64, bool)> = Vec::new();
    lexer.feed(raw, 0, |token| {
        if let Token::Field { offset, quoted } = token {
            fields.push((offset, quoted));
        }
    });
    lexer.finish(raw.len() as u64, |token| {
        if let Token::Field { offset, quoted } = token {
            fields.push((offset, quoted));
        }
    });

    let content_end = content_end_before_terminator(raw) as u64;
    let n = fields.len();
    let mut cells = Vec::with_capacity(n);

    for i in 0..n {
        let (raw_start, quoted) = fields[i];
        let strip = unquote && quoted;
        let start = raw_start + if strip { 1 } else { 0 };
        let end = if i + 1 < n {
            let (next_start, _) = fields[i + 1];
            next_start - 1 - if strip { 1 } else { 0 }
        } else {
            content_end - if strip { 1 } else { 0 }
        };

        let slice = &raw[start as usize..end as usize];
        let cell = if strip {
            crate::utils::unescape(slice, quote).into_owned()
        } else {
            slice.to_vec()
        };
        cells.push(cell);
    }

    Ok(cells)
}

fn content_end_before_terminator(raw: &[u8]) -> usize {
    let len = raw.len();
    if len >= 2 && &raw[len - 2..] == b"\r\n" {
        len - 2
    } else if len >= 1 && (raw[len - 1] == b'\n' || raw[len - 1] == b'\r') {
        len - 1
    } else {
        len
    }
}
