//! The streaming byte-level state machine that recognizes field and row
//! boundaries without ever copying or decoding a single byte of content.
//!
//! The lexer only ever records absolute byte offsets into the source file.
//! Because state carries across chunk boundaries as a handful of `u64`s and
//! an enum, it never needs to buffer content across a [`crate::byte_source::ByteSource`]
//! refill, which is what lets the indexer work on a file far larger than
//! memory.

use memchr::{memchr, memchr3};

use crate::debug::trace_transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LexerState {
    /// Positioned at the first byte of a field (or at EOF with no pending field).
    FieldStart,
    /// Inside an unquoted field's content.
    InField,
    /// Inside a quoted field's content, before its closing quote.
    InQuoted,
    /// Just past a field's closing quote; deciding whether it was escaped.
    AfterQuote,
    /// Just consumed a bare `\r`; waiting to see if a `\n` follows.
    CrSeen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    /// A field starts at `offset`. If `quoted`, `offset` is the position of
    /// the opening quote byte itself, not the first content byte.
    Field { offset: u64, quoted: bool },
    /// The current row's terminator has been fully consumed (or EOF reached
    /// mid-row); the next row, if any, starts at `next_row_offset`.
    Row { next_row_offset: u64 },
}

pub(crate) struct Lexer {
    state: LexerState,
    delimiter: u8,
    quote: u8,
}

impl Lexer {
    pub fn new(delimiter: u8, quote: u8) -> Self {
        Self {
            state: LexerState::FieldStart,
            delimiter,
            quote,
        }
    }

    #[inline(always)]
    fn step(&mut self, byte: u8, next: LexerState, token: Option<Token>, emit: &mut impl FnMut(Token)) {
        trace_transition(self.state, Some(byte), next, token.as_ref());
        self.state = next;

        if let Some(token) = token {
            emit(token);
        }
    }

    /// Feed one chunk of bytes starting at absolute offset `base`. State
    /// carries over to the next call, so chunks may be arbitrarily small.
    pub fn feed(&mut self, chunk: &[u8], base: u64, mut emit: impl FnMut(Token)) {
        let len = chunk.len();
        let mut i = 0usize;

        while i < len {
            let byte = chunk[i];
            let offset = base + i as u64;

            match self.state {
                LexerState::FieldStart => {
                    if byte == self.quote {
                        self.step(
                            byte,
                            LexerState::InQuoted,
                            Some(Token::Field { offset, quoted: true }),
                            &mut emit,
                        );
                        i += 1;
                    } else if byte == self.delimiter {
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Field { offset, quoted: false }),
                            &mut emit,
                        );
                        i += 1;
                    } else if byte == b'\r' {
                        emit(Token::Field { offset, quoted: false });
                        self.step(byte, LexerState::CrSeen, None, &mut emit);
                        i += 1;
                    } else if byte == b'\n' {
                        emit(Token::Field { offset, quoted: false });
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Row { next_row_offset: offset + 1 }),
                            &mut emit,
                        );
                        i += 1;
                    } else {
                        self.step(
                            byte,
                            LexerState::InField,
                            Some(Token::Field { offset, quoted: false }),
                            &mut emit,
                        );
                        i += 1;
                    }
                }
                LexerState::InField => {
                    if byte == self.delimiter {
                        self.step(byte, LexerState::FieldStart, None, &mut emit);
                        i += 1;
                    } else if byte == b'\r' {
                        self.step(byte, LexerState::CrSeen, None, &mut emit);
                        i += 1;
                    } else if byte == b'\n' {
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Row { next_row_offset: offset + 1 }),
                            &mut emit,
                        );
                        i += 1;
                    } else {
                        let rest = &chunk[i..];
                        i += memchr3(self.delimiter, b'\r', b'\n', rest).unwrap_or(rest.len());
                    }
                }
                LexerState::InQuoted => {
                    if byte == self.quote {
                        self.step(byte, LexerState::AfterQuote, None, &mut emit);
                        i += 1;
                    } else {
                        let rest = &chunk[i..];
                        i += memchr(self.quote, rest).unwrap_or(rest.len());
                    }
                }
                LexerState::AfterQuote => {
                    if byte == self.quote {
                        // `""` inside quoted content is an escaped quote.
                        self.step(byte, LexerState::InQuoted, None, &mut emit);
                        i += 1;
                    } else if byte == self.delimiter {
                        self.step(byte, LexerState::FieldStart, None, &mut emit);
                        i += 1;
                    } else if byte == b'\r' {
                        self.step(byte, LexerState::CrSeen, None, &mut emit);
                        i += 1;
                    } else if byte == b'\n' {
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Row { next_row_offset: offset + 1 }),
                            &mut emit,
                        );
                        i += 1;
                    } else {
                        // Stray bytes between a closing quote and the next
                        // delimiter/terminator; tolerated as a continuation
                        // of the field rather than a hard parse error.
                        self.step(byte, LexerState::InField, None, &mut emit);
                        i += 1;
                    }
                }
                LexerState::CrSeen => {
                    if byte == b'\n' {
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Row { next_row_offset: offset + 1 }),
                            &mut emit,
                        );
                        i += 1;
                    } else {
                        // The CR alone was the terminator; reprocess this
                        // byte as the first byte of the next row.
                        self.step(
                            byte,
                            LexerState::FieldStart,
                            Some(Token::Row { next_row_offset: offset }),
                            &mut emit,
                        );
                    }
                }
            }
        }
    }

    /// Called once, after the byte source is exhausted, to flush any row
    /// left pending by a file that does not end in a terminator.
    pub fn finish(&mut self, total_len: u64, mut emit: impl FnMut(Token)) {
        match self.state {
            LexerState::FieldStart => {}
            LexerState::InField | LexerState::InQuoted | LexerState::AfterQuote | LexerState::CrSeen => {
                emit(Token::Row { next_row_offset: total_len });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(data: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(b',', b'"');
        let mut tokens = Vec::new();
        lexer.feed(data, 0, |t| tokens.push(t));
        lexer.finish(data.len() as u64, |t| tokens.push(t));
        tokens
    }

    #[test]
    fn test_simple_row() {
        let tokens = lex(b"a,b,c\n");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: false },
                Token::Field { offset: 2, quoted: false },
                Token::Field { offset: 4, quoted: false },
                Token::Row { next_row_offset: 6 },
            ]
        );
    }

    #[test]
    fn test_no_trailing_newline() {
        let tokens = lex(b"a,b,c");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: false },
                Token::Field { offset: 2, quoted: false },
                Token::Field { offset: 4, quoted: false },
                Token::Row { next_row_offset: 5 },
            ]
        );
    }

    #[test]
    fn test_crlf() {
        let tokens = lex(b"a,b\r\nc,d\r\n");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: false },
                Token::Field { offset: 2, quoted: false },
                Token::Row { next_row_offset: 5 },
                Token::Field { offset: 5, quoted: false },
                Token::Field { offset: 7, quoted: false },
                Token::Row { next_row_offset: 10 },
            ]
        );
    }

    #[test]
    fn test_bare_cr() {
        let tokens = lex(b"a,b\rc,d\r");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: false },
                Token::Field { offset: 2, quoted: false },
                Token::Row { next_row_offset: 4 },
                Token::Field { offset: 4, quoted: false },
                Token::Field { offset: 6, quoted: false },
                Token::Row { next_row_offset: 8 },
            ]
        );
    }

    #[test]
    fn test_quoted_field_with_embedded_newline() {
        let tokens = lex(b"\"a\nb\",c\n");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: true },
                Token::Field { offset: 6, quoted: false },
                Token::Row { next_row_offset: 8 },
            ]
        );
    }

    #[test]
    fn test_escaped_quote() {
        let tokens = lex(b"\"a\"\"b\"\n");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: true },
                Token::Row { next_row_offset: 7 },
            ]
        );
    }

    #[test]
    fn test_empty_fields() {
        let tokens = lex(b",,\n");
        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: false },
                Token::Field { offset: 1, quoted: false },
                Token::Field { offset: 2, quoted: false },
                Token::Row { next_row_offset: 3 },
            ]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(lex(b"").is_empty());
    }

    #[test]
    fn test_chunk_boundary_mid_quote() {
        let data: &[u8] = b"\"hello world\",b\n";
        let mut lexer = Lexer::new(b',', b'"');
        let mut tokens = Vec::new();

        for (i, chunk) in data.chunks(3).enumerate() {
            lexer.feed(chunk, (i * 3) as u64, |t| tokens.push(t));
        }
        lexer.finish(data.len() as u64, |t| tokens.push(t));

        assert_eq!(
            tokens,
            vec![
                Token::Field { offset: 0, quoted: true },
                Token::Field { offset: 14, quoted: false },
                Token::Row { next_row_offset: 16 },
            ]
        );
    }
}
