//! Lexer transition tracing, enabled by the `trace` Cargo feature.

use crate::lexer::{LexerState, Token};

#[cfg(feature = "trace")]
pub(crate) fn trace_transition(from: LexerState, byte: Option<u8>, to: LexerState, token: Option<&Token>) {
    eprintln!(
        "{:?} --[{}]--> {:?}{}",
        from,
        byte.map(|b| b as char).unwrap_or('\u{2205}'),
        to,
        token.map(|t| format!(" emit {:?}", t)).unwrap_or_default(),
    );
}

#[cfg(not(feature = "trace"))]
#[inline(always)]
pub(crate) fn trace_transition(_from: LexerState, _byte: Option<u8>, _to: LexerState, _token: Option<&Token>) {}
