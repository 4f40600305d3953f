use std::{error, fmt, io, result};

#[derive(Debug)]
pub(crate) enum ErrorKind {
    Io(io::Error),
    BadArgument(String),
    IndexOverflow { offset: u64, width: u8 },
    HeaderTooLarge { cap: usize },
    OutOfRange { what: &'static str, index: i64, len: u64 },
    CorruptIndex(String),
}

#[derive(Debug)]
pub struct Error(ErrorKind);

impl Error {
    pub(crate) fn bad_argument(msg: impl Into<String>) -> Self {
        Self(ErrorKind::BadArgument(msg.into()))
    }

    pub(crate) fn index_overflow(offset: u64, width: u8) -> Self {
        Self(ErrorKind::IndexOverflow { offset, width })
    }

    pub(crate) fn header_too_large(cap: usize) -> Self {
        Self(ErrorKind::HeaderTooLarge { cap })
    }

    pub(crate) fn out_of_range(what: &'static str, index: i64, len: u64) -> Self {
        Self(ErrorKind::OutOfRange { what, index, len })
    }

    pub(crate) fn corrupt_index(msg: impl Into<String>) -> Self {
        Self(ErrorKind::CorruptIndex(msg.into()))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self(ErrorKind::Io(err))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        Self::new(io::ErrorKind::Other, err)
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.0 {
            ErrorKind::Io(err) => err.fmt(f),
            ErrorKind::BadArgument(msg) => write!(f, "bad argument: {}", msg),
            ErrorKind::IndexOverflow { offset, width } => write!(
                f,
                "offset {} does not fit in a {}-bit index (the file is too large for this index width)",
                offset,
                width
            ),
            ErrorKind::HeaderTooLarge { cap } => write!(
                f,
                "header row exceeds the configured cap of {} bytes",
                cap
            ),
            ErrorKind::OutOfRange { what, index, len } => {
                write!(f, "{} index {} out of range for length {}", what, index, len)
            }
            ErrorKind::CorruptIndex(msg) => write!(f, "corrupt index: {}", msg),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
