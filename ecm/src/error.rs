//! Error types returned by the ECM reader and index builder.

use std::error::Error;
use std::fmt::Display;
use std::io::ErrorKind;

/// Error types that may occur when opening, reading, or indexing an ECM
/// stream.
///
/// This type is `repr(C)` so that it can be returned by value across the
/// `ecm-capi` FFI boundary without an intermediate conversion.
#[derive(Debug)]
#[repr(C)]
pub enum EcmError {
    /// No error.
    /// This is only used by the C API bindings.
    None,
    /// The `.ecm` stream does not begin with the `ECM\0` magic.
    MissingMagic,
    /// The `.edi` companion index file could not be opened.
    MissingIndex,
    /// The `.edi` index header or entry table was short or malformed.
    CorruptIndex,
    /// A tag read hit EOF before the sentinel, or a payload read returned
    /// fewer bytes than the block declared.
    TruncatedStream,
    /// A tag declared a block type outside of `{0, 1, 2, 3}`.
    UnknownBlockType,
    /// An invalid parameter was provided by the caller.
    InvalidParameter,
    /// Out of memory allocating an internal buffer.
    OutOfMemory,
    /// An underlying I/O error occurred that isn't one of the above.
    Io,
}

impl Error for EcmError {}

impl Display for EcmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcmError::None => f.write_str("no error"),
            EcmError::MissingMagic => f.write_str("not an ECM stream (bad magic)"),
            EcmError::MissingIndex => f.write_str("missing .edi index"),
            EcmError::CorruptIndex => f.write_str("corrupt .edi index"),
            EcmError::TruncatedStream => f.write_str("truncated ECM stream"),
            EcmError::UnknownBlockType => f.write_str("unknown ECM block type"),
            EcmError::InvalidParameter => f.write_str("invalid parameter"),
            EcmError::OutOfMemory => f.write_str("out of memory"),
            EcmError::Io => f.write_str("I/O error"),
        }
    }
}

impl From<std::io::Error> for EcmError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::UnexpectedEof => EcmError::TruncatedStream,
            ErrorKind::InvalidInput | ErrorKind::InvalidData => EcmError::InvalidParameter,
            ErrorKind::OutOfMemory => EcmError::OutOfMemory,
            _ => EcmError::Io,
        }
    }
}

impl EcmError {
    /// Maps an I/O error encountered while opening or reading the primary
    /// `.ecm` stream (as opposed to its `.edi` index, which always maps to
    /// [`EcmError::MissingIndex`] on open failure).
    pub(crate) fn from_stream_io(err: std::io::Error) -> Self {
        EcmError::from(err)
    }
}

impl From<EcmError> for std::io::Error {
    fn from(e: EcmError) -> Self {
        std::io::Error::new(ErrorKind::Other, e)
    }
}

/// Result type for `ecm`.
pub type Result<T> = std::result::Result<T, EcmError>;
