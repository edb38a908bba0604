//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

use crate::types::Tgi;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file does not start with a valid DBPF header
    #[error("invalid DBPF magic: {0}")]
    #[diagnostic(help("DBPF packages start with the four bytes `DBPF`"))]
    InvalidMagic(String),

    /// only major version 2 packages are supported
    #[error("unsupported DBPF version {major}.{minor}, only version 2.x is supported")]
    UnsupportedVersion {
        /// Major version found in the header
        major: u32,
        /// Minor version found in the header
        minor: u32,
    },

    /// the index table could not be read
    #[error("corrupted index: {0}")]
    CorruptedIndex(String),

    /// a resource could not be compressed or decompressed
    #[error(transparent)]
    Compression(#[from] CompressionError),

    /// unable to find requested resource
    #[error("unable to find requested resource {0}")]
    ResourceNotFound(#[from] ResourceNotFoundError),

    /// text could not be parsed as a TGI
    #[error("invalid TGI {0:?}, expected TTTTTTTT:GGGGGGGG:IIIIIIIIIIIIIIII")]
    InvalidTgi(String),

    /// the package has no origin path and no target was given
    #[error("no path to save the package to")]
    NoTargetPath,

    /// offsets or sizes no longer fit in the 32-bit fields of the format
    #[error("package exceeds the 4 GiB limit of the DBPF format")]
    PackageTooLarge,
}

/// Error type to provide further information when a resource could not be (de)compressed
#[derive(Error, Diagnostic, Debug)]
pub enum CompressionError {
    /// unknown compression type 0x{0:04X}
    #[error("unknown compression type 0x{0:04X}")]
    UnknownMethod(u16),

    /// compression is not supported for this method
    #[error("compression is not supported for type 0x{0:04X}")]
    Unsupported(u16),

    /// input ended before the stream was complete
    #[error("compressed data truncated: {0}")]
    Truncated(&'static str),

    /// the RefPack header did not carry the expected magic
    #[error("invalid RefPack header: {0:02X} {1:02X}")]
    BadMagic(u8, u8),

    /// a back reference pointed before the start of the output
    #[error("invalid back reference offset {offset} (output size {available})")]
    InvalidBackReference {
        /// 1-based distance requested by the stream
        offset: usize,
        /// Bytes decoded so far
        available: usize,
    },

    /// decoded size differs from the expected size
    #[error("size mismatch: got {actual}, expected {expected}")]
    SizeMismatch {
        /// Bytes produced
        actual: usize,
        /// Bytes expected
        expected: usize,
    },

    /// the deflate stream could not be decoded
    #[error("deflate stream failed: {0}")]
    Deflate(#[source] std::io::Error),
}

/// Error type to provide further information when a resource has not been found
#[derive(Error, Diagnostic, Debug)]
pub enum ResourceNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by TGI {0}
    #[error("by TGI {0}")]
    Tgi(Tgi),

    /// by instance {0:016X}
    #[error("by instance {0:016X}")]
    Instance(u64),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
