//! Resource compression and decompression handling.

use std::io::{self, Read, Write};

use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use tracing::instrument;

use crate::error::CompressionError;
use crate::refpack;

/// Marker written in front of raw DEFLATE data. Readers skip it without checking its value.
pub const DEFLATE_PREFIX: [u8; 2] = [0x78, 0x9C];

/// Identifies the storage format used to compress a resource inside the package
///
/// Resources added through [`crate::package::DbpfPackage::add_resource`] choose between
/// [`CompressionMethod::None`] and [`CompressionMethod::Deflate`]. RefPack can only be read.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    None,

    /// Raw DEFLATE behind a 2-byte prefix
    #[default]
    Deflate,

    /// EA's RefPack LZ77 variant
    RefPack,
}

impl CompressionMethod {
    /// Code for uncompressed resources
    pub const NONE: u16 = 0x0000;
    /// Code for the DEFLATE variant
    pub const DEFLATE: u16 = 0x5A42;
    /// Code for RefPack
    pub const REFPACK: u16 = 0xFFFF;
    /// Second code also decoded as RefPack
    pub const REFPACK_ALT: u16 = 0xFFFE;

    /// The code written into the index for this method
    pub fn code(self) -> u16 {
        match self {
            CompressionMethod::None => Self::NONE,
            CompressionMethod::Deflate => Self::DEFLATE,
            CompressionMethod::RefPack => Self::REFPACK,
        }
    }
}

impl TryFrom<u16> for CompressionMethod {
    type Error = CompressionError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            Self::NONE => Ok(CompressionMethod::None),
            Self::DEFLATE => Ok(CompressionMethod::Deflate),
            Self::REFPACK | Self::REFPACK_ALT => Ok(CompressionMethod::RefPack),
            _ => Err(CompressionError::UnknownMethod(value)),
        }
    }
}

/// Decompresses resource data stored with the given compression code.
///
/// When `expected_size` is given the output must have exactly that length. For RefPack it also
/// replaces the size embedded in the stream header.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn decompress(
    data: &[u8],
    compression_type: u16,
    expected_size: Option<usize>,
) -> Result<Vec<u8>, CompressionError> {
    match CompressionMethod::try_from(compression_type)? {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Deflate => decompress_deflate(data, expected_size),
        CompressionMethod::RefPack => refpack::decompress(data, expected_size),
    }
}

/// Compresses data for storage with the given method.
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>, CompressionError> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Deflate => compress_deflate(data),
        CompressionMethod::RefPack => Err(CompressionError::Unsupported(method.code())),
    }
}

/// Inflates raw DEFLATE data that follows the 2-byte prefix
pub fn decompress_deflate(
    data: &[u8],
    expected_size: Option<usize>,
) -> Result<Vec<u8>, CompressionError> {
    let Some(stream) = data.get(DEFLATE_PREFIX.len()..) else {
        return Err(CompressionError::Truncated("deflate data too short"));
    };

    let mut output = Vec::with_capacity(expected_size.unwrap_or(stream.len() * 2));
    DeflateDecoder::new(stream)
        .read_to_end(&mut output)
        .map_err(CompressionError::Deflate)?;

    match expected_size {
        Some(expected) if output.len() != expected => Err(CompressionError::SizeMismatch {
            actual: output.len(),
            expected,
        }),
        _ => Ok(output),
    }
}

/// Deflates data at maximum effort behind the 2-byte prefix
pub fn compress_deflate(data: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let mut block = ResourceBlockWriter::new(Vec::with_capacity(data.len() / 2 + 16), true)
        .map_err(CompressionError::Deflate)?;
    block.write_all(data).map_err(CompressionError::Deflate)?;
    block.finalize().map_err(CompressionError::Deflate)
}

/// Streams one resource's bytes into `W`, deflating them on the way when requested
pub(crate) enum ResourceBlockWriter<W: Write> {
    Raw(W, usize),
    Deflate(Box<DeflateEncoder<W>>),
}

impl<W: Write> ResourceBlockWriter<W> {
    #[tracing::instrument(skip(writer))]
    pub fn new(mut writer: W, compress: bool) -> io::Result<Self> {
        if !compress {
            return Ok(ResourceBlockWriter::Raw(writer, 0));
        }

        writer.write_all(&DEFLATE_PREFIX)?;
        Ok(ResourceBlockWriter::Deflate(Box::new(DeflateEncoder::new(
            writer,
            Compression::best(),
        ))))
    }

    pub fn method(&self) -> CompressionMethod {
        match self {
            ResourceBlockWriter::Raw(..) => CompressionMethod::None,
            ResourceBlockWriter::Deflate(_) => CompressionMethod::Deflate,
        }
    }

    #[instrument(skip(self), err)]
    pub fn finalize(self) -> io::Result<W> {
        match self {
            ResourceBlockWriter::Raw(w, _) => Ok(w),
            ResourceBlockWriter::Deflate(w) => w.finish(),
        }
    }

    /// Number of uncompressed bytes written so far
    pub fn total_in(&self) -> u64 {
        match self {
            ResourceBlockWriter::Raw(_, c) => *c as u64,
            ResourceBlockWriter::Deflate(w) => w.total_in(),
        }
    }
}

impl<W: Write> Write for ResourceBlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ResourceBlockWriter::Raw(w, c) => {
                let written = w.write(buf)?;
                *c += written;
                Ok(written)
            }
            ResourceBlockWriter::Deflate(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ResourceBlockWriter::Raw(w, _) => w.flush(),
            ResourceBlockWriter::Deflate(w) => w.flush(),
        }
    }
}
