//! RefPack decompression.
//!
//! RefPack is the LZ77 variant EA uses in its packages. A stream starts with the two magic bytes
//! `10 FB` and the uncompressed size as a 24-bit big endian integer, followed by commands:
//!
//! | Command       | Extra bytes | Meaning                                                    |
//! |---------------|-------------|------------------------------------------------------------|
//! | `0x00..=0x7F` | 1 + 0..=3   | 0..=3 literals, then a copy of 3..=34 bytes, offset < 256  |
//! | `0x80..=0xBF` | 1           | copy of 3..=10 bytes, offset < 1024                        |
//! | `0xC0..=0xDF` | 2           | copy of 4..=11 bytes, offset < 16384                       |
//! | `0xE0..=0xFB` | 1..=28      | literal run of `cmd - 0xDF` bytes                          |
//! | `0xFC..=0xFF` | 0..=3       | stop, after `cmd - 0xFC` trailing literals                 |
//!
//! Copy offsets are distances back from the end of the output, counted from 1.

use tracing::{trace, warn};

use crate::error::CompressionError;

/// Magic bytes at the start of every RefPack stream
pub const MAGIC: [u8; 2] = [0x10, 0xFB];

const HEADER_SIZE: usize = 5;

/// Decompresses a RefPack stream.
///
/// A caller supplied `expected_size` takes precedence over the size stored in the stream header.
pub fn decompress(data: &[u8], expected_size: Option<usize>) -> Result<Vec<u8>, CompressionError> {
    if data.len() < HEADER_SIZE {
        return Err(CompressionError::Truncated("RefPack data too short for header"));
    }
    if data[..2] != MAGIC {
        return Err(CompressionError::BadMagic(data[0], data[1]));
    }

    let embedded_size = u32::from_be_bytes([0, data[2], data[3], data[4]]) as usize;
    let target = match expected_size {
        Some(expected) if expected != embedded_size => {
            warn!(embedded_size, expected, "RefPack header size differs, using expected size");
            expected
        }
        _ => embedded_size,
    };

    let mut stream = CommandStream {
        input: &data[HEADER_SIZE..],
        position: 0,
        output: Vec::with_capacity(target),
    };
    stream.run(target)?;

    if stream.output.len() != target {
        return Err(CompressionError::SizeMismatch {
            actual: stream.output.len(),
            expected: target,
        });
    }
    Ok(stream.output)
}

struct CommandStream<'a> {
    input: &'a [u8],
    position: usize,
    output: Vec<u8>,
}

impl CommandStream<'_> {
    fn run(&mut self, target: usize) -> Result<(), CompressionError> {
        while self.output.len() < target {
            let Some(command) = self.next_byte() else {
                break;
            };

            match command {
                0x00..=0x7F => {
                    self.literals(usize::from((command >> 5) & 0x03))?;
                    let b1 = self.require_byte("short copy")?;
                    let offset = (usize::from(command & 0x1F) << 3) | usize::from(b1 >> 5);
                    let length = usize::from(b1 & 0x1F) + 3;
                    self.copy(offset + 1, length)?;
                }
                0x80..=0xBF => {
                    let b1 = self.require_byte("medium copy")?;
                    let offset = (usize::from(command & 0x03) << 8) | usize::from(b1);
                    let length = usize::from((command >> 2) & 0x07) + 3;
                    self.copy(offset + 1, length)?;
                }
                0xC0..=0xDF => {
                    let b1 = self.require_byte("long copy")?;
                    let b2 = self.require_byte("long copy")?;
                    let offset = (usize::from(command & 0x03) << 12)
                        | (usize::from(b1) << 4)
                        | usize::from(b2 >> 4);
                    let length = usize::from((command >> 2) & 0x0F) + 4;
                    self.copy(offset + 1, length)?;
                }
                0xE0..=0xFB => {
                    self.literals(usize::from(command - 0xDF))?;
                }
                0xFC..=0xFF => {
                    let trailing = usize::from(command - 0xFC);
                    let available = trailing.min(self.input.len() - self.position);
                    self.literals(available)?;
                    trace!(trailing, available, "stop code");
                    break;
                }
            }
        }
        Ok(())
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.position).copied()?;
        self.position += 1;
        Some(byte)
    }

    fn require_byte(&mut self, context: &'static str) -> Result<u8, CompressionError> {
        self.next_byte().ok_or(CompressionError::Truncated(context))
    }

    fn literals(&mut self, count: usize) -> Result<(), CompressionError> {
        let end = self.position + count;
        let Some(bytes) = self.input.get(self.position..end) else {
            return Err(CompressionError::Truncated("literal run"));
        };
        self.output.extend_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Copies `length` bytes starting `offset` bytes back. Source and destination may overlap, so
    /// bytes are pushed one at a time to repeat the freshly written ones.
    fn copy(&mut self, offset: usize, length: usize) -> Result<(), CompressionError> {
        let available = self.output.len();
        if offset > available {
            return Err(CompressionError::InvalidBackReference { offset, available });
        }

        let start = available - offset;
        self.output.reserve(length);
        for i in start..start + length {
            let byte = self.output[i];
            self.output.push(byte);
        }
        Ok(())
    }
}
