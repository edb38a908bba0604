//! Base types for structure of DBPF file.

use std::io::{Cursor, Read};
use std::str::FromStr;

use binrw::{BinRead, BinWrite};
use derive_more::{Constructor, Display};
use tracing::trace;

use crate::error::{Error, Result};

/// Size in bytes of the fixed header at the start of every package
pub const HEADER_SIZE: usize = 96;

/// Magic tag every package starts with
pub const MAGIC: &[u8; 4] = b"DBPF";

/// The only major version this library reads
pub const SUPPORTED_MAJOR_VERSION: u32 = 2;

/// Minor version written into new packages
pub const WRITTEN_MINOR_VERSION: u32 = 1;

/// DBPF file header
///
/// The header is a fixed 96 byte block starting with "DBPF". Only the fields below carry meaning,
/// the gaps between them are reserved and written as zero. All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"DBPF", little)]
pub struct DbpfHeader {
    /// Major format version, always 2 for supported packages
    pub version_major: u32,

    /// Minor format version
    pub version_minor: u32,

    /// The number of entries stored in the index
    #[brw(pad_before = 24)]
    pub entry_count: u32,

    /// The size in bytes of the index table
    #[brw(pad_before = 4)]
    pub index_size: u32,

    /// The offset from the beginning of the file where the index starts
    #[brw(pad_before = 16, pad_after = 28)]
    pub index_position: u32,
}

impl DbpfHeader {
    /// Creates the header written for new packages, version 2.1
    pub fn new(entry_count: u32, index_position: u32, index_size: u32) -> Self {
        Self {
            version_major: SUPPORTED_MAJOR_VERSION,
            version_minor: WRITTEN_MINOR_VERSION,
            entry_count,
            index_size,
            index_position,
        }
    }

    /// Reads and validates the 96 byte header block.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMagic`] when fewer than 96 bytes are available or the tag is not `DBPF`,
    /// [`Error::UnsupportedVersion`] when the major version is not 2.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut block = Vec::with_capacity(HEADER_SIZE);
        reader.by_ref().take(HEADER_SIZE as u64).read_to_end(&mut block)?;

        if block.len() < HEADER_SIZE {
            return Err(Error::InvalidMagic(format!(
                "file too small to be a package ({} bytes)",
                block.len()
            )));
        }

        let header = DbpfHeader::read(&mut Cursor::new(&block)).map_err(|e| match e {
            binrw::Error::BadMagic { .. } => Error::InvalidMagic(format!(
                "found {:?}, expected {:?}",
                String::from_utf8_lossy(&block[..4]),
                String::from_utf8_lossy(MAGIC)
            )),
            e => Error::from(e),
        })?;

        if header.version_major != SUPPORTED_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion {
                major: header.version_major,
                minor: header.version_minor,
            });
        }

        trace!(?header, "parsed header");
        Ok(header)
    }

    /// Emits the 96 byte block for a version 2.1 header
    pub fn build(entry_count: u32, index_position: u32, index_size: u32) -> Result<Vec<u8>> {
        let mut block = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        DbpfHeader::new(entry_count, index_position, index_size).write(&mut block)?;
        Ok(block.into_inner())
    }

    /// Version as a `(major, minor)` pair
    pub fn version(&self) -> (u32, u32) {
        (self.version_major, self.version_minor)
    }
}

/// Type, group and instance triple naming a resource
///
/// Displayed and parsed as `TTTTTTTT:GGGGGGGG:IIIIIIIIIIIIIIII`. A package may hold several resources
/// with the same TGI.
#[derive(Debug, Display, Constructor, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("{type_id:08X}:{group_id:08X}:{instance_id:016X}")]
pub struct Tgi {
    /// Resource type
    pub type_id: u32,

    /// Resource group
    pub group_id: u32,

    /// 64-bit resource instance
    pub instance_id: u64,
}

impl FromStr for Tgi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTgi(s.to_owned());

        let mut parts = s.trim().split(':');
        let (Some(t), Some(g), Some(i), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        fn hex(part: &str) -> &str {
            part.strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part)
        }

        Ok(Tgi {
            type_id: u32::from_str_radix(hex(t), 16).map_err(|_| invalid())?,
            group_id: u32::from_str_radix(hex(g), 16).map_err(|_| invalid())?,
            instance_id: u64::from_str_radix(hex(i), 16).map_err(|_| invalid())?,
        })
    }
}

/// One fully variable index record as written to disk
///
/// Written packages never use constant index fields, so every record is 32 bytes.
#[derive(BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[bw(little)]
pub struct IndexRecord {
    /// Resource type
    pub type_id: u32,

    /// Resource group
    pub group_id: u32,

    /// Upper 32 bits of the instance
    pub instance_hi: u32,

    /// Lower 32 bits of the instance
    pub instance_lo: u32,

    /// Offset of the resource data from the start of the file
    pub offset: u32,

    /// Stored size of the resource data
    pub file_size: u32,

    /// Size of the resource data once decompressed
    pub mem_size: u32,

    /// Compression type code
    #[bw(pad_after = 2)]
    pub compression: u16,
}

/// Size in bytes of one [`IndexRecord`]
pub const INDEX_RECORD_SIZE: usize = 32;
