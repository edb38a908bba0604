//! Reading and building the index table that follows the resource data.
//!
//! The table starts with a flags word. Each of its low four bits marks one of the type, group,
//! instance-high and instance-low fields as constant: the value is stored once right after the
//! flags word and omitted from every entry.

use std::io::{self, Cursor, Read};

use binrw::BinWrite;
use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, instrument};

use crate::compression::CompressionMethod;
use crate::error::{Error, Result};
use crate::types::{IndexRecord, Tgi, INDEX_RECORD_SIZE};

/// Top bit of the on-disk file size, reserved for extended compression info
const FILE_SIZE_EXTENDED_FLAG: u32 = 0x8000_0000;

const CONSTANT_FIELDS: [&str; 4] = ["type_id", "group_id", "instance_hi", "instance_lo"];

/// A single resource entry in the index
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Resource type
    pub type_id: u32,
    /// Resource group
    pub group_id: u32,
    /// Combined `instance_hi << 32 | instance_lo`
    pub instance_id: u64,
    /// Offset of the resource data from the start of the file
    pub offset: u32,
    /// Stored size with the reserved top bit masked off
    pub compressed_size: u32,
    /// Size once decompressed
    pub uncompressed_size: u32,
    /// Raw compression type code
    pub compression_type: u16,
}

impl IndexEntry {
    /// The TGI naming this entry
    pub fn tgi(&self) -> Tgi {
        Tgi::new(self.type_id, self.group_id, self.instance_id)
    }

    /// True if resource data is stored with any compression
    pub fn is_compressed(&self) -> bool {
        self.compression_type != CompressionMethod::NONE
    }

    fn record(&self) -> IndexRecord {
        IndexRecord {
            type_id: self.type_id,
            group_id: self.group_id,
            instance_hi: (self.instance_id >> 32) as u32,
            instance_lo: self.instance_id as u32,
            offset: self.offset,
            file_size: self.compressed_size,
            mem_size: self.uncompressed_size,
            compression: self.compression_type,
        }
    }
}

/// Field values shared by every entry, as announced by the flags word
#[derive(Debug, Default)]
struct Constants([Option<u32>; 4]);

impl Constants {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let flags = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupted(e, "index too short: missing flags".into()))?;

        let mut constants = Constants::default();
        for (bit, name) in CONSTANT_FIELDS.iter().enumerate() {
            if flags & (1 << bit) != 0 {
                let value = reader
                    .read_u32::<LittleEndian>()
                    .map_err(|e| corrupted(e, format!("index too short: missing constant {name}")))?;
                constants.0[bit] = Some(value);
            }
        }

        debug!(flags, constants = ?constants.0, "read index flags");
        Ok(constants)
    }
}

/// Parses `entry_count` entries from a reader positioned at the start of the index.
///
/// Nothing is read when `entry_count` is zero.
///
/// # Errors
///
/// [`Error::CorruptedIndex`] when the data ends before every declared entry has been read.
#[instrument(skip(reader), err)]
pub fn parse_index<R: Read>(reader: &mut R, entry_count: u32) -> Result<Vec<IndexEntry>> {
    if entry_count == 0 {
        return Ok(Vec::new());
    }

    let constants = Constants::read(reader)?;

    (0..entry_count as usize)
        .map(|index| read_entry(reader, &constants, index))
        .collect()
}

fn read_entry<R: Read>(reader: &mut R, constants: &Constants, index: usize) -> Result<IndexEntry> {
    let mut field = |slot: Option<usize>, name: &str| -> Result<u32> {
        if let Some(value) = slot.and_then(|s| constants.0[s]) {
            return Ok(value);
        }
        reader
            .read_u32::<LittleEndian>()
            .map_err(|e| corrupted(e, format!("unexpected end of index at entry {index} ({name})")))
    };

    let type_id = field(Some(0), "type_id")?;
    let group_id = field(Some(1), "group_id")?;
    let instance_hi = field(Some(2), "instance_hi")?;
    let instance_lo = field(Some(3), "instance_lo")?;
    let offset = field(None, "offset")?;
    let file_size = field(None, "file_size")?;
    let uncompressed_size = field(None, "mem_size")?;
    // compression code followed by two bytes of padding
    let compression = field(None, "compression")?;

    Ok(IndexEntry {
        type_id,
        group_id,
        instance_id: (u64::from(instance_hi) << 32) | u64::from(instance_lo),
        offset,
        compressed_size: file_size & !FILE_SIZE_EXTENDED_FLAG,
        uncompressed_size,
        compression_type: compression as u16,
    })
}

/// Builds an index table with no constant fields.
pub fn build_index(entries: &[IndexEntry]) -> Result<Vec<u8>> {
    let mut index = Cursor::new(Vec::with_capacity(4 + entries.len() * INDEX_RECORD_SIZE));
    0u32.write_le(&mut index)?;
    for entry in entries {
        entry.record().write(&mut index)?;
    }
    Ok(index.into_inner())
}

fn corrupted(error: io::Error, message: String) -> Error {
    match error.kind() {
        io::ErrorKind::UnexpectedEof => Error::CorruptedIndex(message),
        _ => Error::IOError(error),
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::index::{build_index, parse_index, IndexEntry};

    fn push(buffer: &mut Vec<u8>, values: &[u32]) {
        for value in values {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
    }

    #[test]
    fn read_empty_index() -> Result<()> {
        let mut input = Cursor::new(Vec::new());

        assert!(parse_index(&mut input, 0)?.is_empty());
        assert_eq!(input.position(), 0);

        Ok(())
    }

    #[test]
    fn read_variable_entries() -> Result<()> {
        let mut input = Vec::new();
        push(&mut input, &[0]);
        push(&mut input, &[0x220557DA, 0, 0x1, 0x12345678, 96, 11, 11, 0x5A42]);
        push(&mut input, &[0x0333406C, 7, 0, 0x9, 107, 5, 5, 0]);

        let entries = parse_index(&mut Cursor::new(input), 2)?;

        assert_eq!(
            entries,
            vec![
                IndexEntry {
                    type_id: 0x220557DA,
                    group_id: 0,
                    instance_id: 0x0000_0001_1234_5678,
                    offset: 96,
                    compressed_size: 11,
                    uncompressed_size: 11,
                    compression_type: 0x5A42,
                },
                IndexEntry {
                    type_id: 0x0333406C,
                    group_id: 7,
                    instance_id: 9,
                    offset: 107,
                    compressed_size: 5,
                    uncompressed_size: 5,
                    compression_type: 0,
                },
            ]
        );
        assert!(entries[0].is_compressed());
        assert!(!entries[1].is_compressed());

        Ok(())
    }

    #[test]
    fn read_constant_fields() -> Result<()> {
        let mut input = Vec::new();
        // type and group are shared, the group constant is zero
        push(&mut input, &[0b0011, 0x0333406C, 0]);
        push(&mut input, &[0, 1, 96, 4, 4, 0]);
        push(&mut input, &[0, 2, 100, 4, 4, 0]);

        let entries = parse_index(&mut Cursor::new(input), 2)?;

        assert_eq!(entries.len(), 2);
        for (entry, instance) in entries.iter().zip([1, 2]) {
            assert_eq!(entry.type_id, 0x0333406C);
            assert_eq!(entry.group_id, 0);
            assert_eq!(entry.instance_id, instance);
        }
        assert_eq!(entries[1].offset, 100);

        Ok(())
    }

    #[test]
    fn read_constant_instance_halves() -> Result<()> {
        let mut input = Vec::new();
        push(&mut input, &[0b1100, 0xDEADBEEF, 0x00000007]);
        push(&mut input, &[0x0333406C, 0, 96, 4, 4, 0]);
        push(&mut input, &[0x220557DA, 0x80000000, 100, 8, 16, 0x5A42]);

        let entries = parse_index(&mut Cursor::new(input), 2)?;

        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.instance_id, 0xDEADBEEF_00000007);
        }
        assert_eq!(entries[0].type_id, 0x0333406C);
        assert_eq!(entries[1].type_id, 0x220557DA);
        assert_eq!(entries[1].group_id, 0x80000000);
        assert_eq!(entries[1].offset, 100);
        assert_eq!(entries[1].uncompressed_size, 16);

        Ok(())
    }

    #[test]
    fn read_masks_extended_size_flag() -> Result<()> {
        let mut input = Vec::new();
        push(&mut input, &[0, 1, 2, 3, 4, 96, 0x8000_0010, 32, 0x5A42]);

        let entries = parse_index(&mut Cursor::new(input), 1)?;
        assert_eq!(entries[0].compressed_size, 0x10);

        Ok(())
    }

    #[test]
    fn read_truncated_record() {
        let mut input = Vec::new();
        push(&mut input, &[0, 1, 2, 3, 4, 96]);

        let result = parse_index(&mut Cursor::new(input), 1);
        assert!(matches!(result, Err(Error::CorruptedIndex(_))));
    }

    #[test]
    fn read_fewer_entries_than_declared() {
        let mut input = Vec::new();
        push(&mut input, &[0, 1, 2, 3, 4, 96, 4, 4, 0]);

        let result = parse_index(&mut Cursor::new(input), 2);
        assert!(matches!(result, Err(Error::CorruptedIndex(_))));
    }

    #[test]
    fn read_missing_flags() {
        let result = parse_index(&mut Cursor::new(vec![0, 0]), 1);
        assert!(matches!(result, Err(Error::CorruptedIndex(_))));
    }

    #[test]
    fn write_index() -> Result<()> {
        let entries = [
            IndexEntry {
                type_id: 0x220557DA,
                group_id: 0x80000000,
                instance_id: 0xAABB_CCDD_0011_2233,
                offset: 96,
                compressed_size: 20,
                uncompressed_size: 40,
                compression_type: 0x5A42,
            },
            IndexEntry {
                type_id: 1,
                offset: 116,
                compressed_size: 3,
                uncompressed_size: 3,
                ..Default::default()
            },
        ];

        let index = build_index(&entries)?;
        assert_eq!(index.len(), 4 + 2 * 32);
        assert_eq!(&index[..4], &[0, 0, 0, 0]);
        assert_eq!(&index[12..16], &0xAABB_CCDDu32.to_le_bytes());
        assert_eq!(&index[16..20], &0x0011_2233u32.to_le_bytes());

        assert_eq!(parse_index(&mut Cursor::new(index), 2)?, entries);

        Ok(())
    }
}
