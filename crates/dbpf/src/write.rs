//! Types for writing DBPF packages
//!

use bon::Builder;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, Level};

use crate::compression::ResourceBlockWriter;
use crate::error::{Error, Result};
use crate::index::{build_index, IndexEntry};
use crate::types::{DbpfHeader, Tgi, HEADER_SIZE};

/// An owned resource ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceData {
    /// Type, group and instance of the resource
    pub tgi: Tgi,

    /// Uncompressed resource bytes
    pub data: Vec<u8>,

    /// Whether to store the data with the DEFLATE variant
    pub compress: bool,
}

impl ResourceData {
    /// Creates a resource record
    pub fn new(tgi: Tgi, data: impl Into<Vec<u8>>, compress: bool) -> Self {
        Self {
            tgi,
            data: data.into(),
            compress,
        }
    }
}

/// Options for how a package file should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct WriteOptions {
    /// Copy an existing target to `<path>.bak` first, unless that backup already exists
    #[builder(default)]
    pub create_backup: bool,

    /// Write to `<path>.tmp` and rename it over the target instead of truncating the target in place
    #[builder(default)]
    pub atomic: bool,
}

/// DBPF package generator
///
/// ```
/// # fn doit() -> dbpf::error::Result<()>
/// # {
/// use std::io::Write;
/// use dbpf::{DbpfWriter, Tgi};
///
/// let mut package = DbpfWriter::new(Vec::new());
///
/// package.start_resource(Tgi::new(0x220557DA, 0, 1), true)?;
/// package.write_all(b"Hello, World!")?;
///
/// // Apply the changes you've made.
/// let bytes = package.finish()?;
/// assert_eq!(&bytes[..4], b"DBPF");
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct DbpfWriter<W: Write> {
    inner: W,
    data_block: Vec<u8>,
    current: Option<(Tgi, ResourceBlockWriter<Vec<u8>>)>,
    entries: Vec<IndexEntry>,
}

impl<W: Write> DbpfWriter<W> {
    /// Initializes the package.
    ///
    /// Before writing to this object, the [`DbpfWriter::start_resource`] function should be called.
    pub fn new(inner: W) -> DbpfWriter<W> {
        DbpfWriter {
            inner,
            data_block: Vec::new(),
            current: None,
            entries: Vec::new(),
        }
    }

    /// Returns true if a resource is currently open for writing.
    pub const fn is_writing_resource(&self) -> bool {
        self.current.is_some()
    }

    /// Index entries of the resources finished so far
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Start a new resource, compressed with the DEFLATE variant when `compress` is set.
    #[instrument(skip(self), fields(tgi = %tgi), err)]
    pub fn start_resource(&mut self, tgi: Tgi, compress: bool) -> Result<()> {
        self.finish_resource()?;
        self.current = Some((tgi, ResourceBlockWriter::new(Vec::new(), compress)?));
        Ok(())
    }

    /// Writes a complete resource
    pub fn add_resource(&mut self, resource: &ResourceData) -> Result<()> {
        self.start_resource(resource.tgi, resource.compress)?;
        self.write_all(&resource.data)?;
        self.finish_resource()
    }

    /// Closes the open resource, if any, and records its index entry
    #[instrument(skip(self), err)]
    pub fn finish_resource(&mut self) -> Result<()> {
        let Some((tgi, block)) = self.current.take() else {
            return Ok(());
        };

        let method = block.method();
        let uncompressed = block.total_in();
        let stored = block.finalize()?;

        let entry = IndexEntry {
            type_id: tgi.type_id,
            group_id: tgi.group_id,
            instance_id: tgi.instance_id,
            offset: to_u32(HEADER_SIZE + self.data_block.len())?,
            compressed_size: to_u32(stored.len())?,
            uncompressed_size: u32::try_from(uncompressed).map_err(|_| Error::PackageTooLarge)?,
            compression_type: method.code(),
        };
        debug!(?entry, "finished resource");

        self.entries.push(entry);
        self.data_block.extend_from_slice(&stored);
        Ok(())
    }

    /// Finish the last resource and write the header, resource data and index
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_resource()?;

        let index = build_index(&self.entries)?;
        let header = DbpfHeader::build(
            to_u32(self.entries.len())?,
            to_u32(HEADER_SIZE + self.data_block.len())?,
            to_u32(index.len())?,
        )?;

        self.inner.write_all(&header)?;
        self.inner.write_all(&self.data_block)?;
        self.inner.write_all(&index)?;

        Ok(self.inner)
    }
}

impl<W: Write> Write for DbpfWriter<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some((_, block)) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No resource has been started",
            ));
        };
        block.write(buf)
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::PackageTooLarge)
}

/// Path of the backup kept next to `path`
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".bak")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes a package containing `resources`, in order, to `path`.
pub fn write_package(path: &Path, resources: &[ResourceData], options: WriteOptions) -> Result<()> {
    write_package_image(path, resources, options).map(|_| ())
}

#[instrument(skip(resources), fields(path = %path.display(), resources = resources.len()), err)]
pub(crate) fn write_package_image(
    path: &Path,
    resources: &[ResourceData],
    options: WriteOptions,
) -> Result<Vec<u8>> {
    if options.create_backup && path.exists() {
        let backup = backup_path(path);
        if !backup.exists() {
            info!("backing up to {}", backup.display());
            fs::copy(path, &backup)?;
        }
    }

    let mut writer = DbpfWriter::new(Vec::new());
    for resource in resources {
        writer.add_resource(resource)?;
    }
    let image = writer.finish()?;

    if options.atomic {
        let staging = sibling(path, ".tmp");
        if let Err(e) = fs::write(&staging, &image).and_then(|()| fs::rename(&staging, path)) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
    } else {
        fs::write(path, &image)?;
    }

    info!(bytes = image.len(), "wrote {}", path.display());
    Ok(image)
}

#[cfg(test)]
mod test {
    use pretty_assertions::{assert_eq, assert_str_eq};
    use std::io::{Cursor, Write};
    use tracing_test::traced_test;

    use crate::compression::{self, CompressionMethod};
    use crate::error::Result;
    use crate::index::parse_index;
    use crate::types::{DbpfHeader, Tgi, HEADER_SIZE};
    use crate::write::{DbpfWriter, ResourceData};

    const HELLO: &[u8] = b"Hello World";
    const WORLD: &[u8] = b"World Hello";

    #[traced_test]
    #[test]
    fn empty_write() -> Result<()> {
        let mut expected = DbpfHeader::build(0, 96, 4)?;
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let result = DbpfWriter::new(Vec::new()).finish()?;
        assert_eq!(result.len(), expected.len());
        assert_str_eq!(format!("{:02X?}", result), format!("{:02X?}", expected));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn uncompressed_write() -> Result<()> {
        let mut writer = DbpfWriter::new(Vec::new());
        writer.start_resource(Tgi::new(1, 2, 3), false)?;
        writer.write_all(HELLO)?;

        let result = writer.finish()?;

        #[rustfmt::skip]
        let mut expected = DbpfHeader::build(1, 107, 36)?;
        expected.extend_from_slice(HELLO);
        expected.extend_from_slice(&[
            // Flags
            0x00, 0x00, 0x00, 0x00,
            // Type, group, instance
            0x01, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            // Offset, file size, memory size
            0x60, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            0x0B, 0x00, 0x00, 0x00,
            // Compression, padding
            0x00, 0x00, 0x00, 0x00,
        ]);

        assert_str_eq!(format!("{:02X?}", result), format!("{:02X?}", expected));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn compressed_write() -> Result<()> {
        let mut writer = DbpfWriter::new(Vec::new());
        writer.add_resource(&ResourceData::new(Tgi::new(1, 0, 7), HELLO, true))?;

        let entry = writer.entries()[0];
        assert_eq!(entry.compression_type, CompressionMethod::DEFLATE);
        assert_eq!(entry.uncompressed_size, HELLO.len() as u32);

        let result = writer.finish()?;
        let start = entry.offset as usize;
        let stored = &result[start..start + entry.compressed_size as usize];
        assert_eq!(&stored[..2], &compression::DEFLATE_PREFIX);
        assert_eq!(
            compression::decompress(stored, entry.compression_type, Some(HELLO.len()))?,
            HELLO
        );

        Ok(())
    }

    #[test]
    fn offsets_follow_stored_sizes() -> Result<()> {
        let resources = [
            ResourceData::new(Tgi::new(1, 0, 1), HELLO, false),
            ResourceData::new(Tgi::new(1, 0, 2), HELLO.repeat(40), true),
            ResourceData::new(Tgi::new(2, 0, 3), WORLD, false),
            ResourceData::new(Tgi::new(2, 0, 4), Vec::new(), true),
        ];

        let mut writer = DbpfWriter::new(Vec::new());
        for resource in &resources {
            writer.add_resource(resource)?;
        }
        let entries = writer.entries().to_vec();
        let result = writer.finish()?;

        let mut expected_offset = HEADER_SIZE as u32;
        for entry in &entries {
            assert_eq!(entry.offset, expected_offset);
            expected_offset += entry.compressed_size;
        }

        let header = DbpfHeader::parse(&mut Cursor::new(&result))?;
        assert_eq!(header.entry_count, 4);
        assert_eq!(header.index_position, expected_offset);
        assert_eq!(header.index_size, 4 + 4 * 32);
        assert_eq!(result.len(), (expected_offset + header.index_size) as usize);

        let mut index = Cursor::new(&result[header.index_position as usize..]);
        assert_eq!(parse_index(&mut index, header.entry_count)?, entries);

        Ok(())
    }

    #[test]
    fn write_without_resource_fails() {
        let mut writer = DbpfWriter::new(Vec::new());

        assert!(writer.write_all(HELLO).is_err());
        assert!(!writer.is_writing_resource());
    }
}
