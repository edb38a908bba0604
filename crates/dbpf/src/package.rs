//! Types for reading and editing DBPF packages
//!

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::error::{Error, ResourceNotFoundError, Result};
use crate::index::parse_index;
use crate::resource::{DbpfResource, ResourceSlot};
use crate::source::ByteSource;
use crate::types::{DbpfHeader, Tgi};
use crate::write::{write_package_image, ResourceData, WriteOptions};

/// A pending modification of a package, applied when the package is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Append a resource
    Insert(ResourceData),
    /// Drop every resource with this TGI, including earlier pending inserts
    Delete(Tgi),
}

/// DBPF package reader and editor
///
/// Resources are listed from the index when the package is opened, their data is only read on
/// [`DbpfResource::extract`]. Edits are queued and only reach the disk on [`DbpfPackage::save`].
///
/// ```no_run
/// fn list_package_contents(path: &std::path::Path) -> dbpf::error::Result<()> {
///     let package = dbpf::DbpfPackage::open(path)?;
///
///     for resource in package.resources() {
///         println!("{resource}");
///         let data = resource.extract()?;
///         println!("{} bytes extracted", data.len());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DbpfPackage {
    path: Option<PathBuf>,
    header: DbpfHeader,
    source: RefCell<ByteSource>,
    slots: Vec<ResourceSlot>,
    changes: Vec<Change>,
    modified: bool,
}

impl DbpfPackage {
    /// Opens the package at `path`, reading its header and index.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> Result<DbpfPackage> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let mut package = Self::load(ByteSource::File(BufReader::new(file)))?;
        package.path = Some(path.to_path_buf());
        Ok(package)
    }

    /// Reads a package held in memory. The result has no origin path, so it can only be saved with
    /// [`DbpfPackage::save_as`].
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<DbpfPackage> {
        Self::load(ByteSource::Memory(Cursor::new(bytes.into())))
    }

    fn load(mut source: ByteSource) -> Result<DbpfPackage> {
        source.seek(SeekFrom::Start(0))?;
        let header = DbpfHeader::parse(&mut source)?;

        source.seek(SeekFrom::Start(u64::from(header.index_position)))?;
        let entries = parse_index(&mut source, header.entry_count)?;
        debug!(
            version = ?header.version(),
            entries = entries.len(),
            "loaded package index"
        );

        Ok(DbpfPackage {
            path: None,
            header,
            source: RefCell::new(source),
            slots: entries.into_iter().map(ResourceSlot::new).collect(),
            changes: Vec::new(),
            modified: false,
        })
    }

    /// Format version as `(major, minor)`
    pub fn version(&self) -> (u32, u32) {
        self.header.version()
    }

    /// The header as it was read, or as written by the last save
    pub fn header(&self) -> &DbpfHeader {
        &self.header
    }

    /// Path the package was opened from
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of committed resources. Pending additions are not counted until saved.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether this package has no committed resources
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the committed resources in index order.
    pub fn resources(&self) -> impl Iterator<Item = DbpfResource<'_>> {
        self.slots
            .iter()
            .map(|slot| DbpfResource::new(slot, &self.source))
    }

    /// Get a contained resource by index
    pub fn by_index(&self, index: usize) -> Result<DbpfResource<'_>> {
        self.slots
            .get(index)
            .map(|slot| DbpfResource::new(slot, &self.source))
            .ok_or(Error::ResourceNotFound(ResourceNotFoundError::Index(index)))
    }

    /// All resources of the given type, in index order
    pub fn find_by_type(&self, type_id: u32) -> Vec<DbpfResource<'_>> {
        self.resources()
            .filter(|resource| resource.type_id() == type_id)
            .collect()
    }

    /// First resource with the given instance ID
    pub fn find_by_instance(&self, instance_id: u64) -> Option<DbpfResource<'_>> {
        self.resources()
            .find(|resource| resource.instance_id() == instance_id)
    }

    /// First resource with the given TGI
    pub fn find_by_tgi(&self, tgi: Tgi) -> Option<DbpfResource<'_>> {
        self.resources().find(|resource| resource.tgi() == tgi)
    }

    /// Search for a resource by TGI
    pub fn get(&self, tgi: Tgi) -> Result<DbpfResource<'_>> {
        self.find_by_tgi(tgi)
            .ok_or(Error::ResourceNotFound(ResourceNotFoundError::Tgi(tgi)))
    }

    /// Search for a resource by instance ID
    pub fn get_by_instance(&self, instance_id: u64) -> Result<DbpfResource<'_>> {
        self.find_by_instance(instance_id)
            .ok_or(Error::ResourceNotFound(ResourceNotFoundError::Instance(
                instance_id,
            )))
    }

    /// Queues a new resource. Adding a TGI that already exists keeps both.
    pub fn add_resource(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>, compress: bool) {
        debug!(%tgi, compress, "queued insert");
        self.changes
            .push(Change::Insert(ResourceData::new(tgi, data, compress)));
        self.modified = true;
    }

    /// Queues the removal of every resource with this TGI, including pending additions.
    pub fn remove_resource(&mut self, tgi: Tgi) {
        debug!(%tgi, "queued delete");
        self.changes.push(Change::Delete(tgi));
        self.modified = true;
    }

    /// Replaces every resource with this TGI by a single new one
    pub fn update_resource(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>, compress: bool) {
        self.remove_resource(tgi);
        self.add_resource(tgi, data, compress);
    }

    /// Queues an already built change
    pub fn apply(&mut self, change: Change) {
        match change {
            Change::Insert(resource) => {
                self.add_resource(resource.tgi, resource.data, resource.compress)
            }
            Change::Delete(tgi) => self.remove_resource(tgi),
        }
    }

    /// Flags the package as modified, so the next save keeps a backup of the original
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// Whether the package changed since it was opened or last saved
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Changes queued since the package was opened or last saved
    pub fn pending_changes(&self) -> &[Change] {
        &self.changes
    }

    /// Whether there are queued changes
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drops the queued changes. The modified flag is kept.
    pub fn discard_changes(&mut self) {
        self.changes.clear();
    }

    /// The resources a save would write, in order.
    ///
    /// Committed resources survive unless deleted and keep their order and compression flag,
    /// surviving pending inserts follow in the order they were queued.
    pub fn staged_resources(&self) -> Result<Vec<ResourceData>> {
        let mut removed = HashSet::new();
        let mut inserts: Vec<&ResourceData> = Vec::new();

        for change in &self.changes {
            match change {
                Change::Delete(tgi) => {
                    removed.insert(*tgi);
                    inserts.retain(|resource| resource.tgi != *tgi);
                }
                Change::Insert(resource) => inserts.push(resource),
            }
        }

        let mut staged = Vec::with_capacity(self.slots.len() + inserts.len());
        for resource in self.resources() {
            if removed.contains(&resource.tgi()) {
                continue;
            }
            staged.push(ResourceData::new(
                resource.tgi(),
                resource.extract()?,
                resource.is_compressed(),
            ));
        }
        staged.extend(inserts.into_iter().cloned());

        Ok(staged)
    }

    /// Saves the package over the path it was opened from.
    pub fn save(&mut self) -> Result<()> {
        self.save_with(None, false)
    }

    /// Saves the package to `path`. The package keeps its origin path.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(Some(path.as_ref()), false)
    }

    /// Saves the package to `path`, or to its origin path when `None`.
    ///
    /// A modified package keeps a backup of the target as `<target>.bak`, the first backup is
    /// never overwritten. With `atomic` set the file is written next to the target and renamed
    /// over it.
    #[instrument(skip(self), err)]
    pub fn save_with(&mut self, path: Option<&Path>, atomic: bool) -> Result<()> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self.path.clone().ok_or(Error::NoTargetPath)?,
        };

        let resources = self.staged_resources()?;
        let options = WriteOptions::builder()
            .create_backup(self.modified)
            .atomic(atomic)
            .build();
        let image = write_package_image(&target, &resources, options)?;

        let written = Self::load(ByteSource::Memory(Cursor::new(image)))?;
        self.header = written.header;
        self.source = written.source;
        self.slots = written.slots;
        self.changes.clear();
        self.modified = false;

        info!(resources = self.slots.len(), "saved {}", target.display());
        Ok(())
    }

    /// Closes the package, releasing its file
    pub fn close(self) {
        debug!(path = ?self.path, "closed package");
    }
}

impl fmt::Display for DbpfPackage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (major, minor) = self.version();
        match &self.path {
            Some(path) => write!(
                f,
                "<Package {} v{major}.{minor} {} resources>",
                path.display(),
                self.len()
            ),
            None => write!(f, "<Package v{major}.{minor} {} resources>", self.len()),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::compression::CompressionMethod;
    use crate::error::{Error, ResourceNotFoundError, Result};
    use crate::index::{build_index, IndexEntry};
    use crate::package::{Change, DbpfPackage};
    use crate::types::{DbpfHeader, Tgi, HEADER_SIZE};
    use crate::write::{DbpfWriter, ResourceData};

    const A: Tgi = Tgi {
        type_id: 0x220557DA,
        group_id: 0,
        instance_id: 1,
    };
    const B: Tgi = Tgi {
        type_id: 0x220557DA,
        group_id: 0,
        instance_id: 2,
    };
    const C: Tgi = Tgi {
        type_id: 0x0333406C,
        group_id: 0x80000000,
        instance_id: 0xDEADBEEF00000003,
    };

    fn package(resources: &[ResourceData]) -> Result<DbpfPackage> {
        let mut writer = DbpfWriter::new(Vec::new());
        for resource in resources {
            writer.add_resource(resource)?;
        }
        DbpfPackage::from_bytes(writer.finish()?)
    }

    fn abc() -> Result<DbpfPackage> {
        package(&[
            ResourceData::new(A, b"alpha".as_slice(), false),
            ResourceData::new(B, b"bravo".repeat(20), true),
            ResourceData::new(C, b"<tuning/>".as_slice(), false),
        ])
    }

    fn staged_tgis(package: &DbpfPackage) -> Result<Vec<Tgi>> {
        Ok(package
            .staged_resources()?
            .into_iter()
            .map(|resource| resource.tgi)
            .collect())
    }

    #[traced_test]
    #[test]
    fn lookups() -> Result<()> {
        let package = abc()?;

        assert_eq!(package.len(), 3);
        assert_eq!(package.version(), (2, 1));
        assert_eq!(package.path(), None);

        let strings = package.find_by_type(0x220557DA);
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].tgi(), A);
        assert_eq!(strings[1].tgi(), B);

        let by_instance = package.find_by_instance(0xDEADBEEF00000003);
        assert_eq!(by_instance.map(|r| r.tgi()), Some(C));
        assert!(package.find_by_instance(42).is_none());
        assert_eq!(package.get_by_instance(2)?.tgi(), B);
        assert!(matches!(
            package.get_by_instance(42),
            Err(Error::ResourceNotFound(ResourceNotFoundError::Instance(42)))
        ));

        assert_eq!(package.get(B)?.extract()?, b"bravo".repeat(20));
        assert!(package.get(B)?.is_compressed());
        assert!(matches!(
            package.get(Tgi::new(1, 2, 3)),
            Err(Error::ResourceNotFound(ResourceNotFoundError::Tgi(_)))
        ));
        assert!(matches!(
            package.by_index(3),
            Err(Error::ResourceNotFound(ResourceNotFoundError::Index(3)))
        ));

        Ok(())
    }

    #[test]
    fn extraction_is_cached() -> Result<()> {
        let package = abc()?;
        let resource = package.by_index(0)?;

        assert!(!resource.is_cached());
        let first = resource.extract()?;
        assert!(package.by_index(0)?.is_cached());
        assert_eq!(first.as_ptr(), package.by_index(0)?.extract()?.as_ptr());

        Ok(())
    }

    #[test]
    fn display() -> Result<()> {
        let package = abc()?;

        assert_eq!(
            package.by_index(1)?.to_string(),
            "<Resource StringTable G:00000000 I:0000000000000002 100 bytes (compressed)>"
        );
        assert_eq!(package.to_string(), "<Package v2.1 3 resources>");

        Ok(())
    }

    #[test]
    fn corrupt_resource_does_not_block_listing() -> Result<()> {
        let good = b"fine";
        let bad = [0x78, 0x9C, 0xFF, 0xFF, 0xFF];
        let entries = [
            IndexEntry {
                type_id: 1,
                instance_id: 1,
                offset: HEADER_SIZE as u32,
                compressed_size: bad.len() as u32,
                uncompressed_size: 64,
                compression_type: CompressionMethod::DEFLATE,
                ..Default::default()
            },
            IndexEntry {
                type_id: 1,
                instance_id: 2,
                offset: (HEADER_SIZE + bad.len()) as u32,
                compressed_size: good.len() as u32,
                uncompressed_size: good.len() as u32,
                ..Default::default()
            },
        ];

        let index = build_index(&entries)?;
        let index_position = (HEADER_SIZE + bad.len() + good.len()) as u32;
        let mut bytes = DbpfHeader::build(2, index_position, index.len() as u32)?;
        bytes.extend_from_slice(&bad);
        bytes.extend_from_slice(good);
        bytes.extend_from_slice(&index);

        let package = DbpfPackage::from_bytes(bytes)?;
        assert_eq!(package.resources().count(), 2);

        assert!(matches!(
            package.by_index(0)?.extract(),
            Err(Error::Compression(_))
        ));
        assert!(!package.by_index(0)?.is_cached());
        assert_eq!(package.by_index(1)?.extract()?, good);

        Ok(())
    }

    #[test]
    fn pending_adds_are_not_listed() -> Result<()> {
        let mut package = abc()?;
        package.add_resource(Tgi::new(9, 9, 9), b"new".as_slice(), true);

        assert_eq!(package.len(), 3);
        assert!(package.find_by_tgi(Tgi::new(9, 9, 9)).is_none());
        assert!(package.has_pending_changes());
        assert!(package.is_modified());
        assert_eq!(
            staged_tgis(&package)?,
            vec![A, B, C, Tgi::new(9, 9, 9)]
        );

        Ok(())
    }

    #[test]
    fn update_twice_keeps_latest() -> Result<()> {
        let mut package = abc()?;
        package.update_resource(A, b"first".as_slice(), false);
        package.update_resource(A, b"second".as_slice(), false);

        let staged = package.staged_resources()?;
        let updated: Vec<_> = staged.iter().filter(|r| r.tgi == A).collect();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].data, b"second");
        assert_eq!(staged_tgis(&package)?, vec![B, C, A]);

        Ok(())
    }

    #[test]
    fn remove_then_add_keeps_addition() -> Result<()> {
        let mut package = abc()?;
        package.remove_resource(B);
        package.add_resource(B, b"replacement".as_slice(), false);

        let staged = package.staged_resources()?;
        assert_eq!(staged_tgis(&package)?, vec![A, C, B]);
        assert_eq!(staged[2].data, b"replacement");

        Ok(())
    }

    #[test]
    fn remove_drops_pending_add() -> Result<()> {
        let mut package = abc()?;
        let extra = Tgi::new(7, 7, 7);
        package.add_resource(extra, b"temp".as_slice(), false);
        package.remove_resource(extra);

        assert_eq!(staged_tgis(&package)?, vec![A, B, C]);
        assert_eq!(
            package.pending_changes(),
            &[
                Change::Insert(ResourceData::new(extra, b"temp".as_slice(), false)),
                Change::Delete(extra)
            ]
        );

        Ok(())
    }

    #[test]
    fn duplicate_adds_both_survive() -> Result<()> {
        let mut package = abc()?;
        package.add_resource(A, b"one".as_slice(), false);
        package.add_resource(A, b"two".as_slice(), false);

        assert_eq!(staged_tgis(&package)?, vec![A, B, C, A, A]);

        Ok(())
    }

    #[test]
    fn staged_keeps_compression_flag() -> Result<()> {
        let package = abc()?;
        let flags: Vec<_> = package
            .staged_resources()?
            .iter()
            .map(|r| r.compress)
            .collect();

        assert_eq!(flags, vec![false, true, false]);

        Ok(())
    }

    #[test]
    fn save_without_origin() -> Result<()> {
        let mut package = abc()?;
        package.add_resource(Tgi::new(1, 1, 1), b"x".as_slice(), false);

        assert!(matches!(package.save(), Err(Error::NoTargetPath)));
        assert!(package.has_pending_changes());

        Ok(())
    }

    #[test]
    fn invalid_input() {
        assert!(matches!(
            DbpfPackage::from_bytes(b"NOPE".repeat(24)),
            Err(Error::InvalidMagic(_))
        ));
        assert!(matches!(
            DbpfPackage::from_bytes(Vec::new()),
            Err(Error::InvalidMagic(_))
        ));
    }
}
