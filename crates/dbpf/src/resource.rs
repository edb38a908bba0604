//! Lazily extracted views over the resources of a package.

use std::borrow::Cow;
use std::cell::{OnceCell, RefCell};
use std::fmt;

use tracing::{instrument, trace};

use crate::compression;
use crate::error::Result;
use crate::index::IndexEntry;
use crate::resource_type;
use crate::source::ByteSource;
use crate::types::Tgi;

/// Storage for one index entry and its decompressed bytes, owned by the package
#[derive(Debug)]
pub(crate) struct ResourceSlot {
    pub entry: IndexEntry,
    cache: OnceCell<Vec<u8>>,
}

impl ResourceSlot {
    pub fn new(entry: IndexEntry) -> Self {
        Self {
            entry,
            cache: OnceCell::new(),
        }
    }
}

/// A single resource of an open [`crate::package::DbpfPackage`]
///
/// Data is only read and decompressed when [`DbpfResource::extract`] is first called. The result is
/// kept by the package, so later calls are free and every handle to the same resource shares it.
#[derive(Clone, Copy)]
pub struct DbpfResource<'a> {
    slot: &'a ResourceSlot,
    source: &'a RefCell<ByteSource>,
}

impl<'a> DbpfResource<'a> {
    pub(crate) fn new(slot: &'a ResourceSlot, source: &'a RefCell<ByteSource>) -> Self {
        Self { slot, source }
    }

    /// The index entry describing this resource
    pub fn entry(&self) -> &'a IndexEntry {
        &self.slot.entry
    }

    /// The type, group and instance of this resource
    pub fn tgi(&self) -> Tgi {
        self.slot.entry.tgi()
    }

    /// Resource type ID
    pub fn type_id(&self) -> u32 {
        self.slot.entry.type_id
    }

    /// Human readable type name
    pub fn type_name(&self) -> Cow<'static, str> {
        resource_type::type_name(self.type_id())
    }

    /// Resource group ID
    pub fn group_id(&self) -> u32 {
        self.slot.entry.group_id
    }

    /// Resource instance ID (64-bit)
    pub fn instance_id(&self) -> u64 {
        self.slot.entry.instance_id
    }

    /// Offset of the resource data from the start of the file
    pub fn offset(&self) -> u32 {
        self.slot.entry.offset
    }

    /// Size of the data as stored
    pub fn compressed_size(&self) -> u32 {
        self.slot.entry.compressed_size
    }

    /// Size of the data once decompressed
    pub fn uncompressed_size(&self) -> u32 {
        self.slot.entry.uncompressed_size
    }

    /// Compression type code
    pub fn compression_type(&self) -> u16 {
        self.slot.entry.compression_type
    }

    /// True if the resource data is stored compressed
    pub fn is_compressed(&self) -> bool {
        self.slot.entry.is_compressed()
    }

    /// True once the data has been extracted
    pub fn is_cached(&self) -> bool {
        self.slot.cache.get().is_some()
    }

    /// Extracts and decompresses the resource data.
    ///
    /// A failed extraction leaves nothing cached, the next call tries again.
    #[instrument(skip(self), fields(tgi = %self.tgi()), err)]
    pub fn extract(&self) -> Result<&'a [u8]> {
        let slot: &'a ResourceSlot = self.slot;
        if let Some(data) = slot.cache.get() {
            return Ok(data.as_slice());
        }

        let entry = &slot.entry;
        let stored = self
            .source
            .borrow_mut()
            .read_at(u64::from(entry.offset), entry.compressed_size as usize)?;

        let expected = (entry.uncompressed_size != 0).then_some(entry.uncompressed_size as usize);
        let data = compression::decompress(&stored, entry.compression_type, expected)?;
        trace!(stored = stored.len(), extracted = data.len(), "extracted");

        Ok(slot.cache.get_or_init(|| data).as_slice())
    }
}

impl fmt::Debug for DbpfResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DbpfResource({:#?})", self.entry())
    }
}

impl fmt::Display for DbpfResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<Resource {} G:{:08X} I:{:016X} {} bytes{}>",
            self.type_name(),
            self.group_id(),
            self.instance_id(),
            self.uncompressed_size(),
            if self.is_compressed() {
                " (compressed)"
            } else {
                ""
            }
        )
    }
}
