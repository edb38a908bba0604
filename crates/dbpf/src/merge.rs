//! Combining several packages into one.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::package::DbpfPackage;
use crate::types::Tgi;
use crate::write::{write_package, ResourceData, WriteOptions};

/// A TGI found in more than one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// The contested resource
    pub tgi: Tgi,

    /// Every package holding the resource, with its uncompressed size there
    pub sources: Vec<(PathBuf, u32)>,
}

/// Lists every TGI stored more than once across `paths`, in the order they are first seen. A TGI
/// repeated inside a single package counts as well.
#[instrument(skip_all, fields(packages = paths.len()), err)]
pub fn find_conflicts<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<MergeConflict>> {
    let mut seen: IndexMap<Tgi, Vec<(PathBuf, u32)>> = IndexMap::new();

    for path in paths {
        let path = path.as_ref();
        let package = DbpfPackage::open(path)?;
        for resource in package.resources() {
            seen.entry(resource.tgi())
                .or_default()
                .push((path.to_path_buf(), resource.uncompressed_size()));
        }
    }

    let conflicts: Vec<_> = seen
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(tgi, sources)| MergeConflict { tgi, sources })
        .collect();

    debug!(conflicts = conflicts.len(), "conflict scan finished");
    Ok(conflicts)
}

/// Merges `paths` into a new package at `output` and returns the number of resources written.
///
/// When a TGI appears more than once the last package wins, unless `resolutions` names the package
/// to take it from. A resolved TGI keeps the position where it was first seen.
#[instrument(skip_all, fields(packages = paths.len(), output = %output.display()), err)]
pub fn merge_packages<P: AsRef<Path>>(
    paths: &[P],
    output: &Path,
    resolutions: &IndexMap<Tgi, PathBuf>,
) -> Result<usize> {
    let mut merged: IndexMap<Tgi, ResourceData> = IndexMap::new();

    for path in paths {
        let path = path.as_ref();
        let package = DbpfPackage::open(path)?;
        for resource in package.resources() {
            let tgi = resource.tgi();
            if resolutions.get(&tgi).is_some_and(|chosen| chosen != path) {
                continue;
            }

            merged.insert(
                tgi,
                ResourceData::new(tgi, resource.extract()?, resource.is_compressed()),
            );
        }
    }

    let resources: Vec<ResourceData> = merged.into_values().collect();
    write_package(output, &resources, WriteOptions::default())?;

    info!(resources = resources.len(), "merged packages");
    Ok(resources.len())
}
