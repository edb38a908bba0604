//! Splitting a package apart, by resource type, by group, or into loose files.

use indexmap::IndexMap;
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::Result;
use crate::package::DbpfPackage;
use crate::resource::DbpfResource;
use crate::resource_type::type_name;
use crate::write::{write_package, ResourceData, WriteOptions};

/// Writes one package per resource type, named `<prefix>_<TypeName>.package`.
///
/// `prefix` defaults to the file stem of `package_path`. Returns the created paths.
#[instrument(skip_all, fields(package = %package_path.display()), err)]
pub fn split_by_type(
    package_path: &Path,
    output_dir: &Path,
    prefix: Option<&str>,
) -> Result<Vec<PathBuf>> {
    split_by(
        package_path,
        output_dir,
        prefix,
        |resource| resource.type_id(),
        |type_id| type_name(type_id).into_owned(),
    )
}

/// Writes one package per group, named `<prefix>_G<GGGGGGGG>.package`.
///
/// `prefix` defaults to the file stem of `package_path`. Returns the created paths.
#[instrument(skip_all, fields(package = %package_path.display()), err)]
pub fn split_by_group(
    package_path: &Path,
    output_dir: &Path,
    prefix: Option<&str>,
) -> Result<Vec<PathBuf>> {
    split_by(
        package_path,
        output_dir,
        prefix,
        |resource| resource.group_id(),
        |group_id| format!("G{group_id:08X}"),
    )
}

fn split_by<K, F, N>(
    package_path: &Path,
    output_dir: &Path,
    prefix: Option<&str>,
    key: F,
    name: N,
) -> Result<Vec<PathBuf>>
where
    K: Hash + Eq + Copy,
    F: Fn(&DbpfResource) -> K,
    N: Fn(K) -> String,
{
    fs::create_dir_all(output_dir)?;
    let prefix = match prefix {
        Some(prefix) => prefix.to_owned(),
        None => package_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package".to_owned()),
    };

    let package = DbpfPackage::open(package_path)?;
    let mut buckets: IndexMap<K, Vec<ResourceData>> = IndexMap::new();
    for resource in package.resources() {
        buckets.entry(key(&resource)).or_default().push(ResourceData::new(
            resource.tgi(),
            resource.extract()?,
            resource.is_compressed(),
        ));
    }

    let mut created = Vec::with_capacity(buckets.len());
    for (key, resources) in buckets {
        let path = output_dir.join(format!("{prefix}_{}.package", name(key)));
        write_package(&path, &resources, WriteOptions::default())?;
        created.push(path);
    }

    info!(packages = created.len(), "split package");
    Ok(created)
}

/// File name used for a loose resource: `<TypeName>_<GGGGGGGG>_<IIIIIIIIIIIIIIII>.bin`
pub fn extracted_file_name(resource: &DbpfResource) -> String {
    format!(
        "{}_{:08X}_{:016X}.bin",
        resource.type_name(),
        resource.group_id(),
        resource.instance_id()
    )
}

/// Writes every resource of the package to its own file in `output_dir`. Returns the created paths.
#[instrument(skip_all, fields(package = %package_path.display()), err)]
pub fn extract_all(package_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;

    let package = DbpfPackage::open(package_path)?;
    let mut created = Vec::with_capacity(package.len());
    for resource in package.resources() {
        let path = output_dir.join(extracted_file_name(&resource));
        fs::write(&path, resource.extract()?)?;
        created.push(path);
    }

    info!(files = created.len(), "extracted resources");
    Ok(created)
}
