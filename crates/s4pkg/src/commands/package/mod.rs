pub mod conflicts;
pub mod extract;
pub mod info;
pub mod merge;
pub mod split;

use dbpf::{resource_type, DbpfPackage, DbpfResource, Tgi};
use miette::{miette, Result};

#[derive(clap::Subcommand)]
pub enum PackageCommands {
    /// List the resources of a package
    Info(info::InfoArgs),
    /// Extract resources of a package into a directory
    Extract(extract::ExtractArgs),
    /// Merge several packages into one
    Merge(merge::MergeArgs),
    /// Split a package by resource type or group
    Split(split::SplitArgs),
    /// Find resources shared by packages in a directory
    Conflicts(conflicts::ConflictsArgs),
}

impl PackageCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            PackageCommands::Info(info) => info.handle(),
            PackageCommands::Extract(extract) => extract.handle(),
            PackageCommands::Merge(merge) => merge.handle(),
            PackageCommands::Split(split) => split.handle(),
            PackageCommands::Conflicts(conflicts) => conflicts.handle(),
        }
    }
}

pub(crate) fn parse_tgi(value: &str) -> std::result::Result<Tgi, String> {
    value.parse::<Tgi>().map_err(|e| e.to_string())
}

/// Resources of `package` matching an optional TGI and an optional type name, in index order
pub(crate) fn select_resources<'a>(
    package: &'a DbpfPackage,
    tgi: Option<Tgi>,
    type_name: Option<&str>,
) -> Result<Vec<DbpfResource<'a>>> {
    let type_id = match type_name {
        Some(name) => Some(
            resource_type::type_id(name).ok_or_else(|| miette!("unknown resource type {name}"))?,
        ),
        None => None,
    };

    let selected = match tgi {
        Some(tgi) => vec![package.get(tgi)?],
        None => package.resources().collect(),
    };

    Ok(selected
        .into_iter()
        .filter(|resource| type_id.map_or(true, |id| resource.type_id() == id))
        .collect())
}
