use clap::Args;
use dbpf::DbpfPackage;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use super::select_resources;

#[derive(Args)]
pub struct InfoArgs {
    /// An input package
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only list resources of this type, by name
    #[arg(long = "type", value_name = "NAME")]
    type_name: Option<String>,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let package = DbpfPackage::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;

        let (major, minor) = package.version();
        println!(
            "{} v{major}.{minor}, {} resources",
            self.file.display().bold(),
            package.len()
        );

        for resource in select_resources(&package, None, self.type_name.as_deref())? {
            let compression = if resource.is_compressed() {
                format!("0x{:04X}", resource.compression_type())
            } else {
                "raw".to_string()
            };

            println!(
                "{}  {:<16} {:>10} {:>10}  {}",
                resource.tgi(),
                resource.type_name().cyan(),
                resource.compressed_size(),
                resource.uncompressed_size(),
                compression.dimmed()
            );
        }

        Ok(())
    }
}
