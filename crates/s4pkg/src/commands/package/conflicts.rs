use clap::Args;
use dbpf::{merge::find_conflicts, resource_type::type_name};
use itertools::Itertools;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;
use walkdir::WalkDir;

#[derive(Args)]
pub struct ConflictsArgs {
    /// A directory to search for packages
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,
}

impl ConflictsArgs {
    pub fn handle(&self) -> Result<()> {
        let packages = WalkDir::new(&self.directory)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("package")))
            .sorted()
            .collect::<Vec<_>>();

        info!("checking {} packages", packages.len());
        let conflicts = find_conflicts(&packages)
            .context(format!("scanning {}", &self.directory.display()))?;

        if conflicts.is_empty() {
            println!("{}", "no conflicts found".green());
            return Ok(());
        }

        for conflict in &conflicts {
            println!(
                "{} {}",
                conflict.tgi.red(),
                type_name(conflict.tgi.type_id).dimmed()
            );
            println!(
                "{}",
                conflict
                    .sources
                    .iter()
                    .map(|(path, size)| {
                        let name = path.strip_prefix(&self.directory).unwrap_or(path);
                        format!("  {} ({size} bytes)", name.display())
                    })
                    .join("\n")
            );
        }
        println!("{} conflicts", conflicts.len());

        Ok(())
    }
}
