use clap::{Args, ValueEnum};
use dbpf::split::{split_by_group, split_by_type};
use miette::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum SplitBy {
    #[default]
    Type,
    Group,
}

#[derive(Args)]
pub struct SplitArgs {
    /// An input package
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// How resources are grouped into packages
    #[arg(long, value_enum, default_value_t = SplitBy::Type)]
    by: SplitBy,

    /// Prefix of the created packages, defaults to the input file name
    #[arg(long)]
    prefix: Option<String>,
}

impl SplitArgs {
    pub fn handle(&self) -> Result<()> {
        let split = match self.by {
            SplitBy::Type => split_by_type,
            SplitBy::Group => split_by_group,
        };

        let created = split(&self.file, &self.directory, self.prefix.as_deref())
            .context(format!("splitting {}", &self.file.display()))?;

        for path in created {
            println!("{}", path.display());
        }
        Ok(())
    }
}
