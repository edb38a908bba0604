use clap::Args;
use dbpf::{split::extracted_file_name, DbpfPackage, Tgi};
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::Write, path::PathBuf};
use tracing::info;

use super::{parse_tgi, select_resources};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input package
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract the resource with this TGI
    #[arg(long, value_name = "T:G:I", value_parser = parse_tgi)]
    tgi: Option<Tgi>,

    /// Only extract resources of this type, by name
    #[arg(long = "type", value_name = "NAME")]
    type_name: Option<String>,

    /// Allow overwriting existing files
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let package = DbpfPackage::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", &self.directory.display()))?;

        let selected = select_resources(&package, self.tgi, self.type_name.as_deref())?;
        info!("extracting {} of {} resources", selected.len(), package.len());

        for resource in selected {
            let p = self.directory.join(extracted_file_name(&resource));
            info!("writing {}", p.display());

            let data = resource
                .extract()
                .context(format!("extracting {}", resource.tgi()))?;

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            out.write_all(data).into_diagnostic()?;
        }
        Ok(())
    }
}
