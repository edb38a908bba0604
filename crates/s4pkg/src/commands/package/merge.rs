use clap::Args;
use dbpf::{merge::merge_packages, Tgi};
use indexmap::IndexMap;
use miette::{miette, Context, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct MergeArgs {
    /// A target package
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Take a conflicting resource from the given input instead of the last one
    #[arg(long, value_name = "TGI=FILE", value_parser = parse_resolution)]
    resolve: Vec<(Tgi, PathBuf)>,

    /// Input packages, later ones win conflicts
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,
}

fn parse_resolution(value: &str) -> std::result::Result<(Tgi, PathBuf), String> {
    let (tgi, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TGI=FILE, got {value:?}"))?;
    let tgi = tgi.parse::<Tgi>().map_err(|e| e.to_string())?;
    Ok((tgi, PathBuf::from(path)))
}

impl MergeArgs {
    pub fn handle(&self) -> Result<()> {
        if !self.overwrite && self.output.exists() {
            return Err(miette!(
                "{} already exists, pass --overwrite to replace it",
                self.output.display()
            ));
        }

        let resolutions: IndexMap<Tgi, PathBuf> = self.resolve.iter().cloned().collect();
        for (tgi, path) in &resolutions {
            if !self.inputs.contains(path) {
                return Err(miette!(
                    "{} is resolved to {}, which is not an input",
                    tgi,
                    path.display()
                ));
            }
        }

        info!("creating {}", &self.output.display());
        let count = merge_packages(&self.inputs, &self.output, &resolutions)
            .context(format!("merging into {}", &self.output.display()))?;

        println!(
            "merged {} packages into {} ({count} resources)",
            self.inputs.len(),
            self.output.display()
        );
        Ok(())
    }
}
