//! msgc command-line driver.

use anyhow::{bail, Context, Result};
use clap::Parser;
use msgc::compile::{write_artifacts, Compiler};
use msgc::policy::Policy;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "msgc",
    version,
    about = "Compile .messages.in contracts into dispatch and registry sources"
)]
struct Cli {
    /// Directory searched for `{receiver}.messages.in` files after the
    /// current directory
    base_dir: PathBuf,

    /// Receivers to compile together as one message space
    #[arg(required = true)]
    receivers: Vec<String>,

    /// Directory the artifacts are written into (created if absent)
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Policy file overriding the builtin opaque-type list
    #[arg(long)]
    policy: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let policy = match &cli.policy {
        Some(path) => Policy::load(path)
            .with_context(|| format!("failed to load policy from {}", path.display()))?,
        None => Policy::builtin().clone(),
    };

    let compiler = Compiler::new(policy);
    let artifacts = match compiler.compile_files(&cli.base_dir, &cli.receivers) {
        Ok(artifacts) => artifacts,
        Err(errors) => {
            for error in &errors {
                eprintln!("error: {error}");
            }
            bail!("compilation failed with {} error(s)", errors.len());
        }
    };

    write_artifacts(&artifacts, &cli.output_dir)
        .with_context(|| format!("failed to write artifacts to {}", cli.output_dir.display()))?;
    Ok(())
}
