use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use semver_store::domain::{Bump, SemanticVersion};
use semver_store::{config, driver, logging, ui};

#[derive(Parser)]
#[command(
    name = "semver-store",
    version,
    about = "Keep a semantic version in S3, GCS or git and bump it atomically"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<String>,

    #[arg(short, long, global = true, help = "Enable debug logging on stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the stored version if it is at or above --from
    Check {
        #[arg(long, value_name = "VERSION", help = "Version already seen")]
        from: Option<String>,
    },

    /// Advance the stored version and print the result
    Bump {
        #[arg(value_name = "RULE", help = "major, minor, patch, final or pre")]
        rule: Option<String>,

        #[arg(long, value_name = "LABEL", help = "Pre-release label (default: rc); with major, minor or patch it starts a pre-release line")]
        pre: Option<String>,
    },

    /// Overwrite the stored version
    Set {
        #[arg(
            value_name = "VERSION",
            conflicts_with = "file",
            required_unless_present = "file"
        )]
        version: Option<String>,

        #[arg(long, value_name = "PATH", help = "Read the version from a file")]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    if let Err(e) = run(args) {
        ui::display_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

fn run(args: Args) -> Result<()> {
    let source = config::load_source(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Command::Check { from } => {
            let cursor = from.as_deref().map(SemanticVersion::parse).transpose()?;
            let driver = driver::from_source(&source)?;
            let versions = driver.check(cursor.as_ref())?;
            ui::display_versions(&versions)?;
        }
        Command::Bump { rule, pre } => {
            let rule = Bump::from_params(rule.as_deref(), pre.as_deref())?;
            let driver = driver::from_source(&source)?;
            let version = driver.bump(&rule)?;
            ui::display_version(&version)?;
        }
        Command::Set { version, file } => {
            let text = match (version, file) {
                (Some(text), _) => text,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("a version or --file is required"),
            };
            let version = SemanticVersion::parse(&text)?;
            let driver = driver::from_source(&source)?;
            driver.set(&version)?;
            ui::display_version(&version)?;
        }
    }

    Ok(())
}
