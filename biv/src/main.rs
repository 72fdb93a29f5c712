//! `biv`: build the idealized BiV mesh, fibers and Purkinje trees.
//!
//! With no arguments the whole pipeline runs using `./biv.toml` when present
//! and built-in defaults otherwise.

use std::path::{Path, PathBuf};

use anyhow::Result;
use biv::error::PipelineError;
use biv::exit_codes;
use biv::io::config::{DEFAULT_CONFIG_FILE, OutputMode, PipelineConfig, file_sha256, load_config};
use biv::io::fibers::CommandFiberGenerator;
use biv::io::mesh_builder::CardiacGeometriesBuilder;
use biv::io::trees::FractalTreeGenerator;
use biv::pipeline::{Stages, run_pipeline};
use biv::validate::validate_output;
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "biv",
    version,
    about = "Idealized bi-ventricular mesh, fiber and Purkinje network generator"
)]
struct Cli {
    /// Config file (default: ./biv.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Output root; artifacts go to `<root>/data`.
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    /// Overwrite existing artifacts.
    #[arg(long, global = true, conflicts_with = "resume")]
    force: bool,
    /// Skip stages whose artifacts already exist.
    #[arg(long, global = true)]
    resume: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Check an existing output directory without running anything.
    Validate,
}

fn main() {
    biv::logging::init();
    let cli = Cli::parse();
    let code = match cli.command {
        Some(Command::Validate) => cmd_validate(&cli),
        None => cmd_run(&cli),
    };
    std::process::exit(code);
}

fn cmd_run(cli: &Cli) -> i32 {
    let (cfg, sha) = match load_run_config(cli) {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("error: {}", PipelineError::invalid(err).report());
            return exit_codes::INVALID;
        }
    };
    let stages = Stages {
        mesh: CardiacGeometriesBuilder::from_config(&cfg.tools),
        fibers: CommandFiberGenerator::from_config(&cfg.tools),
        purkinje: FractalTreeGenerator,
    };
    match run_pipeline(&cfg, sha, &stages) {
        Ok(outcome) => {
            info!(data = %outcome.layout.data_dir.display(), "done");
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("error: {}", err.report());
            err.exit_code()
        }
    }
}

fn cmd_validate(cli: &Cli) -> i32 {
    let root = match &cli.output {
        Some(root) => root.clone(),
        None => match load_run_config(cli) {
            Ok((cfg, _)) => cfg.output.root,
            Err(err) => {
                eprintln!("error: config: {err:#}");
                return exit_codes::INVALID;
            }
        },
    };
    match validate_output(&root) {
        Ok(outcome) => {
            println!(
                "ok: {} files, {} markers, lv tree {} nodes, rv tree {} nodes",
                outcome.files, outcome.markers, outcome.tree_nodes[0], outcome.tree_nodes[1]
            );
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("error: validate: {err:#}");
            exit_codes::INVALID
        }
    }
}

/// Load the config and apply command-line overrides.
fn load_run_config(cli: &Cli) -> Result<(PipelineConfig, Option<String>)> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE).to_path_buf());
    if cli.config.is_some() && !path.is_file() {
        anyhow::bail!("config file {} not found", path.display());
    }
    let mut cfg = load_config(&path)?;
    let sha = file_sha256(&path)?;
    if let Some(root) = &cli.output {
        cfg.output.root = root.clone();
    }
    if cli.force {
        cfg.output.mode = OutputMode::Overwrite;
    } else if cli.resume {
        cfg.output.mode = OutputMode::Resume;
    }
    Ok((cfg, sha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_arguments_runs_the_pipeline() {
        let cli = Cli::parse_from(["biv"]);
        assert!(cli.command.is_none());
        assert!(!cli.force && !cli.resume);
    }

    #[test]
    fn parse_resume_with_output() {
        let cli = Cli::parse_from(["biv", "--resume", "--output", "out"]);
        assert!(cli.resume);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn force_and_resume_conflict() {
        assert!(Cli::try_parse_from(["biv", "--force", "--resume"]).is_err());
    }

    #[test]
    fn parse_validate_with_output() {
        let cli = Cli::parse_from(["biv", "validate", "--output", "out"]);
        assert!(matches!(cli.command, Some(Command::Validate)));
        assert_eq!(cli.output, Some(PathBuf::from("out")));
    }
}
