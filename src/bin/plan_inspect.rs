//! Binary entry point for inspecting serialized query plans.
#![forbid(unsafe_code)]

use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use nu_ansi_term::Color;
use plan_wire::{
    decode_plan, plan_hash, to_json_string, CodecOptions, ConfigError, Database,
    DatabaseEstimates, PlanError, PlanErrorWithCode, PlanNode,
};
use serde_json::{json, Value as Json};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "plan-inspect",
    version,
    about = "Decode, validate, and estimate serialized query plans",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PLAN_WIRE_CATALOG",
        help = "TOML catalog describing tables, columns, and indexes"
    )]
    catalog: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Codec options file (defaults to the user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v debug, -vv trace)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print the plan's explain output")]
    Explain {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
        #[arg(long, help = "Mask literal values in the explain tree (requires --format json)")]
        redact: bool,
    },
    #[command(about = "Check plan structure and print its node count and hash")]
    Validate {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
    },
    #[command(about = "Attach cost estimates and print the resulting document")]
    Estimate {
        #[arg(value_name = "PLAN")]
        plan: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{}", PlanErrorWithCode(.0))]
    Plan(#[from] PlanError),
    #[error("[Config] {0}")]
    Config(#[from] ConfigError),
    #[error("[Io] failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("[Json] failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    #[error("[Usage] {0}")]
    Usage(&'static str),
}

fn main() {
    let cli = Cli::parse();
    install_tracing_subscriber(cli.verbose);
    if let Err(err) = run(cli) {
        let label = if io::stderr().is_terminal() {
            Color::Red.bold().paint("error").to_string()
        } else {
            "error".to_string()
        };
        eprintln!("{label}: {err}");
        std::process::exit(1);
    }
}

fn install_tracing_subscriber(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .try_init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let options = CodecOptions::load(cli.config.as_deref())?;
    let db = match cli.catalog.as_deref() {
        Some(path) => Database::load(path)?,
        None => Database::new(),
    };
    debug!(?options, tables = db.tables().count(), "loaded inspection context");

    match cli.command {
        Command::Explain { plan, redact } => {
            if redact && cli.format == OutputFormat::Text {
                return Err(CliError::Usage("--redact requires --format json"));
            }
            let root = read_plan(&plan, &db, &options)?;
            match cli.format {
                OutputFormat::Text => print!("{}", root.explain_plan()),
                OutputFormat::Json => {
                    let tree = root.explain_tree();
                    let tree = if redact { tree.redacted() } else { tree };
                    println!("{}", serde_json::to_string_pretty(&tree)?);
                }
            }
        }
        Command::Validate { plan } => {
            let root = read_plan(&plan, &db, &options)?;
            root.resolve_column_references()?;
            let nodes = root.node_count();
            let hash = plan_hash(&root)?;
            match cli.format {
                OutputFormat::Text => {
                    println!("valid plan: {nodes} nodes, hash {hash:016x}");
                }
                OutputFormat::Json => {
                    let report = json!({ "nodes": nodes, "hash": format!("{hash:016x}") });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
        }
        Command::Estimate { plan } => {
            let mut root = read_plan(&plan, &db, &options)?;
            let estimates = DatabaseEstimates::from_database(&db);
            let est = root.compute_cost_estimates(&estimates, &db)?;
            debug!(processed = est.processed, output = est.output, "estimated plan root");
            println!("{}", to_json_string(&root, &options)?);
        }
    }

    Ok(())
}

fn read_plan(path: &Path, db: &Database, options: &CodecOptions) -> Result<PlanNode, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Json = serde_json::from_str(&text).map_err(PlanError::from)?;
    Ok(decode_plan(&doc, db, options)?)
}
