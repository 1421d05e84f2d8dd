#![forbid(unsafe_code)]

mod cmd;
mod output;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use cmd::inputs::RunContext;
use epicload_core::config::resolve_config;
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "epicload: team workload by epic, week by week",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (pretty, text, json). Defaults to pretty on a TTY.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Evaluate as if today were DATE (YYYY-MM-DD).
    #[arg(long, global = true, value_name = "DATE")]
    as_of: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Reports",
        about = "Weekly Busy/Free strip per assignee",
        long_about = "Build the UserLoad table: one row per assignee with the number of epics held and a Busy/Free status for every week from the current week through year end.",
        after_help = "EXAMPLES:\n    # Load for the current week onward\n    epicload load --items items.json --team team.json\n\n    # Pin the evaluation date\n    epicload load --items items.json --team team.json --as-of 2025-01-08\n\n    # Epics held per assignee\n    epicload load --items items.json --team team.json --projects\n\n    # Emit machine-readable output\n    epicload load --items items.json --team team.json --format json"
    )]
    Load(cmd::load::LoadArgs),

    #[command(
        next_help_heading = "Reports",
        about = "Team members with nothing assigned",
        long_about = "List roster members who hold no epic, after applying keep/remove/remap directives.",
        after_help = "EXAMPLES:\n    # Everyone on the roster without an epic\n    epicload unassigned --items items.json --team team.json\n\n    # Fold Bob's load into Alice and drop Carol\n    epicload unassigned --items items.json --team team.json --remap Bob=Alice --remove Carol\n\n    # Read directives from a file\n    epicload unassigned --items items.json --team team.json --map directives.toml"
    )]
    Unassigned(cmd::unassigned::UnassignedArgs),

    #[command(
        next_help_heading = "Reports",
        about = "One user's assignments and free date",
        long_about = "Show the work items assigned to one user, the epic each belongs to, and the date the user becomes free.",
        after_help = "EXAMPLES:\n    # Details for Alice\n    epicload show Alice --items items.json --team team.json\n\n    # Emit machine-readable output\n    epicload show Alice --items items.json --team team.json --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Reports",
        about = "Write output tables to files",
        long_about = "Write the UserLoad and UnassignedUsers tables as split-form JSON tagged with the snapshot digest.",
        after_help = "EXAMPLES:\n    # Write both tables\n    epicload export --items items.json --team team.json --user-load load.json --unassigned free.json\n\n    # Apply directives to the unassigned table\n    epicload export --items items.json --team team.json --unassigned free.json --remap Bob=Alice"
    )]
    Export(cmd::export::ExportArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Report hierarchy anomalies",
        long_about = "Report parent cycles, dangling parents, titles with no epic, duplicate titles, and epics without a due date.",
        after_help = "EXAMPLES:\n    # Check the WorkItems table\n    epicload diagnose --items items.json --team team.json\n\n    # Emit machine-readable output\n    epicload diagnose --items items.json --team team.json --json"
    )]
    Diagnose(cmd::diagnose::DiagnoseArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completions",
        long_about = "Generate shell completion scripts for bash, zsh, or fish.",
        after_help = "EXAMPLES:\n    # Generate zsh completions\n    epicload completions zsh > ~/.zsh/completions/_epicload"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("EPICLOAD_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "epicload=debug,info"
        } else {
            "epicload=info,warn"
        })
    });

    let format = env::var("EPICLOAD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn dispatch(command: &Commands, ctx: &RunContext, output: OutputMode) -> anyhow::Result<()> {
    match command {
        Commands::Load(args) => cmd::load::run_load(args, ctx, output),
        Commands::Unassigned(args) => cmd::unassigned::run_unassigned(args, ctx, output),
        Commands::Show(args) => cmd::show::run_show(args, ctx, output),
        Commands::Export(args) => cmd::export::run_export(args, ctx, output),
        Commands::Diagnose(args) => cmd::diagnose::run_diagnose(args, ctx, output),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}

fn run(cli: &Cli) -> Result<(), (OutputMode, anyhow::Error)> {
    let fallback = cli.format.unwrap_or(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    });

    let project_root = env::current_dir().map_err(|e| (fallback, e.into()))?;
    let effective = resolve_config(&project_root, cli.json).map_err(|e| (fallback, e))?;
    let output = resolve_output_mode(cli.format, cli.json, Some(&effective.resolved_output));

    let today = cli
        .as_of
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    debug!(%today, ?output, "resolved run context");

    let ctx = RunContext {
        config: effective.project,
        today,
    };
    dispatch(&cli.command, &ctx, output).map_err(|e| (output, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err((mode, err)) => {
            if render_error(mode, &CliError::from(&err)).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
