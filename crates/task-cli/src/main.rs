use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::error::ErrorKind;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use task_cli_core::command::{decode_mark, execute, Command, Report};
use task_cli_core::config::{
    discover_config, resolve_store_path, ConfigError, LoadedConfig, LOG_ENV, STORE_FILE_ENV,
};
use task_cli_core::store::TaskStore;
use task_cli_core::task::{task_to_json, Status};
use task_cli_core::task_ops::TaskError;

const EXIT_INVALID_ARGUMENTS: u8 = 1;
const EXIT_FAILURE: u8 = 4;
const EXIT_CONFIG: u8 = 5;

const MARK_HELP: &str = "\
Status commands:
  mark-to-do <ID>        Mark a task as to-do
  mark-in-progress <ID>  Mark a task as in-progress
  mark-done <ID>         Mark a task as done";

#[derive(Parser)]
#[command(
    name = "task-cli",
    version = task_cli_core::version(),
    about = "Track small tasks in a local JSON file",
    after_help = MARK_HELP
)]
struct Cli {
    /// Task store file (default: tasks.json in the working directory)
    #[arg(long, global = true, value_name = "PATH")]
    file: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Add a new task
    Add { description: String },
    /// Replace the description of a task
    Update { id: u64, description: String },
    /// Delete a task
    Delete { id: u64 },
    /// List tasks, optionally only those with the given status
    List {
        /// to-do, in-progress or done
        status: Option<Status>,
        /// Print tasks as a JSON array
        #[arg(long)]
        json: bool,
    },
    #[command(external_subcommand)]
    Other(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Text,
    Json,
}

fn decode(command: CliCommand) -> Result<(Command, Output), TaskError> {
    let decoded = match command {
        CliCommand::Add { description } => Command::Add { description },
        CliCommand::Update { id, description } => Command::Update { id, description },
        CliCommand::Delete { id } => Command::Delete { id },
        CliCommand::List { status, json } => {
            let output = if json { Output::Json } else { Output::Text };
            return Ok((Command::List { status }, output));
        }
        // Every mark-<status> word lands here.
        CliCommand::Other(words) => {
            let (word, args) = words
                .split_first()
                .ok_or_else(|| TaskError::UnknownCommand(String::new()))?;
            decode_mark(word, args)?
        }
    };
    Ok((decoded, Output::Text))
}

fn init_logging(verbose: u8, config: Option<&LoadedConfig>) -> Result<()> {
    let default = match verbose {
        0 => config
            .and_then(|loaded| loaded.config.log_level.clone())
            .unwrap_or_else(|| "warn".to_string()),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let directive = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to install logger: {err}"))
}

fn print_report(report: &Report, output: Output) -> Result<()> {
    match (report, output) {
        (Report::Listed(tasks), Output::Json) => {
            let values: Vec<_> = tasks.iter().map(task_to_json).collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        _ => println!("{}", report),
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    let config = discover_config(&cwd)?;
    if let Err(err) = init_logging(cli.verbose, config.as_ref()) {
        eprintln!("warning: {err:#}");
    }

    let env_file = std::env::var(STORE_FILE_ENV).ok();
    let store = TaskStore::new(resolve_store_path(
        &cwd,
        cli.file.as_deref(),
        env_file.as_deref(),
        config.as_ref(),
    ));
    debug!(path = %store.path().display(), "using task store");

    let (command, output) = decode(cli.command)?;
    let report = execute(&store, command)?;
    print_report(&report, output)
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<TaskError>() {
        return err.exit_code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return EXIT_CONFIG;
    }
    EXIT_FAILURE
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_INVALID_ARGUMENTS),
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}
