mod bench;
mod client;
mod config;
mod html;
mod manifest;
mod remote;
mod run;
mod runner;
mod scaffold;
mod session;
mod timing;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::client::PuzzleClient;
use crate::config::{Config, Workspace};
use crate::manifest::WorkspaceManifest;
use crate::run::RunMode;
use crate::runner::CommandFailed;

/// First year the event ran
const FIRST_YEAR: i32 = 2015;

#[derive(Parser)]
#[command(name = "aoc")]
#[command(about = "Advent of Code workspace task runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Which puzzle a command is about
#[derive(Args)]
struct PuzzleArgs {
    /// Puzzle day (1-25)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=25))]
    day: Option<u8>,
    /// Puzzle year (defaults to the workspace's year, else this year)
    #[arg(short, long, value_parser = clap::value_parser!(i32).range(2015..))]
    year: Option<i32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start solving a day, by default the first one not started yet
    #[command(visible_alias = "ss")]
    StartSolve {
        #[command(flatten)]
        puzzle: PuzzleArgs,
    },
    /// Submit your answer for the current day
    #[command(visible_alias = "a")]
    Answer {
        answer: String,
        /// Which part to submit
        #[arg(value_parser = clap::value_parser!(u8).range(1..=2))]
        level: u8,
        #[command(flatten)]
        puzzle: PuzzleArgs,
    },
    /// Fetch the problem statement into dayNN/problem.md
    #[command(visible_alias = "fp")]
    FetchProblem {
        #[command(flatten)]
        puzzle: PuzzleArgs,
    },
    /// Run a criterion benchmark, saving its results as a baseline
    #[command(visible_alias = "sb")]
    SetBaseline {
        /// Benchmark filter, e.g. day05 or all
        day: String,
        /// Baseline name
        name: Option<String>,
    },
    /// Run a criterion benchmark, comparing against a saved baseline
    #[command(visible_alias = "cmp")]
    Compare { day: String, name: Option<String> },
    /// Stash the working changes, set the baseline, then compare the changes
    #[command(visible_alias = "cmp-stash")]
    CompareByStashing { day: String, name: Option<String> },
    /// Run a criterion benchmark without baselines
    Criterion { day: String },
    /// Run the iai benchmark
    Iai,
    /// Run the solution in debug mode
    #[command(visible_alias = "r")]
    Run,
    /// Run the solution in release mode
    #[command(visible_alias = "rr")]
    RunRelease,
    /// Re-run the solution on every change
    #[command(visible_alias = "wr")]
    WatchRun,
    /// Re-run prototype.py on every change
    #[command(visible_alias = "rp")]
    RunPrototype,
    /// Print the session cookie in use
    #[command(visible_alias = "cookie")]
    ShowSessionCookie,
    /// Show how long each day took
    #[command(visible_alias = "mct")]
    MeasureCompletionTime,
    /// Record now as the completion time of the current day
    #[command(visible_alias = "sct")]
    SetCompletionTime {
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=25))]
        day: Option<u8>,
    },
    /// Profile a benchmark on a remote machine and fetch the flamegraph
    Flamegraph {
        day: String,
        /// ssh host to run on
        #[arg(long)]
        remote: Option<String>,
    },
}

/// State shared by every handler
struct App {
    workspace: Workspace,
    config: Config,
    cwd: PathBuf,
}

impl App {
    /// Resolves the session cookie and builds the site client
    fn client(&self) -> Result<PuzzleClient> {
        let session = session::resolve(&self.config)?;
        PuzzleClient::new(&session, &self.config.site)
    }

    fn year(&self, flag: Option<i32>) -> Result<i32> {
        let pinned = match flag {
            Some(year) => Some(year),
            None => WorkspaceManifest::load(&self.workspace.manifest_path())?.year(),
        };
        resolve_year(pinned, Local::now().year())
    }

    /// The day named by a flag, else the dayNN directory we're standing in
    fn day(&self, flag: Option<u8>) -> Option<u8> {
        flag.or_else(|| self.workspace.current_day(&self.cwd))
    }
}

fn resolve_year(pinned: Option<i32>, this_year: i32) -> Result<i32> {
    let year = pinned.unwrap_or(this_year);
    if !(FIRST_YEAR..=this_year).contains(&year) {
        bail!("Year must be between {} and {}, got {}", FIRST_YEAR, this_year, year);
    }
    Ok(year)
}

fn not_in_day_dir() {
    println!("{}", "Not in a day directory.".red().bold());
}

async fn dispatch(command: Commands, app: &App) -> Result<()> {
    let build = &app.config.build;
    let bench_name = |name: Option<String>| name.unwrap_or_else(|| app.config.bench.baseline.clone());

    match command {
        Commands::StartSolve { puzzle } => {
            let day = match puzzle.day {
                Some(day) => day,
                None => app
                    .workspace
                    .first_missing_day()?
                    .context("All 25 days have been started")?,
            };
            let year = app.year(puzzle.year)?;
            let client = app.client()?;
            scaffold::start_day(&app.workspace, &client, year, day).await?;
        }
        Commands::Answer {
            answer,
            level,
            puzzle,
        } => {
            let Some(day) = app.day(puzzle.day) else {
                not_in_day_dir();
                return Ok(());
            };
            let year = app.year(puzzle.year)?;
            let client = app.client()?;
            let verdict = client.submit_answer(year, day, &answer, level).await?;
            println!("{}", verdict);
        }
        Commands::FetchProblem { puzzle } => {
            let Some(day) = app.day(puzzle.day) else {
                not_in_day_dir();
                return Ok(());
            };
            let year = app.year(puzzle.year)?;
            let client = app.client()?;
            let path = scaffold::save_problem(&app.workspace, &client, year, day).await?;
            println!("Saved {}", path.display());
        }
        Commands::SetBaseline { day, name } => {
            bench::set_baseline(&app.workspace, build, &day, &bench_name(name))?;
        }
        Commands::Compare { day, name } => {
            bench::compare(&app.workspace, build, &day, &bench_name(name))?;
        }
        Commands::CompareByStashing { day, name } => {
            bench::compare_by_stashing(&app.workspace, build, &day, &bench_name(name))?;
        }
        Commands::Criterion { day } => {
            bench::criterion(&app.workspace, build, &day)?;
        }
        Commands::Iai => {
            bench::iai(&app.workspace, build)?;
        }
        Commands::Run => run::run(RunMode::Debug, build)?,
        Commands::RunRelease => run::run(RunMode::Release, build)?,
        Commands::WatchRun => run::run(RunMode::Watch, build)?,
        Commands::RunPrototype => run::run(RunMode::Prototype, build)?,
        Commands::ShowSessionCookie => {
            let session = session::resolve(&app.config)?;
            println!("{} {}", "Your session cookie:".yellow(), session.value());
        }
        Commands::MeasureCompletionTime => {
            timing::measure_completion_time(&app.workspace)?;
        }
        Commands::SetCompletionTime { day } => {
            let Some(day) = app.day(day) else {
                not_in_day_dir();
                return Ok(());
            };
            timing::set_completion_time(&app.workspace, day)?;
        }
        Commands::Flamegraph { day, remote } => {
            let remote = remote.unwrap_or_else(|| app.config.bench.remote.clone());
            remote::flamegraph(&app.workspace, &day, &remote)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// `.env` files never override variables already set
fn load_dotenv(root: &Path) {
    if let Err(e) = dotenvy::from_path(root.join(".env")) {
        if !e.not_found() {
            tracing::warn!(error = %e, "ignoring malformed .env");
        }
    }
    let _ = dotenvy::dotenv();
}

fn execute(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let workspace = Workspace::discover(&cwd)?;
    load_dotenv(&workspace.root);
    let config = config::load_config()?;
    tracing::debug!(root = %workspace.root.display(), "workspace found");

    let app = App {
        workspace,
        config,
        cwd,
    };

    // Handlers run on this thread; the one worker only watches for Ctrl-C
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        tokio::spawn(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Bye!");
                std::process::exit(0);
            }
        });
        dispatch(cli.command, &app).await
    })
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = execute(cli) {
        // The runner already reported the failure
        if let Some(failed) = e.downcast_ref::<CommandFailed>() {
            std::process::exit(failed.code);
        }
        eprintln!("{}", format!("Error: {:#}", e).yellow().bold());
        std::process::exit(1);
    }
}
