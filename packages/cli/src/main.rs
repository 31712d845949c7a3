mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    add, apply, check, delete, grid, init, move_shot, show, sub, AddArgs, ApplyArgs, CheckArgs,
    Context, DeleteArgs, GridArgs, InitArgs, MoveArgs, ShowArgs, SubArgs,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Storyboard CLI - shots, pages and numbering from the command line
#[derive(Parser, Debug)]
#[command(name = "storyboard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log settle passes and repairs (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project file (defaults to the one named in storyboard.config.json)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new storyboard project
    Init(InitArgs),

    /// Add shots
    Add(AddArgs),

    /// Add a sub-shot after a shot, grouping them
    Sub(SubArgs),

    /// Delete shots or a whole page
    Delete(DeleteArgs),

    /// Move a shot (or its sub-shot group) to a new position
    Move(MoveArgs),

    /// Change the page grid
    Grid(GridArgs),

    /// Apply a JSON list of mutations as one batch
    Apply(ApplyArgs),

    /// Print pages and shot numbers
    Show(ShowArgs),

    /// Verify pages against the shot order and repair drift
    Check(CheckArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let ctx = Context::load(cwd, cli.project)?;

    match cli.command {
        Command::Init(args) => init(args, &ctx),
        Command::Add(args) => add(args, &ctx),
        Command::Sub(args) => sub(args, &ctx),
        Command::Delete(args) => delete(args, &ctx),
        Command::Move(args) => move_shot(args, &ctx),
        Command::Grid(args) => grid(args, &ctx),
        Command::Apply(args) => apply(args, &ctx),
        Command::Show(args) => show(args, &ctx),
        Command::Check(args) => check(args, &ctx),
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
