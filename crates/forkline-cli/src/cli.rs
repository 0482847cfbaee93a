use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use forkline_types::Timestamp;

#[derive(Parser)]
#[command(
    name = "forkline",
    about = "Forkline: fork, amend, diff, and merge event histories",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML file with log settings (e.g. duplicate_policy)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Materialize the state of an event file
    State(StateArgs),
    /// List events in OTHER that BASE lacks
    Diff(DiffArgs),
    /// Merge two event files into one history
    Merge(MergeArgs),
    /// Compare the materialized states of two event files
    Compare(CompareArgs),
    /// Check an event file for malformed or duplicate events
    Validate(ValidateArgs),
    /// Print a new event as one JSON line
    Emit(EmitArgs),
}

#[derive(Args)]
pub struct StateArgs {
    pub file: PathBuf,
    /// Only include events with t <= UNTIL when forking
    #[arg(long)]
    pub until: Option<Timestamp>,
    /// Event files retroactively inserted into the fork
    #[arg(long = "insert")]
    pub inserts: Vec<PathBuf>,
}

#[derive(Args)]
pub struct DiffArgs {
    pub base: PathBuf,
    pub other: PathBuf,
}

#[derive(Args)]
pub struct MergeArgs {
    pub left: PathBuf,
    pub right: PathBuf,
    /// Write the merged events (canonical order) to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompareArgs {
    pub left: PathBuf,
    pub right: PathBuf,
}

#[derive(Args)]
pub struct ValidateArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct EmitArgs {
    /// Type tag of the event
    #[arg(long = "type")]
    pub kind: String,
    #[arg(long)]
    pub t: Timestamp,
    /// Payload as JSON
    #[arg(long, default_value = "null")]
    pub payload: String,
    /// Use this id instead of a generated one
    #[arg(long)]
    pub id: Option<String>,
    /// Also append the event to this file
    #[arg(long)]
    pub append: Option<PathBuf>,
}
