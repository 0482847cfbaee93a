use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use forkline_diff::{StateChange, StateDiff};
use forkline_ledger::{Branch, EventStore, EventValidator, LedgerConfig, ValidationReport};
use forkline_types::Event;
use serde_json::{json, Value};
use tracing::info;

use crate::cli::*;
use crate::events_file::{append_event, read_events, write_events};
use crate::kv::{kv_reducer, KvState};

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    let session = Session {
        config,
        format: cli.format,
    };

    match cli.command {
        Command::State(args) => cmd_state(&session, args),
        Command::Diff(args) => cmd_diff(&session, args),
        Command::Merge(args) => cmd_merge(&session, args),
        Command::Compare(args) => cmd_compare(&session, args),
        Command::Validate(args) => cmd_validate(&session, args),
        Command::Emit(args) => cmd_emit(args),
    }
}

struct Session {
    config: LedgerConfig,
    format: OutputFormat,
}

impl Session {
    fn store_from(&self, path: &Path) -> anyhow::Result<EventStore<KvState>> {
        let store = EventStore::with_config(kv_reducer(), self.config.clone());
        store.append_batch(read_events(path)?);
        Ok(store)
    }

    fn branch_from(&self, path: &Path) -> anyhow::Result<Branch<KvState>> {
        Ok(self.store_from(path)?.fork(None))
    }
}

fn cmd_state(session: &Session, args: StateArgs) -> anyhow::Result<ExitCode> {
    let branch = build_state_branch(session, &args)?;
    let materialized = branch.materialize()?;

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&materialized.state)?),
        OutputFormat::Text => {
            print_state(&materialized.state);
            let head = materialized
                .head
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".into());
            println!(
                "{} {} event(s) applied, {} duplicate(s) skipped, head t={}",
                "✓".green().bold(),
                materialized.applied.to_string().bold(),
                materialized.skipped_duplicates,
                head.cyan()
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn build_state_branch(session: &Session, args: &StateArgs) -> anyhow::Result<Branch<KvState>> {
    let store = session.store_from(&args.file)?;
    let mut branch = store.fork(args.until);
    for path in &args.inserts {
        for event in read_events(path)? {
            branch.retro_insert(event);
        }
    }
    info!(
        forked = store.len(),
        held = branch.len(),
        policy = %session.config.duplicate_policy,
        "branch ready"
    );
    Ok(branch)
}

fn cmd_diff(session: &Session, args: DiffArgs) -> anyhow::Result<ExitCode> {
    let base = session.branch_from(&args.base)?;
    let other = session.branch_from(&args.other)?;
    let missing = base.diff(&other);

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&missing)?),
        OutputFormat::Text => {
            if missing.is_empty() {
                println!("No events missing from {}.", args.base.display());
            }
            for event in &missing {
                println!("{} {}", "+".green(), describe(event));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_merge(session: &Session, args: MergeArgs) -> anyhow::Result<ExitCode> {
    let (merged, events) = merge_files(session, &args.left, &args.right)?;
    let state = merged.state()?;

    if let Some(output) = &args.output {
        write_events(output, &events)?;
    }

    match session.format {
        OutputFormat::Json => {
            let body = json!({ "events": events, "state": state });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            println!(
                "{} Merged {} event(s) from {} and {}",
                "✓".green().bold(),
                events.len().to_string().bold(),
                args.left.display(),
                args.right.display()
            );
            if let Some(output) = &args.output {
                println!("  Written to {}", output.display().to_string().blue());
            }
            print_state(&state);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Merge two event files; returns the merged branch and its canonical events.
fn merge_files(
    session: &Session,
    left: &Path,
    right: &Path,
) -> anyhow::Result<(Branch<KvState>, Vec<Event>)> {
    let left = session.branch_from(left)?;
    let right = session.branch_from(right)?;
    let merged = left.merge(&right);
    let events = merged.canonical_events();
    Ok((merged, events))
}

fn cmd_compare(session: &Session, args: CompareArgs) -> anyhow::Result<ExitCode> {
    let left = session.branch_from(&args.left)?;
    let right = session.branch_from(&args.right)?;
    let diff = left.state_diff(&right)?;

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diff)?),
        OutputFormat::Text => print_state_diff(&diff),
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(session: &Session, args: ValidateArgs) -> anyhow::Result<ExitCode> {
    let report = EventValidator::validate_source(&session.store_from(&args.file)?);

    match session.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_emit(args: EmitArgs) -> anyhow::Result<ExitCode> {
    let event = build_event(&args)?;
    if let Some(path) = &args.append {
        append_event(path, &event)?;
    }
    println!("{}", event.to_json()?);
    Ok(ExitCode::SUCCESS)
}

fn build_event(args: &EmitArgs) -> anyhow::Result<Event> {
    let payload: Value = serde_json::from_str(&args.payload)
        .with_context(|| format!("payload is not valid JSON: {}", args.payload))?;
    let event = match &args.id {
        Some(id) => Event::new(id.as_str(), args.t, args.kind.as_str(), payload),
        None => Event::generated(args.t, args.kind.as_str(), payload),
    };
    event.check_well_formed()?;
    Ok(event)
}

fn describe(event: &Event) -> String {
    format!(
        "{} t={} {} {}",
        event.id().to_string().yellow(),
        event.t(),
        event.kind().cyan(),
        event.payload()
    )
}

fn print_state(state: &KvState) {
    if state.is_empty() {
        println!("  (empty state)");
    }
    for (key, value) in state {
        println!("  {} = {}", key.bold(), value);
    }
}

fn print_state_diff(diff: &StateDiff) {
    if diff.is_empty() {
        println!("States are identical.");
        return;
    }
    for change in &diff.changes {
        match change {
            StateChange::Added { key, value } => println!("{} {} = {}", "+".green(), key, value),
            StateChange::Removed { key, value } => println!("{} {} = {}", "-".red(), key, value),
            StateChange::Modified { key, old, new } => {
                println!("{} {}: {} → {}", "~".yellow(), key, old, new)
            }
        }
    }
    println!(
        "{} added, {} removed, {} modified",
        diff.additions(),
        diff.removals(),
        diff.modifications()
    );
}

fn print_report(report: &ValidationReport) {
    if report.is_valid() {
        println!(
            "{} {} event(s), {} distinct id(s), no issues",
            "✓".green().bold(),
            report.event_count,
            report.distinct_ids
        );
        return;
    }
    println!(
        "{} {} issue(s) in {} event(s)",
        "✗".red().bold(),
        report.violations.len(),
        report.event_count
    );
    for violation in &report.violations {
        println!(
            "  [{}] {:?}: {}",
            violation.position, violation.kind, violation.description
        );
    }
}
