//! `ime push` command
//!
//! Reconciles a local env file into its parameter store path.
//!
//! # Usage
//! ```bash
//! ime push --project billing --env dev                 # add new keys only
//! ime push --project billing --env dev --overwrite     # add, replacing values
//! ime push --project billing --env dev --mode merge    # local wins, keep remote-only keys
//! ime push --project billing --env dev --mode delete   # remove local keys remotely
//! ime push --project billing --env dev --dry-run       # show the plan only
//! ```

use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use dialoguer::Confirm;
use tabled::Tabled;

use super::utils::render_table;
use crate::config::{Config, ResolvedEnvironment};
use crate::core::env_file::{EnvFileStore, LocalMapping};
use crate::core::plan::{MutationPlan, ReconciliationMode};
use crate::core::reconcile::{KeyOutcome, Outcome, ReconcileError, ReconciliationEngine, Report};
use crate::remote::{ParameterStore, RemoteParameterClient};

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Project name from ime.yaml
    #[arg(long)]
    pub project: String,

    /// Environment name within the project
    #[arg(long)]
    pub env: String,

    /// How local keys are reconciled with the store
    #[arg(long, value_enum, default_value_t = ReconciliationMode::Add)]
    pub mode: ReconciliationMode,

    /// Replace existing values in add mode
    #[arg(long)]
    pub overwrite: bool,

    /// Show the plan without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the delete confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Version")]
    version: String,
}

impl From<&KeyOutcome> for OutcomeRow {
    fn from(entry: &KeyOutcome) -> Self {
        let outcome = match entry.outcome.reason() {
            Some(reason) => format!("{} ({})", entry.outcome.label(), reason),
            None => entry.outcome.label().to_string(),
        };

        Self {
            name: entry.name.clone(),
            action: entry.action.to_string(),
            outcome,
            version: entry.version.map(|v| v.to_string()).unwrap_or_default(),
        }
    }
}

/// Execute push command
pub async fn execute(args: PushArgs, config: &Config) -> Result<()> {
    let target = config.resolve(&args.project, &args.env)?;

    let local = EnvFileStore::new(&target.local_path)
        .load()
        .context("Failed to load local environment file")?;

    if args.mode == ReconciliationMode::Delete && !args.dry_run && !confirm_delete(&target, args.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let client = RemoteParameterClient::from_config(&config.aws).await;
    run(&client, &target, &local, &args).await
}

/// Plan and (unless dry-running) apply the push against `client`
pub async fn run<S: ParameterStore>(
    client: &RemoteParameterClient<S>,
    target: &ResolvedEnvironment,
    local: &LocalMapping,
    args: &PushArgs,
) -> Result<()> {
    let engine = ReconciliationEngine::new(client, &target.prefix);
    let remote = engine.fetch().await?;
    let plan = MutationPlan::build(local, &remote, args.mode, args.overwrite);

    if args.dry_run {
        print_plan(&plan, &target.prefix);
        return Ok(());
    }

    if !args.json {
        eprintln!(
            "{} {} parameter(s) into {} ({})",
            "→".cyan(),
            plan.len(),
            target.prefix.cyan(),
            args.mode
        );
    }

    match engine.execute(&plan).await {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(err) => {
            if let ReconcileError::Aborted { completed, .. } = &err {
                if !completed.is_empty() {
                    println!("{}", render_table(completed.iter().map(OutcomeRow::from)));
                }
                eprintln!(
                    "{} {} mutation(s) applied before the abort were kept",
                    "!".yellow(),
                    completed.len()
                );
            }
            Err(err).with_context(|| format!("push to {} aborted", target.prefix))
        }
    }
}

fn print_plan(plan: &MutationPlan, prefix: &str) {
    if plan.is_empty() {
        println!("Nothing to do for {}.", prefix);
        return;
    }

    let rows = plan.iter().map(|m| OutcomeRow {
        name: m.name().to_string(),
        action: m.action().to_string(),
        outcome: "planned".to_string(),
        version: String::new(),
    });
    println!("{}", render_table(rows));
    println!("\n{} mutation(s) planned for {} (dry run)", plan.len(), prefix.cyan());
}

fn print_report(report: &Report) {
    if report.entries.is_empty() {
        println!("Nothing to do for {}.", report.prefix);
        return;
    }

    println!("{}", render_table(report.entries.iter().map(OutcomeRow::from)));

    let summary = format!(
        "{} applied, {} skipped, {} failed",
        report.applied(),
        report.skipped(),
        report.failed()
    );
    let marker = if report.entries.iter().all(|e| e.outcome == Outcome::Applied) {
        "✓".green()
    } else {
        "!".yellow()
    };
    println!("\n{} {}", marker, summary);
}

fn confirm_delete(target: &ResolvedEnvironment, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }

    if !std::io::stdin().is_terminal() {
        bail!(
            "Refusing to delete from {} without --yes in a non-interactive session",
            target.prefix
        );
    }

    let confirmed = Confirm::new()
        .with_prompt(format!(
            "Delete the keys of {} from {}?",
            target.local_path.display(),
            target.prefix.red()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}
