//! `ime config` command
//!
//! Inspect the loaded configuration.
//!
//! # Usage
//! ```bash
//! ime config --show   # Table of every project environment
//! ime config --path   # Which ime.yaml was used
//! ```

use anyhow::Result;
use clap::Args;
use tabled::Tabled;

use super::utils::render_table;
use crate::config::Config;

#[derive(Args, Debug)]
#[group(required = true, multiple = true)]
pub struct ConfigArgs {
    /// Show every project environment
    #[arg(short, long)]
    pub show: bool,

    /// Show the config file path
    #[arg(short, long)]
    pub path: bool,
}

#[derive(Tabled, Debug, PartialEq)]
struct EnvironmentRow {
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Local Path")]
    local_path: String,
}

pub fn run(args: ConfigArgs, config: &Config) -> Result<()> {
    if args.path {
        match config.source() {
            Some(path) => println!("Config file used: {}", path.display()),
            None => println!("Config file used: (none)"),
        }
    }

    if args.show {
        let rows = rows(config)?;
        if rows.is_empty() {
            println!("No projects configured.");
        } else {
            println!("{}", render_table(rows));
        }
    }

    Ok(())
}

fn rows(config: &Config) -> Result<Vec<EnvironmentRow>> {
    let mut rows = Vec::new();
    for (project, prj) in &config.projects {
        for (environment, env) in &prj.environments {
            rows.push(EnvironmentRow {
                project: project.clone(),
                environment: environment.clone(),
                prefix: config.parameter_path(project, environment)?,
                local_path: env.resolved_local_path().display().to_string(),
            });
        }
    }
    Ok(rows)
}
