//! `ime fetch` command
//!
//! Lists the parameters of one environment and optionally writes them to its
//! local env file.
//!
//! # Usage
//! ```bash
//! ime fetch --project billing --env dev                 # table, values masked
//! ime fetch --project billing --env dev --show-values   # table with values
//! ime fetch --project billing --env dev --save          # write local_path
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::Tabled;

use super::utils::{display_value, render_table};
use crate::config::{Config, ResolvedEnvironment};
use crate::core::env_file::{EnvFileStore, LocalMapping};
use crate::remote::{ParameterStore, RemoteMapping, RemoteParameterClient};

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Project name from ime.yaml
    #[arg(long)]
    pub project: String,

    /// Environment name within the project
    #[arg(long)]
    pub env: String,

    /// Write the fetched parameters to the environment's local file
    #[arg(long)]
    pub save: bool,

    /// Print values instead of masking them
    #[arg(long)]
    pub show_values: bool,
}

#[derive(Tabled)]
struct ParameterRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Version")]
    version: i64,
}

/// Execute fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> Result<()> {
    let target = config.resolve(&args.project, &args.env)?;
    let client = RemoteParameterClient::from_config(&config.aws).await;
    run(&client, &target, &args).await
}

pub async fn run<S: ParameterStore>(
    client: &RemoteParameterClient<S>,
    target: &ResolvedEnvironment,
    args: &FetchArgs,
) -> Result<()> {
    let remote = client
        .get(&target.prefix)
        .await
        .with_context(|| format!("Failed to fetch parameters under {}", target.prefix))?;

    if remote.is_empty() {
        println!("No parameters under {}.", target.prefix);
    } else {
        let rows = remote.iter().map(|(name, param)| ParameterRow {
            name: name.clone(),
            value: display_value(&param.value, args.show_values),
            version: param.version,
        });
        println!("{}", render_table(rows));
    }

    if args.save {
        EnvFileStore::new(&target.local_path)
            .save(&to_local(&remote))
            .context("Failed to write local environment file")?;
        println!(
            "{} Saved {} parameter(s) to {}",
            "✓".green(),
            remote.len(),
            target.local_path.display()
        );
    }

    Ok(())
}

fn to_local(remote: &RemoteMapping) -> LocalMapping {
    remote
        .iter()
        .map(|(name, param)| (name.clone(), param.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_writes_env_file() {
        let dir = TempDir::new().unwrap();
        let target = ResolvedEnvironment {
            project: "app".into(),
            environment: "dev".into(),
            prefix: "/app/dev".into(),
            local_path: dir.path().join(".env"),
        };
        let client = RemoteParameterClient::new(MemoryStore::with_parameters([
            ("/app/dev/API_KEY", "abc def"),
            ("/app/dev/PORT", "8080"),
            ("/app/prod/PORT", "80"),
        ]));
        let args = FetchArgs {
            project: "app".into(),
            env: "dev".into(),
            save: true,
            show_values: false,
        };

        run(&client, &target, &args).await.unwrap();

        let saved = EnvFileStore::new(&target.local_path).load().unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved["API_KEY"], "abc def");
        assert_eq!(saved["PORT"], "8080");
    }
}
