//! CLI module - Command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod config;
pub mod fetch;
pub mod push;
pub mod utils;

/// ime - keep dotenv files and AWS Parameter Store in sync
///
/// Environments are declared per project in ime.yaml; each one pairs a local
/// env file with a parameter store path.
#[derive(Parser, Debug)]
#[command(name = "ime")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, env = "IME_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push a local env file to Parameter Store
    Push(push::PushArgs),

    /// Fetch an environment from Parameter Store
    Fetch(fetch::FetchArgs),

    /// Inspect the ime configuration
    Config(config::ConfigArgs),
}
