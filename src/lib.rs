//! ime - keep dotenv files and AWS Parameter Store in sync
//!
//! Each environment declared in `ime.yaml` pairs a local env file with a
//! parameter store path (`global_prefix + project prefix + environment prefix`).
//!
//! ## Key Concepts
//!
//! - **Prefix-scoped**: every remote operation is confined to one path; only
//!   direct children of it are read or written
//! - **Modes**: `add` creates missing keys, `merge` makes local values win
//!   without deleting remote-only keys, `delete` removes the local keys remotely
//! - **Per-key outcomes**: conflicts are reported per key; a systemic failure
//!   stops the run and keeps what was already applied

pub mod cli;
pub mod config;
pub mod core;
pub mod remote;

pub use config::{Config, ResolvedEnvironment};
pub use core::env_file::{EnvFileStore, LocalMapping};
pub use core::plan::{Mutation, MutationPlan, ReconciliationMode};
pub use core::reconcile::{KeyOutcome, Outcome, ReconcileError, ReconciliationEngine, Report};
pub use remote::{MemoryStore, ParameterStore, RemoteError, RemoteMapping, RemoteParameterClient};
