//! Core module - Local files and reconciliation
//!
//! Loads local parameters, plans mutations against the remote snapshot and
//! executes them.

pub mod env_file;
pub mod plan;
pub mod reconcile;
