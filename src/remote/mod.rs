//! Remote parameter store module
//!
//! Provides the path-prefixed client and its store backends.

mod client;
mod error;
pub mod memory;
mod ssm;
mod store;
mod types;

pub use client::{RemoteParameterClient, DEFAULT_TIMEOUT};
pub use error::RemoteError;
pub use memory::MemoryStore;
pub use ssm::SsmStore;
pub use store::ParameterStore;
pub use types::*;
