//! Parameter store backend trait
//!
//! The wire-level contract every backend speaks: list one page under a
//! prefix, put one value, delete one value. Paths here are always full paths.

use async_trait::async_trait;

use super::error::RemoteError;
use super::types::Page;

/// Backend for a hierarchical, path-addressed key-value store
///
/// Implemented by `SsmStore` (AWS Systems Manager) and `MemoryStore` (in-process)
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// List the direct children of `prefix`, at most `page_size` per call.
    ///
    /// `token` is the `next_token` of the previous page, `None` for the first.
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<Page, RemoteError>;

    /// Store `value` as a secure string at `path`, returning the new version.
    ///
    /// With `overwrite = false` an existing path fails with `AlreadyExists`.
    async fn put(&self, path: &str, value: &str, overwrite: bool) -> Result<i64, RemoteError>;

    /// Remove `path`; a missing path fails with `NotFound`.
    async fn delete(&self, path: &str) -> Result<(), RemoteError>;

    /// Human-readable backend name
    fn name(&self) -> &str;
}
