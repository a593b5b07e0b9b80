//! Remote parameter types
//!
//! Parameters live at `{prefix}/{name}`. A prefix starts with `/` and never
//! ends with one; a name never contains `/`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::RemoteError;

/// Path separator of the remote hierarchy
pub const SEPARATOR: char = '/';

/// Largest page `GetParametersByPath` will return
pub const MAX_PAGE_SIZE: usize = 10;

/// A parameter as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParameter {
    pub value: String,
    pub version: i64,
}

/// Remote parameters keyed by bare name
pub type RemoteMapping = BTreeMap<String, RemoteParameter>;

/// One listed parameter, addressed by its full path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub path: String,
    pub value: String,
    pub version: i64,
}

/// One page of a listing plus the token for the next one
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub entries: Vec<PageEntry>,
    pub next_token: Option<String>,
}

/// Join a prefix and a bare name
pub fn full_path(prefix: &str, name: &str) -> String {
    format!("{}{}{}", prefix, SEPARATOR, name)
}

/// Strip `prefix/` from a listed path, yielding the bare name.
///
/// Returns `None` for paths outside the prefix or nested below a direct child.
pub fn strip_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let name = path.strip_prefix(prefix)?.strip_prefix(SEPARATOR)?;
    if name.is_empty() || name.contains(SEPARATOR) {
        return None;
    }
    Some(name)
}

pub fn validate_prefix(prefix: &str) -> Result<(), RemoteError> {
    let reason = if !prefix.starts_with(SEPARATOR) {
        "prefix must start with '/'"
    } else if prefix.ends_with(SEPARATOR) {
        "prefix must not end with '/'"
    } else {
        return Ok(());
    };

    Err(RemoteError::Rejected {
        path: prefix.to_string(),
        reason: reason.to_string(),
    })
}

pub fn validate_name(prefix: &str, name: &str) -> Result<(), RemoteError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains(SEPARATOR) {
        "name must not contain '/'"
    } else {
        return Ok(());
    };

    Err(RemoteError::Rejected {
        path: full_path(prefix, name),
        reason: reason.to_string(),
    })
}
