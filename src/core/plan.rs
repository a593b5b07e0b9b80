//! Mutation plans
//!
//! A plan is derived from read-only snapshots of the local and remote
//! mappings and lists mutations in lexicographic name order.
//!
//! | Mode   | Local-only key     | Key on both sides  | Remote-only key |
//! |--------|--------------------|--------------------|-----------------|
//! | add    | put                | put (conflicts)    | untouched       |
//! | delete | untouched          | delete             | untouched       |
//! | merge  | put, overwrite     | put, overwrite     | untouched       |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::env_file::LocalMapping;
use crate::remote::RemoteMapping;

/// How local and remote parameters are reconciled
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReconciliationMode {
    /// Create local keys remotely, never replacing existing values
    #[default]
    Add,
    /// Remove remote keys that the local file names
    Delete,
    /// Make local keys authoritative without removing remote-only keys
    Merge,
}

impl fmt::Display for ReconciliationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationMode::Add => write!(f, "add"),
            ReconciliationMode::Delete => write!(f, "delete"),
            ReconciliationMode::Merge => write!(f, "merge"),
        }
    }
}

/// The kind of remote call a mutation makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Put,
    Overwrite,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Put => write!(f, "put"),
            Action::Overwrite => write!(f, "overwrite"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put {
        name: String,
        value: String,
        overwrite: bool,
    },
    Delete {
        name: String,
    },
}

impl Mutation {
    pub fn name(&self) -> &str {
        match self {
            Mutation::Put { name, .. } | Mutation::Delete { name } => name,
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Mutation::Put {
                overwrite: false, ..
            } => Action::Put,
            Mutation::Put {
                overwrite: true, ..
            } => Action::Overwrite,
            Mutation::Delete { .. } => Action::Delete,
        }
    }
}

/// Ordered mutations for one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationPlan {
    mode: ReconciliationMode,
    mutations: Vec<Mutation>,
}

impl MutationPlan {
    /// Derive the plan for `mode`.
    ///
    /// `overwrite` only applies to `Add`; `Merge` always overwrites.
    pub fn build(
        local: &LocalMapping,
        remote: &RemoteMapping,
        mode: ReconciliationMode,
        overwrite: bool,
    ) -> Self {
        let put = |name: &String, value: &String, overwrite: bool| Mutation::Put {
            name: name.clone(),
            value: value.clone(),
            overwrite,
        };

        let mut mutations: Vec<Mutation> = match mode {
            ReconciliationMode::Add => local
                .iter()
                .map(|(name, value)| put(name, value, overwrite))
                .collect(),
            ReconciliationMode::Merge => local
                .iter()
                .map(|(name, value)| put(name, value, true))
                .collect(),
            ReconciliationMode::Delete => local
                .keys()
                .filter(|name| remote.contains_key(*name))
                .map(|name| Mutation::Delete { name: name.clone() })
                .collect(),
        };

        mutations.sort_by(|a, b| a.name().cmp(b.name()));

        Self { mode, mutations }
    }

    pub fn mode(&self) -> ReconciliationMode {
        self.mode
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

impl<'a> IntoIterator for &'a MutationPlan {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
