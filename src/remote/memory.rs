//! In-process parameter store
//!
//! Mirrors the SSM semantics the client relies on: non-recursive listing in
//! path order, opaque continuation tokens, overwrite protection, per-path
//! version counters. Faults and latency can be injected per call.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::error::RemoteError;
use super::store::ParameterStore;
use super::types::{strip_prefix, Page, PageEntry, RemoteParameter};

/// A call received by the store, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List { prefix: String, token: Option<String> },
    Put { path: String, overwrite: bool },
    Delete { path: String },
}

#[derive(Debug, Default)]
struct State {
    params: BTreeMap<String, RemoteParameter>,
    calls: Vec<StoreCall>,
    faults: BTreeMap<usize, RemoteError>,
    slow_calls: BTreeMap<usize, Duration>,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with `(full path, value)` pairs, each at version 1
    pub fn with_parameters<I, P, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for (path, value) in params {
                state.params.insert(
                    path.into(),
                    RemoteParameter {
                        value: value.into(),
                        version: 1,
                    },
                );
            }
        }
        store
    }

    /// Fail the `n`th call (1-based, counting every operation) with `error`
    pub fn fail_call(&self, n: usize, error: RemoteError) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.insert(n, error);
        }
    }

    /// Delay only the `n`th call (1-based) by `delay`
    pub fn delay_call(&self, n: usize, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.slow_calls.insert(n, delay);
        }
    }

    /// Delay every call by `delay` before it is served
    pub fn set_delay(&self, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.delay = Some(delay);
        }
    }

    /// Copy of the stored parameters keyed by full path
    pub fn snapshot(&self) -> BTreeMap<String, RemoteParameter> {
        self.state
            .lock()
            .map(|s| s.params.clone())
            .unwrap_or_default()
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RemoteError> {
        self.state
            .lock()
            .map_err(|e| RemoteError::Unavailable(format!("Lock error: {}", e)))
    }

    /// Record the call, then apply latency and any injected fault
    async fn enter(&self, call: StoreCall) -> Result<(), RemoteError> {
        let (fault, delay) = {
            let mut state = self.lock()?;
            state.calls.push(call);
            let n = state.calls.len();
            (
                state.faults.remove(&n),
                state.slow_calls.remove(&n).or(state.delay),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match fault {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ParameterStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<Page, RemoteError> {
        self.enter(StoreCall::List {
            prefix: prefix.to_string(),
            token: token.map(str::to_string),
        })
        .await?;

        let state = self.lock()?;

        // Tokens are the last path of the previous page
        let mut children = state
            .params
            .iter()
            .filter(|(path, _)| strip_prefix(prefix, path).is_some())
            .filter(|(path, _)| token.map_or(true, |t| path.as_str() > t));

        let entries: Vec<PageEntry> = children
            .by_ref()
            .take(page_size.max(1))
            .map(|(path, param)| PageEntry {
                path: path.clone(),
                value: param.value.clone(),
                version: param.version,
            })
            .collect();

        let next_token = match (children.next(), entries.last()) {
            (Some(_), Some(last)) => Some(last.path.clone()),
            _ => None,
        };

        Ok(Page {
            entries,
            next_token,
        })
    }

    async fn put(&self, path: &str, value: &str, overwrite: bool) -> Result<i64, RemoteError> {
        self.enter(StoreCall::Put {
            path: path.to_string(),
            overwrite,
        })
        .await?;

        let mut state = self.lock()?;
        let version = match state.params.get(path) {
            Some(_) if !overwrite => return Err(RemoteError::AlreadyExists(path.to_string())),
            Some(existing) => existing.version + 1,
            None => 1,
        };

        state.params.insert(
            path.to_string(),
            RemoteParameter {
                value: value.to_string(),
                version,
            },
        );
        Ok(version)
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.enter(StoreCall::Delete {
            path: path.to_string(),
        })
        .await?;

        let mut state = self.lock()?;
        match state.params.remove(path) {
            Some(_) => Ok(()),
            None => Err(RemoteError::NotFound(path.to_string())),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
