//! Reconciliation engine
//!
//! Executes a `MutationPlan` one mutation at a time, in plan order, against a
//! single prefix. Per-key conflicts are recorded and the run continues; a
//! systemic remote error stops the run where it is. Nothing already applied
//! is rolled back.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::env_file::LocalMapping;
use super::plan::{Action, Mutation, MutationPlan, ReconciliationMode};
use crate::remote::{ParameterStore, RemoteError, RemoteMapping, RemoteParameterClient};

/// What happened to one planned mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Applied,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied => "applied",
            Outcome::Skipped(_) => "skipped",
            Outcome::Failed(_) => "failed",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Applied => None,
            Outcome::Skipped(reason) | Outcome::Failed(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyOutcome {
    pub name: String,
    pub action: Action,
    pub outcome: Outcome,
    /// Version written by an applied put
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Per-key outcomes of a completed run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub prefix: String,
    pub mode: ReconciliationMode,
    pub entries: Vec<KeyOutcome>,
}

impl Report {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to fetch parameters under {prefix}: {source}")]
    Fetch {
        prefix: String,
        #[source]
        source: RemoteError,
    },

    /// A systemic error stopped the run after `completed` was applied
    #[error("{action} {name} failed, remaining mutations abandoned: {source}")]
    Aborted {
        name: String,
        action: Action,
        #[source]
        source: RemoteError,
        completed: Vec<KeyOutcome>,
    },
}

/// Reconciles local parameters into one remote prefix
pub struct ReconciliationEngine<'a, S> {
    client: &'a RemoteParameterClient<S>,
    prefix: &'a str,
}

impl<'a, S: ParameterStore> ReconciliationEngine<'a, S> {
    pub fn new(client: &'a RemoteParameterClient<S>, prefix: &'a str) -> Self {
        Self { client, prefix }
    }

    pub fn prefix(&self) -> &str {
        self.prefix
    }

    /// Current remote mapping under the prefix
    pub async fn fetch(&self) -> Result<RemoteMapping, ReconcileError> {
        self.client
            .get(self.prefix)
            .await
            .map_err(|source| ReconcileError::Fetch {
                prefix: self.prefix.to_string(),
                source,
            })
    }

    /// Fetch the remote mapping, then plan and execute `mode`
    pub async fn reconcile(
        &self,
        local: &LocalMapping,
        mode: ReconciliationMode,
        overwrite: bool,
    ) -> Result<Report, ReconcileError> {
        let remote = self.fetch().await?;
        self.run(local, &remote, mode, overwrite).await
    }

    /// Plan and execute `mode` against an already fetched remote mapping
    pub async fn run(
        &self,
        local: &LocalMapping,
        remote: &RemoteMapping,
        mode: ReconciliationMode,
        overwrite: bool,
    ) -> Result<Report, ReconcileError> {
        let plan = MutationPlan::build(local, remote, mode, overwrite);
        self.execute(&plan).await
    }

    /// Apply `plan` in order
    pub async fn execute(&self, plan: &MutationPlan) -> Result<Report, ReconcileError> {
        info!(
            prefix = self.prefix,
            mode = %plan.mode(),
            mutations = plan.len(),
            "Executing plan"
        );

        let mut entries = Vec::with_capacity(plan.len());

        for mutation in plan {
            let name = mutation.name();
            let action = mutation.action();

            let result = match mutation {
                Mutation::Put {
                    name,
                    value,
                    overwrite,
                } => self
                    .client
                    .put(self.prefix, name, value, *overwrite)
                    .await
                    .map(Some),
                Mutation::Delete { name } => {
                    self.client.delete(self.prefix, name).await.map(|()| None)
                }
            };

            let (outcome, version) = match result {
                Ok(version) => (Outcome::Applied, version),
                Err(source) if source.is_systemic() => {
                    warn!(key = name, %action, error = %source, "Aborting plan");
                    return Err(ReconcileError::Aborted {
                        name: name.to_string(),
                        action,
                        source,
                        completed: entries,
                    });
                }
                Err(RemoteError::AlreadyExists(_)) => {
                    (Outcome::Skipped("already present".to_string()), None)
                }
                Err(RemoteError::NotFound(_)) => (Outcome::Skipped("not found".to_string()), None),
                Err(other) => (Outcome::Failed(other.to_string()), None),
            };

            match &outcome {
                Outcome::Applied => debug!(key = name, %action, "Applied"),
                other => warn!(
                    key = name,
                    %action,
                    outcome = other.label(),
                    reason = other.reason(),
                    "Not applied"
                ),
            }

            entries.push(KeyOutcome {
                name: name.to_string(),
                action,
                outcome,
                version,
            });
        }

        let report = Report {
            prefix: self.prefix.to_string(),
            mode: plan.mode(),
            entries,
        };

        info!(
            applied = report.applied(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Plan finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::StoreCall;
    use crate::remote::MemoryStore;
    use std::time::Duration;

    const PREFIX: &str = "/app/dev";

    fn local(pairs: &[(&str, &str)]) -> LocalMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn client(pairs: &[(&str, &str)]) -> RemoteParameterClient<MemoryStore> {
        RemoteParameterClient::new(MemoryStore::with_parameters(
            pairs
                .iter()
                .map(|(k, v)| (format!("{}/{}", PREFIX, k), v.to_string())),
        ))
    }

    fn value(client: &RemoteParameterClient<MemoryStore>, name: &str) -> Option<String> {
        client
            .store()
            .snapshot()
            .get(&format!("{}/{}", PREFIX, name))
            .map(|p| p.value.clone())
    }

    #[tokio::test]
    async fn test_add_skips_existing_keys() {
        let client = client(&[("B", "9"), ("C", "3")]);
        let engine = ReconciliationEngine::new(&client, PREFIX);

        let report = engine
            .reconcile(&local(&[("A", "1"), ("B", "2")]), ReconciliationMode::Add, false)
            .await
            .unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[0].outcome, Outcome::Applied);
        assert_eq!(report.entries[0].version, Some(1));
        assert_eq!(
            report.entries[1].outcome,
            Outcome::Skipped("already present".into())
        );

        assert_eq!(value(&client, "A").as_deref(), Some("1"));
        assert_eq!(value(&client, "B").as_deref(), Some("9"));
        assert_eq!(value(&client, "C").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_delete_missing_key_is_skipped() {
        let client = client(&[("A", "1")]);
        let engine = ReconciliationEngine::new(&client, PREFIX);

        // Remote snapshot says A exists, but it is gone by execution time
        let stale = client.get(PREFIX).await.unwrap();
        client.store().delete("/app/dev/A").await.unwrap();

        let report = engine
            .run(&local(&[("A", "1")]), &stale, ReconciliationMode::Delete, false)
            .await
            .unwrap();

        assert_eq!(report.entries[0].action, Action::Delete);
        assert_eq!(report.entries[0].outcome, Outcome::Skipped("not found".into()));
    }

    #[tokio::test]
    async fn test_rejected_key_fails_without_aborting() {
        let client = client(&[]);
        // Call 1 is the listing, call 2 the first put
        client.store().fail_call(
            2,
            RemoteError::Rejected {
                path: "/app/dev/A".into(),
                reason: "value too large".into(),
            },
        );
        let engine = ReconciliationEngine::new(&client, PREFIX);

        let report = engine
            .reconcile(&local(&[("A", "1"), ("B", "2")]), ReconciliationMode::Add, false)
            .await
            .unwrap();

        assert!(matches!(report.entries[0].outcome, Outcome::Failed(ref r) if r.contains("too large")));
        assert_eq!(report.entries[1].outcome, Outcome::Applied);
        assert_eq!((report.applied(), report.skipped(), report.failed()), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_systemic_error_aborts_remaining_plan() {
        let client = client(&[]);
        client
            .store()
            .fail_call(3, RemoteError::Unavailable("connection reset".into()));
        let engine = ReconciliationEngine::new(&client, PREFIX);

        let err = engine
            .reconcile(
                &local(&[("A", "1"), ("B", "2"), ("C", "3")]),
                ReconciliationMode::Merge,
                false,
            )
            .await
            .unwrap_err();

        match err {
            ReconcileError::Aborted {
                name,
                action,
                completed,
                ..
            } => {
                assert_eq!(name, "B");
                assert_eq!(action, Action::Overwrite);
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].name, "A");
            }
            other => panic!("expected abort, got {:?}", other),
        }

        // A stays applied, C was never attempted
        assert_eq!(value(&client, "A").as_deref(), Some("1"));
        assert_eq!(value(&client, "C"), None);
        assert_eq!(client.store().calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_aborts_remaining_plan() {
        let client = client(&[]).with_timeout(Duration::from_secs(2));
        // Call 1 is the listing, call 3 the put of B
        client.store().delay_call(3, Duration::from_secs(30));
        let engine = ReconciliationEngine::new(&client, PREFIX);

        let err = engine
            .reconcile(
                &local(&[("A", "1"), ("B", "2"), ("C", "3")]),
                ReconciliationMode::Add,
                false,
            )
            .await
            .unwrap_err();

        match err {
            ReconcileError::Aborted {
                name,
                action,
                source,
                completed,
            } => {
                assert_eq!(name, "B");
                assert_eq!(action, Action::Put);
                assert!(matches!(
                    source,
                    RemoteError::Timeout { ref operation, after }
                        if operation == "put /app/dev/B" && after == Duration::from_secs(2)
                ));
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].name, "A");
                assert_eq!(completed[0].outcome, Outcome::Applied);
            }
            other => panic!("expected abort, got {:?}", other),
        }

        let calls = client.store().calls();
        assert_eq!(calls.len(), 3);
        assert!(!calls
            .iter()
            .any(|c| matches!(c, StoreCall::Put { path, .. } if path == "/app/dev/C")));
        assert_eq!(value(&client, "A").as_deref(), Some("1"));
        assert_eq!(value(&client, "B"), None);
        assert_eq!(value(&client, "C"), None);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_before_any_mutation() {
        let client = client(&[("A", "1")]);
        client
            .store()
            .fail_call(1, RemoteError::Unauthorized("expired token".into()));
        let engine = ReconciliationEngine::new(&client, PREFIX);

        let err = engine
            .reconcile(&local(&[("A", "2")]), ReconciliationMode::Merge, false)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Fetch { .. }));
        assert_eq!(client.store().calls().len(), 1);
        assert_eq!(value(&client, "A").as_deref(), Some("1"));
    }

    #[test]
    fn test_outcome_serializes_with_reason() {
        let json = serde_json::to_value(Outcome::Skipped("already present".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "skipped", "reason": "already present"})
        );

        let json = serde_json::to_value(Outcome::Applied).unwrap();
        assert_eq!(json, serde_json::json!({"status": "applied"}));
    }
}
