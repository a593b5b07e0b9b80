//! Remote parameter client
//!
//! Addresses parameters by `(prefix, name)`, drives pagination, and gives
//! every store call its own timeout.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::error::RemoteError;
use super::ssm::SsmStore;
use super::store::ParameterStore;
use super::types::*;
use crate::config::AwsConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a path-prefixed parameter store
#[derive(Debug, Clone)]
pub struct RemoteParameterClient<S> {
    store: S,
    timeout: Duration,
    page_size: usize,
}

impl RemoteParameterClient<SsmStore> {
    /// Create an SSM-backed client from config
    pub async fn from_config(config: &AwsConfig) -> Self {
        let store = SsmStore::from_config(config).await;
        Self::new(store)
            .with_timeout(config.timeout())
            .with_page_size(config.page_size)
    }
}

impl<S: ParameterStore> RemoteParameterClient<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
            page_size: MAX_PAGE_SIZE,
        }
    }

    /// Per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Entries requested per list call, clamped to `1..=MAX_PAGE_SIZE`
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    // ============== Operations ==============

    /// Fetch every parameter directly under `prefix`, keyed by bare name.
    ///
    /// Any failed page fails the whole listing; a partial listing is never
    /// returned.
    pub async fn get(&self, prefix: &str) -> Result<RemoteMapping, RemoteError> {
        validate_prefix(prefix)?;

        let mut mapping = RemoteMapping::new();
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let operation = format!("list {}", prefix);
            let page = self
                .call(
                    operation,
                    self.store.list_page(prefix, token.as_deref(), self.page_size),
                )
                .await
                .map_err(|e| as_listing_error(prefix, e))?;
            pages += 1;

            debug!(
                prefix,
                page = pages,
                entries = page.entries.len(),
                "Fetched parameter page"
            );

            for entry in page.entries {
                let Some(name) = strip_prefix(prefix, &entry.path) else {
                    warn!(path = %entry.path, prefix, "Skipping parameter outside prefix");
                    continue;
                };
                mapping.insert(
                    name.to_string(),
                    RemoteParameter {
                        value: entry.value,
                        version: entry.version,
                    },
                );
            }

            // A token seen before means the cursor cycles
            match page.next_token {
                None => break,
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(RemoteError::Unavailable(format!(
                        "list {}: continuation token {:?} repeated, listing did not advance",
                        prefix, next
                    )));
                }
                Some(next) => token = Some(next),
            }
        }

        debug!(
            store = self.store.name(),
            prefix,
            pages,
            total = mapping.len(),
            "Fetched remote parameters"
        );
        Ok(mapping)
    }

    /// Store `value` at `prefix/name` as a secure string, returning its version
    pub async fn put(
        &self,
        prefix: &str,
        name: &str,
        value: &str,
        overwrite: bool,
    ) -> Result<i64, RemoteError> {
        validate_prefix(prefix)?;
        validate_name(prefix, name)?;

        let path = full_path(prefix, name);
        let version = self
            .call(
                format!("put {}", path),
                self.store.put(&path, value, overwrite),
            )
            .await?;

        debug!(store = self.store.name(), path = %path, version, overwrite, "Put parameter");
        Ok(version)
    }

    /// Remove `prefix/name`
    pub async fn delete(&self, prefix: &str, name: &str) -> Result<(), RemoteError> {
        validate_prefix(prefix)?;
        validate_name(prefix, name)?;

        let path = full_path(prefix, name);
        self.call(format!("delete {}", path), self.store.delete(&path))
            .await?;

        debug!(store = self.store.name(), path = %path, "Deleted parameter");
        Ok(())
    }

    // ============== Helpers ==============

    /// Run one store call under the per-call timeout. No retries.
    async fn call<T>(
        &self,
        operation: String,
        fut: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }
}

/// A listing either completes or is unavailable as a whole
fn as_listing_error(prefix: &str, err: RemoteError) -> RemoteError {
    if err.is_systemic() {
        err
    } else {
        RemoteError::Unavailable(format!("list {}: {}", prefix, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{MemoryStore, StoreCall};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seeded(n: usize) -> MemoryStore {
        MemoryStore::with_parameters((0..n).map(|i| (format!("/app/dev/KEY_{:02}", i), i.to_string())))
    }

    #[tokio::test]
    async fn test_get_collects_all_pages() {
        let client = RemoteParameterClient::new(seeded(23)).with_page_size(10);

        let mapping = client.get("/app/dev").await.unwrap();
        assert_eq!(mapping.len(), 23);
        assert_eq!(mapping["KEY_07"].value, "7");

        let lists = client
            .store()
            .calls()
            .iter()
            .filter(|c| matches!(c, StoreCall::List { .. }))
            .count();
        assert_eq!(lists, 3);
    }

    #[tokio::test]
    async fn test_get_independent_of_page_size() {
        for page_size in 1..=MAX_PAGE_SIZE {
            let client = RemoteParameterClient::new(seeded(17)).with_page_size(page_size);
            let mapping = client.get("/app/dev").await.unwrap();
            assert_eq!(mapping.len(), 17, "page size {}", page_size);
        }
    }

    #[tokio::test]
    async fn test_get_empty_prefix() {
        let client = RemoteParameterClient::new(MemoryStore::new());
        assert!(client.get("/app/dev").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_strips_prefix() {
        let store = MemoryStore::with_parameters([("/app/dev/A", "1"), ("/app/devops/B", "2")]);
        let client = RemoteParameterClient::new(store);

        let mapping = client.get("/app/dev").await.unwrap();
        assert_eq!(mapping.keys().collect::<Vec<_>>(), vec!["A"]);
        assert_eq!(mapping["A"].version, 1);
    }

    #[tokio::test]
    async fn test_get_fails_whole_listing_on_page_error() {
        let client = RemoteParameterClient::new(seeded(25)).with_page_size(10);
        client
            .store()
            .fail_call(2, RemoteError::Unavailable("503".into()));

        let err = client.get("/app/dev").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_get_wraps_per_key_error_as_unavailable() {
        let client = RemoteParameterClient::new(seeded(3));
        client.store().fail_call(
            1,
            RemoteError::Rejected {
                path: "/app/dev".into(),
                reason: "bad".into(),
            },
        );

        let err = client.get("/app/dev").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_get_rejects_bad_prefix_before_calling() {
        let client = RemoteParameterClient::new(MemoryStore::new());

        assert!(client.get("/app/dev/").await.is_err());
        assert!(client.get("app/dev").await.is_err());
        assert!(client.store().calls().is_empty());
    }

    #[tokio::test]
    async fn test_put_conflict_and_overwrite() {
        let client = RemoteParameterClient::new(MemoryStore::with_parameters([("/app/A", "old")]));

        let err = client.put("/app", "A", "new", false).await.unwrap_err();
        assert!(matches!(err, RemoteError::AlreadyExists(_)));

        let version = client.put("/app", "A", "new", true).await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(client.store().snapshot()["/app/A"].value, "new");
    }

    #[tokio::test]
    async fn test_put_rejects_name_with_separator() {
        let client = RemoteParameterClient::new(MemoryStore::new());

        let err = client.put("/app", "a/b", "v", false).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
        assert!(client.store().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let client = RemoteParameterClient::new(MemoryStore::new());
        let err = client.delete("/app", "A").await.unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let store = MemoryStore::new();
        store.set_delay(Duration::from_secs(30));
        let client = RemoteParameterClient::new(store).with_timeout(Duration::from_secs(2));

        let err = client.put("/app", "A", "1", false).await.unwrap_err();
        match err {
            RemoteError::Timeout { operation, after } => {
                assert_eq!(operation, "put /app/A");
                assert_eq!(after, Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    /// Hands out `tokens` in a loop, never ending the listing
    struct CyclingStore {
        tokens: Vec<&'static str>,
        served: AtomicUsize,
    }

    impl CyclingStore {
        fn new(tokens: &[&'static str]) -> Self {
            Self {
                tokens: tokens.to_vec(),
                served: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ParameterStore for CyclingStore {
        async fn list_page(
            &self,
            _prefix: &str,
            _token: Option<&str>,
            _page_size: usize,
        ) -> Result<Page, RemoteError> {
            let n = self.served.fetch_add(1, Ordering::SeqCst);
            Ok(Page {
                entries: vec![],
                next_token: Some(self.tokens[n % self.tokens.len()].to_string()),
            })
        }

        async fn put(&self, path: &str, _value: &str, _overwrite: bool) -> Result<i64, RemoteError> {
            Err(RemoteError::Unavailable(path.to_string()))
        }

        async fn delete(&self, path: &str) -> Result<(), RemoteError> {
            Err(RemoteError::Unavailable(path.to_string()))
        }

        fn name(&self) -> &str {
            "cycling"
        }
    }

    #[tokio::test]
    async fn test_get_aborts_on_repeated_token() {
        let client = RemoteParameterClient::new(CyclingStore::new(&["same"]));

        let err = client.get("/app/dev").await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));
        assert!(err.to_string().contains("did not advance"));
        assert_eq!(client.store().served.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_get_aborts_on_token_cycle() {
        let client = RemoteParameterClient::new(CyclingStore::new(&["t1", "t2"]));

        let err = client.get("/app/dev").await.unwrap_err();
        assert!(err.to_string().contains("\"t1\" repeated"));
        assert_eq!(client.store().served.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let client = RemoteParameterClient::new(MemoryStore::new()).with_page_size(50);
        assert_eq!(client.page_size(), MAX_PAGE_SIZE);

        let client = RemoteParameterClient::new(MemoryStore::new()).with_page_size(0);
        assert_eq!(client.page_size(), 1);
    }
}
