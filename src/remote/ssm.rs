//! AWS Systems Manager Parameter Store backend

use std::time::Duration;

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ssm::types::ParameterType;
use aws_sdk_ssm::Client;

use tracing::debug;

use super::error::RemoteError;
use super::store::ParameterStore;
use super::types::{Page, PageEntry};
use crate::config::AwsConfig;

/// Error codes SSM returns for requests it refuses on their own merits
const REJECTED_CODES: &[&str] = &[
    "ValidationException",
    "ParameterPatternMismatchException",
    "HierarchyLevelLimitExceededException",
    "HierarchyTypeMismatchException",
    "ParameterLimitExceeded",
    "ParameterMaxVersionLimitExceeded",
    "UnsupportedParameterType",
    "InvalidKeyId",
    "InvalidAllowedPatternException",
    "TooManyUpdates",
];

const AUTH_CODES: &[&str] = &[
    "AccessDeniedException",
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "ExpiredTokenException",
    "MissingAuthenticationToken",
    "InvalidClientTokenId",
];

#[derive(Debug, Clone)]
pub struct SsmStore {
    client: Client,
    timeout: Duration,
}

impl SsmStore {
    /// Build a client from the default credential chain plus `config` overrides.
    ///
    /// SDK retries are disabled: a retried `put` whose first attempt landed
    /// would come back as `ParameterAlreadyExists`.
    pub async fn from_config(config: &AwsConfig) -> Self {
        let timeout = config.timeout();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_attempt_timeout(timeout)
                    .build(),
            );
        if let Some(region) = &config.region {
            loader = loader.region(aws_sdk_ssm::config::Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        debug!(
            region = ?sdk_config.region(),
            timeout_secs = timeout.as_secs(),
            "Loaded AWS config"
        );
        Self {
            client: Client::new(&sdk_config),
            timeout,
        }
    }

    fn map_error<E, R>(&self, err: SdkError<E, R>, operation: &str, path: &str) -> RemoteError
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        if let SdkError::TimeoutError(_) = err {
            return RemoteError::Timeout {
                operation: format!("{} {}", operation, path),
                after: self.timeout,
            };
        }

        let message = format!("{} {}: {}", operation, path, DisplayErrorContext(&err));
        match err.code() {
            Some("ParameterAlreadyExists") => RemoteError::AlreadyExists(path.to_string()),
            Some("ParameterNotFound") => RemoteError::NotFound(path.to_string()),
            Some(code) if AUTH_CODES.contains(&code) => RemoteError::Unauthorized(message),
            Some(code) if REJECTED_CODES.contains(&code) => RemoteError::Rejected {
                path: path.to_string(),
                reason: err.message().unwrap_or(code).to_string(),
            },
            Some(_) => RemoteError::Unavailable(message),
            None if is_credential_failure(&message) => RemoteError::Unauthorized(message),
            None => RemoteError::Unavailable(message),
        }
    }
}

/// Credential-chain failures surface before any service code exists
fn is_credential_failure(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("credential")
        || lower.contains("accessdenied")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
}

#[async_trait]
impl ParameterStore for SsmStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
        page_size: usize,
    ) -> Result<Page, RemoteError> {
        let out = self
            .client
            .get_parameters_by_path()
            .path(prefix)
            .recursive(false)
            .with_decryption(true)
            .max_results(page_size as i32)
            .set_next_token(token.map(str::to_string))
            .send()
            .await
            .map_err(|e| self.map_error(e, "list", prefix))?;

        let entries = out
            .parameters()
            .iter()
            .filter_map(|p| {
                Some(PageEntry {
                    path: p.name()?.to_string(),
                    value: p.value().unwrap_or_default().to_string(),
                    version: p.version(),
                })
            })
            .collect();

        Ok(Page {
            entries,
            next_token: out.next_token().map(str::to_string),
        })
    }

    async fn put(&self, path: &str, value: &str, overwrite: bool) -> Result<i64, RemoteError> {
        let out = self
            .client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(overwrite)
            .send()
            .await
            .map_err(|e| self.map_error(e, "put", path))?;

        Ok(out.version())
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        self.client
            .delete_parameter()
            .name(path)
            .send()
            .await
            .map_err(|e| self.map_error(e, "delete", path))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "ssm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failure_detection() {
        assert!(is_credential_failure(
            "dispatch failure: no credentials provider could load Credentials"
        ));
        assert!(is_credential_failure("403 Forbidden"));
        assert!(!is_credential_failure("connection refused"));
    }

    fn local_config() -> AwsConfig {
        AwsConfig {
            region: Some("eu-west-1".into()),
            endpoint_url: Some("http://127.0.0.1:4566".into()),
            timeout_secs: 3,
            ..AwsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_client_makes_a_single_attempt() {
        let store = SsmStore::from_config(&local_config()).await;

        let retry = store.client.config().retry_config().unwrap();
        assert_eq!(retry.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_client_uses_configured_timeout() {
        let store = SsmStore::from_config(&local_config()).await;

        assert_eq!(store.timeout, Duration::from_secs(3));
        let timeouts = store.client.config().timeout_config().unwrap();
        assert_eq!(
            timeouts.operation_attempt_timeout(),
            Some(Duration::from_secs(3))
        );
        assert_eq!(store.name(), "ssm");
    }
}
