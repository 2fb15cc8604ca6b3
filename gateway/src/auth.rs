//! Caller authentication.
//!
//! Token validation is an external capability: the gateway neither issues
//! nor stores credentials. The static validator serves deployments where
//! tokens are provisioned through configuration; the remote validator
//! defers to an HTTP introspection endpoint. Both sit behind a TTL cache so
//! hot tokens do not hammer the provider.

use crate::config::{AuthMode, StaticToken};
use crate::metrics_defs::{TOKEN_CACHE_HIT, TOKEN_CACHE_MISS};
use async_trait::async_trait;
use http::StatusCode;
use moka::sync::Cache;
use serde::Deserialize;
use shared::counter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

const CACHE_SIZE: u64 = 1000;
const ACCEPT_TTL_SECS: u64 = 30;
// Rejections are cached briefly so a misbehaving client retrying a bad
// token does not turn into provider load.
const REJECT_TTL_SECS: u64 = 5;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("token rejected")]
    InvalidToken,

    #[error("identity provider error: {0}")]
    Upstream(String),
}

/// The authenticated caller, as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub subject: String,
    /// Tables the identity may write to; `None` grants every table.
    pub tables: Option<HashSet<String>>,
}

impl CallerIdentity {
    pub fn may_write(&self, table: &str) -> bool {
        match &self.tables {
            Some(tables) => tables.contains(table),
            None => true,
        }
    }
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<CallerIdentity, AuthError>;
}

/// Build the validator stack for the configured auth mode.
///
/// Returns `None` when authorization is disabled.
pub fn build_validator(mode: &AuthMode) -> Option<Arc<dyn TokenValidator>> {
    let inner: Arc<dyn TokenValidator> = match mode {
        AuthMode::Disabled => return None,
        AuthMode::Static { tokens } => Arc::new(StaticTokenValidator::new(tokens)),
        AuthMode::Remote { url, timeout_secs } => {
            Arc::new(RemoteTokenValidator::new(url.clone(), *timeout_secs))
        }
    };
    Some(Arc::new(TokenCache::new(inner)))
}

/// Validator backed by tokens provisioned in the configuration file.
pub struct StaticTokenValidator {
    tokens: HashMap<String, CallerIdentity>,
}

impl StaticTokenValidator {
    pub fn new(tokens: &[StaticToken]) -> Self {
        StaticTokenValidator {
            tokens: tokens
                .iter()
                .map(|entry| {
                    let identity = CallerIdentity {
                        subject: entry.subject.clone(),
                        tables: entry
                            .tables
                            .as_ref()
                            .map(|tables| tables.iter().cloned().collect()),
                    };
                    (entry.token.clone(), identity)
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TokenValidator for StaticTokenValidator {
    async fn validate(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        self.tokens.get(token).cloned().ok_or(AuthError::InvalidToken)
    }
}

#[derive(Deserialize)]
struct IntrospectionResponse {
    subject: String,
    #[serde(default)]
    tables: Option<Vec<String>>,
}

/// Validator that defers to a remote token-introspection endpoint.
pub struct RemoteTokenValidator {
    client: reqwest::Client,
    url: url::Url,
    timeout: Duration,
}

impl RemoteTokenValidator {
    pub fn new(url: url::Url, timeout_secs: u64) -> Self {
        RemoteTokenValidator {
            client: reqwest::Client::new(),
            url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl TokenValidator for RemoteTokenValidator {
    async fn validate(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let response = self
            .client
            .post(self.url.clone())
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| AuthError::Upstream(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body: IntrospectionResponse = response
                    .json()
                    .await
                    .map_err(|err| AuthError::Upstream(err.to_string()))?;
                Ok(CallerIdentity {
                    subject: body.subject,
                    tables: body.tables.map(|tables| tables.into_iter().collect()),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidToken),
            status => Err(AuthError::Upstream(format!(
                "unexpected status from identity provider: {status}"
            ))),
        }
    }
}

/// TTL cache over a validator, remembering accepts and rejects separately.
pub struct TokenCache {
    inner: Arc<dyn TokenValidator>,
    accepted: Cache<String, CallerIdentity>,
    rejected: Cache<String, ()>,
}

impl TokenCache {
    pub fn new(inner: Arc<dyn TokenValidator>) -> Self {
        TokenCache {
            inner,
            accepted: Cache::builder()
                .max_capacity(CACHE_SIZE)
                .time_to_live(Duration::from_secs(ACCEPT_TTL_SECS))
                .build(),
            rejected: Cache::builder()
                .max_capacity(CACHE_SIZE)
                .time_to_live(Duration::from_secs(REJECT_TTL_SECS))
                .build(),
        }
    }
}

#[async_trait]
impl TokenValidator for TokenCache {
    async fn validate(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        if let Some(identity) = self.accepted.get(token) {
            counter!(TOKEN_CACHE_HIT).increment(1);
            return Ok(identity);
        }
        if self.rejected.contains_key(token) {
            counter!(TOKEN_CACHE_HIT).increment(1);
            return Err(AuthError::InvalidToken);
        }
        counter!(TOKEN_CACHE_MISS).increment(1);

        match self.inner.validate(token).await {
            Ok(identity) => {
                self.accepted.insert(token.to_string(), identity.clone());
                Ok(identity)
            }
            Err(AuthError::InvalidToken) => {
                self.rejected.insert(token.to_string(), ());
                Err(AuthError::InvalidToken)
            }
            // Provider trouble is not a verdict on the token; never cache it.
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn static_tokens() -> Vec<StaticToken> {
        vec![
            StaticToken {
                token: "alice-token".to_string(),
                subject: "alice".to_string(),
                tables: Some(vec!["events".to_string()]),
            },
            StaticToken {
                token: "admin-token".to_string(),
                subject: "admin".to_string(),
                tables: None,
            },
        ]
    }

    #[tokio::test]
    async fn static_validator_maps_tokens_to_identities() {
        let validator = StaticTokenValidator::new(&static_tokens());

        let alice = validator.validate("alice-token").await.unwrap();
        assert_eq!(alice.subject, "alice");
        assert!(alice.may_write("events"));
        assert!(!alice.may_write("orders"));

        let admin = validator.validate("admin-token").await.unwrap();
        assert!(admin.may_write("anything"));

        assert!(matches!(
            validator.validate("wrong").await.unwrap_err(),
            AuthError::InvalidToken
        ));
    }

    struct CountingValidator {
        calls: AtomicUsize,
        accept: bool,
    }

    #[async_trait]
    impl TokenValidator for CountingValidator {
        async fn validate(&self, _token: &str) -> Result<CallerIdentity, AuthError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.accept {
                Ok(CallerIdentity {
                    subject: "s".to_string(),
                    tables: None,
                })
            } else {
                Err(AuthError::InvalidToken)
            }
        }
    }

    #[tokio::test]
    async fn cache_short_circuits_repeat_accepts() {
        let inner = Arc::new(CountingValidator {
            calls: AtomicUsize::new(0),
            accept: true,
        });
        let cache = TokenCache::new(inner.clone());

        for _ in 0..3 {
            cache.validate("t").await.unwrap();
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_short_circuits_repeat_rejects() {
        let inner = Arc::new(CountingValidator {
            calls: AtomicUsize::new(0),
            accept: false,
        });
        let cache = TokenCache::new(inner.clone());

        for _ in 0..3 {
            let _ = cache.validate("t").await;
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disabled_mode_builds_no_validator() {
        assert!(build_validator(&AuthMode::Disabled).is_none());
        assert!(
            build_validator(&AuthMode::Static {
                tokens: static_tokens()
            })
            .is_some()
        );
    }
}
