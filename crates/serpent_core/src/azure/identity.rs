//! Managed-identity credentials and the per-scope token cache.

use crate::cache::TtlCache;
use async_trait::async_trait;
use log::{error, info};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(300);
pub const TOKEN_CACHE_CAPACITY: u64 = 100;

/// Instance metadata service token endpoint.
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const DEFAULT_SCOPE_SUFFIX: &str = "/.default";

pub type IdentityResult<T> = Result<T, IdentityError>;

#[derive(Debug, Clone)]
pub enum IdentityError {
    Http(Arc<reqwest::Error>),
    Status { status: u16, body: String },
    InvalidResponse(String),
    InvalidHeader(String),
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "identity request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "identity endpoint returned {status}: {body}")
            }
            Self::InvalidResponse(message) => write!(f, "invalid identity response: {message}"),
            Self::InvalidHeader(message) => write!(f, "invalid header value: {message}"),
        }
    }
}

impl Error for IdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err.as_ref()),
            Self::Status { .. } | Self::InvalidResponse(_) | Self::InvalidHeader(_) => None,
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(Arc::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    /// Expiry as epoch seconds, when the endpoint reports one.
    pub expires_on: Option<i64>,
}

/// Source of access tokens for a scope.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> IdentityResult<AccessToken>;
}

/// Anything that can hand out a bearer token string for a scope.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self, scope: &str) -> IdentityResult<String>;
}

/// Token credential backed by the instance metadata endpoint.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    endpoint: String,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct ImdsToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
}

impl ManagedIdentityCredential {
    /// Uses the default endpoint; `client_id` selects a user-assigned
    /// identity.
    pub fn new(client_id: Option<String>) -> Self {
        Self::with_endpoint(DEFAULT_IMDS_ENDPOINT, client_id)
    }

    pub fn with_endpoint(endpoint: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, scope: &str) -> IdentityResult<AccessToken> {
        let resource = scope.strip_suffix(DEFAULT_SCOPE_SUFFIX).unwrap_or(scope);
        let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: ImdsToken = response
            .json()
            .await
            .map_err(|err| IdentityError::InvalidResponse(err.to_string()))?;
        Ok(AccessToken {
            token: token.access_token,
            expires_on: token.expires_on.and_then(|raw| raw.parse().ok()),
        })
    }
}

#[async_trait]
impl<T: TokenCredential + ?Sized> TokenCredential for Arc<T> {
    async fn get_token(&self, scope: &str) -> IdentityResult<AccessToken> {
        (**self).get_token(scope).await
    }
}

/// Caches tokens from one credential, keyed by scope.
pub struct CredentialCache<C: TokenCredential> {
    credential: C,
    cache: TtlCache<String, String>,
    identity: Option<String>,
}

impl<C: TokenCredential> CredentialCache<C> {
    /// Wraps `credential` with a 5 minute, 100 entry LRU cache.
    pub fn new(credential: C) -> Self {
        Self::with_cache(credential, TtlCache::new(TOKEN_CACHE_TTL, TOKEN_CACHE_CAPACITY))
    }

    pub fn with_cache(credential: C, cache: TtlCache<String, String>) -> Self {
        Self {
            credential,
            cache,
            identity: None,
        }
    }

    /// Labels log lines with the identity in use.
    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }

    pub fn credential(&self) -> &C {
        &self.credential
    }

    /// Returns a cached token for `scope`, acquiring one on a miss.
    ///
    /// Concurrent misses for one scope share a single acquisition.
    pub async fn get_access_token(&self, scope: &str) -> IdentityResult<String> {
        let identity = self.identity.as_deref().unwrap_or("system");
        self.cache
            .try_get_with(scope.to_string(), async {
                info!(
                    "event=identity_token module=azure status=start scope={} identity={}",
                    scope, identity
                );
                match self.credential.get_token(scope).await {
                    Ok(token) => {
                        info!(
                            "event=identity_token module=azure status=ok scope={} identity={}",
                            scope, identity
                        );
                        Ok(token.token)
                    }
                    Err(err) => {
                        error!(
                            "event=identity_token module=azure status=error scope={} identity={} error={:?}",
                            scope, identity, err
                        );
                        Err(err)
                    }
                }
            })
            .await
            .map_err(Arc::unwrap_or_clone)
    }
}

#[async_trait]
impl<C: TokenCredential> AccessTokenProvider for CredentialCache<C> {
    async fn access_token(&self, scope: &str) -> IdentityResult<String> {
        self.get_access_token(scope).await
    }
}
