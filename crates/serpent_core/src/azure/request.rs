//! HTTP client carrying a managed-identity bearer token.

use super::identity::{AccessTokenProvider, IdentityError, IdentityResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::collections::HashMap;

/// `reqwest` client whose default headers authorize it for one scope.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    scope: String,
    bypass_token: bool,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl AuthorizedClient {
    /// Builds the client.
    ///
    /// A `Content-Type` entry in `custom_headers` switches on
    /// `Content-Type: application/json`. Unless `bypass_token`, the token for
    /// `scope` is fetched from `tokens` and sent as `Authorization: Bearer`.
    pub async fn new(
        scope: impl Into<String>,
        bypass_token: bool,
        custom_headers: &HashMap<String, String>,
        tokens: &dyn AccessTokenProvider,
    ) -> IdentityResult<Self> {
        let scope = scope.into();
        let mut headers = HeaderMap::new();

        let wants_json = custom_headers
            .iter()
            .any(|(name, value)| name.eq_ignore_ascii_case("content-type") && !value.is_empty());
        if wants_json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if !bypass_token {
            let token = tokens.access_token(&scope).await?;
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| IdentityError::InvalidHeader(err.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers.clone())
            .build()?;
        Ok(Self {
            scope,
            bypass_token,
            headers,
            client,
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn bypass_token(&self) -> bool {
        self.bypass_token
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::AuthorizedClient;
    use crate::azure::identity::{AccessTokenProvider, IdentityResult};
    use async_trait::async_trait;
    use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
    use std::collections::HashMap;

    struct FixedToken;

    #[async_trait]
    impl AccessTokenProvider for FixedToken {
        async fn access_token(&self, scope: &str) -> IdentityResult<String> {
            Ok(format!("token-for-{}", scope.len()))
        }
    }

    #[tokio::test]
    async fn bearer_and_content_type_are_set() {
        let custom = HashMap::from([("Content-Type".to_string(), "yes".to_string())]);
        let client = AuthorizedClient::new("abc", false, &custom, &FixedToken)
            .await
            .unwrap();
        assert_eq!(client.headers()[AUTHORIZATION], "Bearer token-for-3");
        assert_eq!(client.headers()[CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn bypass_skips_token() {
        let client = AuthorizedClient::new("abc", true, &HashMap::new(), &FixedToken)
            .await
            .unwrap();
        assert!(client.headers().get(AUTHORIZATION).is_none());
        assert!(client.headers().get(CONTENT_TYPE).is_none());
    }
}
