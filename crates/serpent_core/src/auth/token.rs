//! JWKS-backed RS256 token verifier.

use super::error::{
    AuthError, AuthResult, MSG_CLAIMS_FAILED, MSG_INVALID_HEADERS, MSG_KEY_NOT_FOUND,
    MSG_TOKEN_EXPIRED, MSG_TOKEN_INVALID, MSG_TOKEN_MISSING,
};
use crate::cache::TtlCache;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);
pub const JWKS_CACHE_CAPACITY: u64 = 100;

/// One JSON Web Key as published by the key-set endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl Jwk {
    fn decoding_key(&self) -> AuthResult<DecodingKey> {
        let invalid = || AuthError::forbidden(MSG_TOKEN_INVALID);
        if self.kty != "RSA" {
            return Err(invalid());
        }
        let (Some(n), Some(e)) = (self.n.as_deref(), self.e.as_deref()) else {
            return Err(invalid());
        };
        DecodingKey::from_rsa_components(n, e).map_err(|_| invalid())
    }
}

/// Key-id to key map for one key-set URL.
pub type JwkSet = HashMap<String, Jwk>;

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

/// Verifies bearer tokens against remote key sets.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    client: reqwest::Client,
    cache: TtlCache<String, Arc<JwkSet>>,
}

impl Default for TokenVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenVerifier {
    /// Creates a verifier with a 10 minute, 100 entry key-set cache.
    pub fn new() -> Self {
        Self::with_cache(
            reqwest::Client::new(),
            TtlCache::new(JWKS_CACHE_TTL, JWKS_CACHE_CAPACITY),
        )
    }

    pub fn with_cache(client: reqwest::Client, cache: TtlCache<String, Arc<JwkSet>>) -> Self {
        Self { client, cache }
    }

    /// Returns the key set published at `jwks_url`, cached per URL.
    ///
    /// # Errors
    /// - `AuthError::Service` on network failure, non-success status or an
    ///   unparseable body.
    ///
    /// Concurrent misses for one URL share a single fetch.
    pub async fn get_jwks_keys(&self, jwks_url: &str) -> AuthResult<Arc<JwkSet>> {
        self.cache
            .try_get_with(jwks_url.to_string(), async {
                info!("event=jwks_fetch module=auth status=start url={}", jwks_url);
                let keys = self.fetch_jwks(jwks_url).await.map_err(|err| {
                    warn!(
                        "event=jwks_fetch module=auth status=error url={} error={}",
                        jwks_url, err
                    );
                    AuthError::jwks_fetch_failed()
                })?;
                info!(
                    "event=jwks_fetch module=auth status=ok url={} keys={}",
                    jwks_url,
                    keys.len()
                );
                Ok::<_, AuthError>(Arc::new(keys))
            })
            .await
            .map_err(Arc::unwrap_or_clone)
    }

    async fn fetch_jwks(&self, jwks_url: &str) -> Result<JwkSet, reqwest::Error> {
        let document: JwksDocument = self
            .client
            .get(jwks_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(document
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect())
    }

    /// Finds the key named by the token's unverified `kid` header.
    pub async fn get_public_key(&self, token: &str, jwks_url: &str) -> AuthResult<Jwk> {
        let header = decode_header(token).map_err(|err| {
            warn!("event=token_header module=auth status=error error={}", err);
            AuthError::forbidden(MSG_INVALID_HEADERS)
        })?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::forbidden(MSG_KEY_NOT_FOUND))?;

        let keys = self.get_jwks_keys(jwks_url).await?;
        keys.get(&kid)
            .cloned()
            .ok_or_else(|| AuthError::forbidden(MSG_KEY_NOT_FOUND))
    }

    /// Verifies `token` and returns its claim set.
    ///
    /// # Errors
    /// - `Forbidden("Access Token is missing")` for an empty token.
    /// - Key lookup errors from [`Self::get_public_key`], unchanged.
    /// - `Forbidden` with the claims, expiry or generic invalid message when
    ///   decoding fails.
    pub async fn verify_token(
        &self,
        token: &str,
        jwks_url: &str,
        audience: &str,
    ) -> AuthResult<Map<String, Value>> {
        if token.is_empty() {
            return Err(AuthError::forbidden(MSG_TOKEN_MISSING));
        }

        let jwk = self.get_public_key(token, jwks_url).await?;
        let key = jwk.decoding_key()?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.leeway = 0;
        // `exp` is checked only when present.
        validation.required_spec_claims.clear();

        match decode::<Map<String, Value>>(token, &key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => {
                let message = match err.kind() {
                    ErrorKind::ExpiredSignature => MSG_TOKEN_EXPIRED,
                    ErrorKind::InvalidAudience
                    | ErrorKind::InvalidIssuer
                    | ErrorKind::InvalidSubject
                    | ErrorKind::ImmatureSignature
                    | ErrorKind::MissingRequiredClaim(_) => MSG_CLAIMS_FAILED,
                    _ => MSG_TOKEN_INVALID,
                };
                warn!(
                    "event=token_verify module=auth status=error kid={} error={}",
                    jwk.kid, err
                );
                Err(AuthError::forbidden(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Jwk;
    use crate::auth::error::MSG_TOKEN_INVALID;

    fn jwk(kty: &str) -> Jwk {
        Jwk {
            kid: "k1".to_string(),
            kty: kty.to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            n: Some("AQAB".to_string()),
            e: Some("AQAB".to_string()),
        }
    }

    #[test]
    fn non_rsa_keys_are_rejected() {
        let err = jwk("EC").decoding_key().err().unwrap();
        assert_eq!(err.detail(), MSG_TOKEN_INVALID);
    }

    #[test]
    fn rsa_key_without_modulus_is_rejected() {
        let mut key = jwk("RSA");
        key.n = None;
        assert!(key.decoding_key().is_err());
    }

    #[test]
    fn jwk_deserializes_use_field() {
        let key: Jwk = serde_json::from_str(
            r#"{"kid":"a","kty":"RSA","alg":"RS256","use":"sig","n":"x","e":"AQAB"}"#,
        )
        .unwrap();
        assert_eq!(key.key_use.as_deref(), Some("sig"));
    }
}
