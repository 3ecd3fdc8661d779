//! Cosmos DB authorization tokens.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{CosmosError, CosmosResult};

type HmacSha256 = Hmac<Sha256>;

/// RFC 1123 date as expected in `x-ms-date`.
pub(crate) fn request_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Shared-key signature for one request, url-encoded for the header.
pub(crate) fn master_key_token(
    key: &[u8],
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> CosmosResult<String> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|err| CosmosError::InvalidAccount(format!("account key: {err}")))?;
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(urlencoding::encode(&format!("type=master&ver=1.0&sig={signature}")).into_owned())
}

/// Entra ID token header value.
pub(crate) fn aad_token(access_token: &str) -> String {
    urlencoding::encode(&format!("type=aad&ver=1.0&sig={access_token}")).into_owned()
}
