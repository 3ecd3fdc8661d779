use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AuthResult<T> = Result<T, AuthError>;

pub const MSG_JWKS_FETCH_FAILED: &str = "Failed to fetch JWKS keys.";
pub const MSG_TOKEN_MISSING: &str = "Access Token is missing";
pub const MSG_INVALID_HEADERS: &str = "Invalid token headers.";
pub const MSG_KEY_NOT_FOUND: &str = "Public key not found for the given token.";
pub const MSG_CLAIMS_FAILED: &str = "Claims verification failed.";
pub const MSG_TOKEN_EXPIRED: &str = "Token has expired";
pub const MSG_TOKEN_INVALID: &str = "Token is invalid.";

/// Token verification failure, shaped like an HTTP error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Upstream key-set fetch failed (500).
    Service(String),
    /// Caller is not authorized (403).
    Forbidden(String),
}

impl AuthError {
    pub(crate) fn jwks_fetch_failed() -> Self {
        Self::Service(MSG_JWKS_FETCH_FAILED.to_string())
    }

    pub(crate) fn forbidden(message: &str) -> Self {
        Self::Forbidden(message.to_string())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Service(_) => 500,
            Self::Forbidden(_) => 403,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Service(message) | Self::Forbidden(message) => message,
        }
    }
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.status_code(), self.detail())
    }
}

impl Error for AuthError {}
