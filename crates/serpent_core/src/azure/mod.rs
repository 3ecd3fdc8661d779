//! Azure managed-identity access.
//!
//! # Responsibility
//! - Acquire access tokens from the instance metadata endpoint.
//! - Cache tokens per scope for a bounded window.
//! - Build HTTP clients that carry a bearer token.
//!
//! # Invariants
//! - Credential failures are logged and returned unchanged.

pub mod identity;
pub mod request;

pub use identity::{
    AccessToken, AccessTokenProvider, CredentialCache, IdentityError, IdentityResult,
    ManagedIdentityCredential, TokenCredential, TOKEN_CACHE_CAPACITY, TOKEN_CACHE_TTL,
};
pub use request::AuthorizedClient;
