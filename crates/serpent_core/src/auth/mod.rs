//! OAuth 2.0 bearer-token verification.
//!
//! # Responsibility
//! - Fetch and cache remote JSON Web Key Sets.
//! - Verify RS256 access tokens for signature, audience and expiry.
//! - Extract claims from verified payloads by path.
//!
//! # Invariants
//! - Expired tokens are rejected; no refresh is attempted.
//! - Every failure maps to a fixed client-facing message.

pub mod claims;
pub mod error;
pub mod token;

pub use claims::get_claim_from_payload;
pub use error::{AuthError, AuthResult};
pub use token::{Jwk, JwkSet, TokenVerifier, JWKS_CACHE_CAPACITY, JWKS_CACHE_TTL};
