//! Cosmos DB item access over the REST API.
//!
//! # Responsibility
//! - Authorize requests with a shared key or a managed-identity token.
//! - Create, upsert, read, delete and query items in one database.
//!
//! # Invariants
//! - Every request carries `x-ms-version`, `x-ms-date` and `authorization`.
//! - Non-success responses surface as `CosmosError::Status`.

mod auth;
pub mod client;

pub use client::{CosmosClientContext, QueryParameter};

use crate::azure::IdentityError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const COSMOS_API_VERSION: &str = "2018-12-31";

/// Connection settings for one Cosmos DB account and database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosmosSettings {
    pub account_uri: String,
    pub account_key: String,
    pub database_name: String,
    pub container_name: String,
    pub use_rbac: bool,
}

pub type CosmosResult<T> = Result<T, CosmosError>;

#[derive(Debug)]
pub enum CosmosError {
    InvalidArgument(String),
    InvalidAccount(String),
    Http(reqwest::Error),
    Identity(IdentityError),
    Status { status: u16, body: String },
}

impl Display for CosmosError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "{message}"),
            Self::InvalidAccount(message) => write!(f, "invalid cosmos account: {message}"),
            Self::Http(err) => write!(f, "cosmos request failed: {err}"),
            Self::Identity(err) => write!(f, "{err}"),
            Self::Status { status, body } => write!(f, "cosmos returned {status}: {body}"),
        }
    }
}

impl Error for CosmosError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Identity(err) => Some(err),
            Self::InvalidArgument(_) | Self::InvalidAccount(_) | Self::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for CosmosError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<IdentityError> for CosmosError {
    fn from(value: IdentityError) -> Self {
        Self::Identity(value)
    }
}
