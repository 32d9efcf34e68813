//! Authorization-aware core: every operation takes the caller's [`Principal`],
//! consults the access policy and the status state machine, and reaches
//! storage only through the repository traits.
//!
//! [`Principal`]: crate::auth::principal::Principal

pub mod assignments;
pub mod policy;
pub mod status;
pub mod tickets;
pub mod trips;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::repository::RepoError;

pub use status::TransitionError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),
    #[error("missing organization id")]
    MissingOrganization,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    /// Maps a repository failure, naming the entity the lookup was for.
    pub fn from_repo(entity: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ServiceError::NotFound(entity),
            RepoError::DanglingReference => {
                ServiceError::InvalidInput(format!("{entity} references an unknown record"))
            }
            RepoError::Backend(message) => ServiceError::Persistence(message),
        }
    }
}

pub(crate) fn parse_uuid(raw: &str, field: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::invalid(format!("invalid {field}")))
}

pub(crate) fn parse_optional_uuid(raw: Option<&str>, field: &str) -> ServiceResult<Option<Uuid>> {
    raw.map(|value| parse_uuid(value, field)).transpose()
}

pub(crate) fn parse_timestamp(raw: &str, field: &str) -> ServiceResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| ServiceError::invalid(format!("invalid {field}")))
}
