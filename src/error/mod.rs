use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    tokio::time::error::Elapsed,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::{logging::FailureKind, model::mongodb::is_timeout_error};

pub type Result<T> = std::result::Result<T, Error>;

/// Message returned in place of storage error detail.
const STORAGE_MESSAGE: &str = "The election store is temporarily unavailable, please retry";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Election {0} is not accepting votes")]
    ElectionNotActive(String),
    #[error("Voter has already voted in election {0}")]
    AlreadyVoted(String),
    #[error("Candidate {0} is not standing in this election")]
    InvalidCandidate(String),
    #[error("State conflict: {0}")]
    StateConflict(String),
    #[error("Storage timed out: {0}")]
    StorageTimeout(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error(transparent)]
    Bson(#[from] mongodb::bson::ser::Error),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::InvalidCandidate(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::ElectionNotActive(_) | Self::AlreadyVoted(_) | Self::StateConflict(_) => {
                Status::Conflict
            }
            Self::StorageTimeout(_) => Status::GatewayTimeout,
            Self::StorageUnavailable(_) => Status::ServiceUnavailable,
            Self::Bson(_) => Status::InternalServerError,
        }
    }

    /// Short machine-readable name of this kind of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::ElectionNotActive(_) => "election_not_active",
            Self::AlreadyVoted(_) => "already_voted",
            Self::InvalidCandidate(_) => "invalid_candidate",
            Self::StateConflict(_) => "state_conflict",
            Self::StorageTimeout(_) => "storage_timeout",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Bson(_) => "internal",
        }
    }

    /// Is this a server-side failure rather than a problem with the request?
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::StorageTimeout(_) | Self::StorageUnavailable(_) | Self::Bson(_)
        )
    }
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        if is_timeout_error(&err) {
            Self::StorageTimeout(err.to_string())
        } else {
            Self::StorageUnavailable(err.to_string())
        }
    }
}

impl From<Elapsed> for Error {
    fn from(_: Elapsed) -> Self {
        Self::StorageTimeout("No reply from the database within the time limit".to_string())
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        req.local_cache(|| FailureKind(Some(self.kind())));
        let message = if self.is_server_error() {
            error!("{self}");
            STORAGE_MESSAGE.to_string()
        } else {
            warn!("{self}");
            self.to_string()
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        Custom(status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Error as IoError, ErrorKind as IoErrorKind};

    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(Error::Validation(String::new()).status(), Status::BadRequest);
        assert_eq!(Error::Unauthorized(String::new()).status(), Status::Unauthorized);
        assert_eq!(Error::Forbidden(String::new()).status(), Status::Forbidden);
        assert_eq!(Error::not_found("x").status(), Status::NotFound);
        assert_eq!(Error::AlreadyVoted(String::new()).status(), Status::Conflict);
        assert_eq!(Error::InvalidCandidate(String::new()).status(), Status::BadRequest);
        assert_eq!(Error::StorageTimeout(String::new()).status(), Status::GatewayTimeout);
    }

    #[test]
    fn driver_errors_become_storage_errors() {
        let timeout: Error = DbError::from(IoError::from(IoErrorKind::TimedOut)).into();
        assert!(matches!(timeout, Error::StorageTimeout(_)));

        let refused = IoError::from(IoErrorKind::ConnectionRefused);
        let unavailable: Error = DbError::from(refused).into();
        assert!(matches!(unavailable, Error::StorageUnavailable(_)));
    }

    #[rocket::async_test]
    async fn elapsed_deadlines_become_timeouts() {
        let elapsed = rocket::tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        let err: Error = elapsed.into();
        assert!(matches!(err, Error::StorageTimeout(_)));
        assert_eq!(err.status(), Status::GatewayTimeout);
    }
}
