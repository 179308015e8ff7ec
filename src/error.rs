use std::borrow::Cow;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use error_stack::Report;
use thiserror::Error;

use crate::auth::AuthError;

/// The top-level error type from the platform
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to initialize database
    #[error("Failed to initialize database")]
    DbInit,
    /// Database error not otherwise handled
    #[error("Database error")]
    Db,
    /// Configuration error
    #[error("Configuration error")]
    Config,
    /// Failed to start the HTTP server
    #[error("Failed to start server")]
    ServerStart,
    /// Failure while shutting down
    #[error("Encountered error while shutting down")]
    Shutdown,
    /// The requested item was not found
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Invalid filter")]
    Filter,
    /// A payload failed validation
    #[error("{0}")]
    Validation(Cow<'static, str>),
    /// A payload referenced a row that does not exist
    #[error("Referenced {0} does not exist")]
    InvalidReference(&'static str),
    /// A wrapper around a Report<Error> to let it be returned from an Axum handler, since we can't
    /// implement IntoResponse on Report
    #[error("{0}")]
    WrapReport(Report<Error>),
    #[error(transparent)]
    AuthError(#[from] AuthError),
    #[error("Auth subsystem error")]
    AuthSubsystem,
    #[error("Login failure")]
    Login,
}

impl From<Report<Error>> for Error {
    fn from(value: Report<Error>) -> Self {
        Error::WrapReport(value)
    }
}

impl Error {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Error::WrapReport(e) => e.current_context().error_kind(),
            Error::DbInit => ErrorKind::DatabaseInit.as_str(),
            Error::Db => ErrorKind::Database.as_str(),
            Error::Config => ErrorKind::Config.as_str(),
            Error::ServerStart => ErrorKind::ServerStart.as_str(),
            Error::Shutdown => ErrorKind::Shutdown.as_str(),
            Error::NotFound(_) => ErrorKind::NotFound.as_str(),
            Error::Filter => ErrorKind::Filter.as_str(),
            Error::Validation(_) => ErrorKind::Validation.as_str(),
            Error::InvalidReference(_) => ErrorKind::Validation.as_str(),
            Error::AuthError(e) => e.error_kind(),
            Error::AuthSubsystem => ErrorKind::AuthSubsystem.as_str(),
            Error::Login => ErrorKind::Unauthenticated.as_str(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::WrapReport(e) => e.current_context().status_code(),
            Error::DbInit => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Db => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Config => StatusCode::INTERNAL_SERVER_ERROR,
            Error::ServerStart => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Shutdown => StatusCode::INTERNAL_SERVER_ERROR,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Filter => StatusCode::BAD_REQUEST,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::InvalidReference(_) => StatusCode::BAD_REQUEST,
            Error::AuthError(e) => e.status_code(),
            Error::AuthSubsystem => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Login => StatusCode::UNAUTHORIZED,
        }
    }

    /// Render the error as the standard JSON error body.
    pub fn to_response(&self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "error": {
                "kind": self.error_kind(),
                "message": self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "returning internal error");
        }
        self.to_response()
    }
}

pub enum ErrorKind {
    Database,
    DatabaseInit,
    Config,
    ServerStart,
    Shutdown,
    NotFound,
    Filter,
    Validation,
    AuthSubsystem,
    Unauthenticated,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::DatabaseInit => "database_init",
            ErrorKind::Config => "config",
            ErrorKind::ServerStart => "server_start",
            ErrorKind::Shutdown => "shutdown",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Filter => "invalid_filter",
            ErrorKind::Validation => "validation",
            ErrorKind::AuthSubsystem => "auth",
            ErrorKind::Unauthenticated => "unauthenticated",
        }
    }
}

/// The name of the violated constraint, when the error is a constraint violation.
/// Queries use this to map foreign key and uniqueness failures onto 400-class errors.
pub fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    err.as_database_error().and_then(|e| e.constraint())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Error::NotFound("Airport").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::Filter.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Validation("seat out of range".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidReference("airplane").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(Error::Db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Error::Login.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn wrapped_report_keeps_context() {
        let report = Report::new(Error::NotFound("Flight"));
        let wrapped = Error::from(report);
        assert_eq!(wrapped.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(wrapped.error_kind(), "not_found");
    }
}
