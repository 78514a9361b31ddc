use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tailr_store::revision::RevisionError;
use tailr_store::StoreError;

/// Every failure the API can report, one variant per HTTP status.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("internal server error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                kind = "request_failed",
                error = %self,
                source = ?std::error::Error::source(&self),
                "internal error"
            );
        } else {
            tracing::debug!(
                kind = "request_rejected",
                status = status.as_u16(),
                error = %self,
                "request rejected"
            );
        }
        (status, self.to_string()).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Hash collisions and unclassified database failures are all 500s.
        Self::internal(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::internal(err)
    }
}

impl From<RevisionError> for ApiError {
    fn from(err: RevisionError) -> Self {
        match err {
            RevisionError::NotFound | RevisionError::Gone { .. } => Self::NotFound,
            RevisionError::NothingToDelete
            | RevisionError::NonMonotonic { .. }
            | RevisionError::Conflict => Self::BadRequest(err.to_string()),
            RevisionError::Store(err) => err.into(),
        }
    }
}

impl From<tailr_rdf::ParseError> for ApiError {
    fn from(err: tailr_rdf::ParseError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
