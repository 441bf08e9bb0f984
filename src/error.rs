use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Rest {
        code: &'static str,
        message: String,
        status: StatusCode,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal Server Error")]
    Anyhow(#[from] anyhow::Error),
}

impl ApiError {
    pub fn rest(code: &'static str, message: impl Into<String>, status: StatusCode) -> Self {
        ApiError::Rest {
            code,
            message: message.into(),
            status,
        }
    }

    pub fn post_not_found() -> Self {
        Self::rest(
            "rest_post_invalid_id",
            "Invalid post ID.",
            StatusCode::NOT_FOUND,
        )
    }

    /// Capability denial: 403 for an authenticated principal; an
    /// anonymous one gets 401 under the `rest_authorization_required`
    /// code, whichever check tripped.
    pub fn denied(code: &'static str, message: impl Into<String>, authenticated: bool) -> Self {
        if authenticated {
            Self::rest(code, message, StatusCode::FORBIDDEN)
        } else {
            Self::rest(
                "rest_authorization_required",
                message,
                StatusCode::UNAUTHORIZED,
            )
        }
    }

    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::rest("rest_invalid_param", message, StatusCode::BAD_REQUEST)
    }

    pub fn invalid_field(message: impl Into<String>) -> Self {
        Self::rest("rest_invalid_field", message, StatusCode::BAD_REQUEST)
    }

    pub fn db_update() -> Self {
        Self::rest(
            "db_update_error",
            "Could not update post in the database.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Rest {
                code,
                message,
                status,
            } => (status, code, message),
            ApiError::Database(ref e) => {
                tracing::error!(error = ?e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    "Something went wrong.".to_string(),
                )
            }
            ApiError::Anyhow(ref e) => {
                tracing::error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_server_error",
                    "Something went wrong.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "code": code,
            "message": message,
            "data": { "status": status.as_u16() },
        }));

        (status, body).into_response()
    }
}
