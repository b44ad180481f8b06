use atelier_core::AtelierError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// JSON API error type for REST endpoints.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("api error: {:#}", err);
        Self::internal(format!("{:#}", err))
    }
}

impl From<AtelierError> for ApiError {
    fn from(err: AtelierError) -> Self {
        match &err {
            AtelierError::NotFound(_) => Self::not_found(err.to_string()),
            AtelierError::InvalidInput(_) | AtelierError::InvalidState(_) => {
                Self::bad_request(err.to_string())
            }
            AtelierError::Config(_) => Self::unavailable(err.to_string()),
            // Upstream failures are the provider's fault, not ours.
            AtelierError::Provider(_)
            | AtelierError::ProviderTimeout(_)
            | AtelierError::MissingCode(_)
            | AtelierError::Http(_) => {
                tracing::warn!("provider error: {}", err);
                Self {
                    status: StatusCode::BAD_GATEWAY,
                    message: err.to_string(),
                }
            }
            _ => {
                tracing::error!("api error: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}
