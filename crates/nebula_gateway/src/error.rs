use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use nebula_client::ClientError;
use serde::Serialize;
use session_registry::RegistryError;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing \"{0}\" field in request body")]
    MissingField(&'static str),

    #[error("invalid or missing API key")]
    InvalidApiKey,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::MissingField(_) => "invalid_request",
            AppError::InvalidApiKey => "unauthorized",
            AppError::Registry(RegistryError::MissingCredential) => "missing_credential",
            AppError::Client(err) => err.kind(),
            AppError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
struct JsonError {
    message: String,
    r#type: String,
}

#[derive(Serialize)]
struct JsonErrorWrapper {
    error: JsonError,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::Registry(RegistryError::MissingCredential) => StatusCode::BAD_REQUEST,
            AppError::Client(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = JsonErrorWrapper {
            error: JsonError {
                message: self.to_string(),
                r#type: self.kind().to_string(),
            },
        };
        HttpResponse::build(self.status_code()).json(error_response)
    }
}
