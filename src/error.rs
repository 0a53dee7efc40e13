use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColetaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ColetaResult<T> = Result<T, ColetaError>;

impl IntoResponse for ColetaError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ColetaError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno no banco de dados da coleta.".to_string(),
                )
            }
            ColetaError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ColetaError::Config(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ColetaError::Connectivity(msg) => {
                tracing::warn!("External database unreachable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ColetaError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro interno no servidor.".to_string(),
                )
            }
            ColetaError::Io(e) => {
                tracing::error!("IO error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Erro de sistema de arquivos no servidor.".to_string(),
                )
            }
            ColetaError::Json(e) => {
                tracing::warn!("JSON error: {:?}", e);
                (StatusCode::BAD_REQUEST, "Dados inválidos.".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
