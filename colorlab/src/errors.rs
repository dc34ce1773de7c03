use crate::api::models::envelope::ApiMessage;
use crate::db::errors::DbError;
use crate::types::UserId;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Outcome of a failed service operation.
///
/// Every variant maps to an HTTP status, a localized user message and an optional technical
/// detail. Handlers return `Result<T, Error>` and the [`IntoResponse`] impl renders the failure
/// as the standard [`ApiMessage`] envelope.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Malformed input or business rule violation
    #[error("{message}")]
    Validation { message: String },

    /// Unknown email or wrong password. Deliberately does not say which.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Authentication required but not provided, malformed or expired
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// Authenticated user may not perform the operation
    #[error("Forbidden: {action}")]
    Forbidden { action: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Conflict error, e.g. a duplicate email on registration
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Refresh token absent from the store or past its expiry
    #[error("Invalid refresh token (expired: {expired})")]
    InvalidRefreshToken { expired: bool },

    /// Refresh token subject differs from the user id in the request
    #[error("Refresh token does not belong to user {user_id}")]
    TokenMismatch { user_id: UserId },

    /// Logout for a refresh token that is not (or no longer) stored
    #[error("Refresh token not found")]
    TokenNotFound,

    /// Document selector other than `pdf` or `excel`
    #[error("Unsupported document type: {requested}")]
    UnsupportedDocumentType { requested: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation { message: message.into() }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::InvalidRefreshToken { .. } => StatusCode::UNAUTHORIZED,
            Error::TokenMismatch { .. } => StatusCode::UNAUTHORIZED,
            Error::TokenNotFound => StatusCode::NOT_FOUND,
            Error::UnsupportedDocumentType { .. } => StatusCode::BAD_REQUEST,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } => message.clone(),
            Error::InvalidCredentials => "Credenciales incorrectas".to_string(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Autenticación requerida".to_string()),
            Error::Forbidden { action } => format!("No tiene permisos para {action}"),
            Error::NotFound { resource, id } => format!("{resource} con id {id} no encontrado"),
            Error::Conflict { message } => message.clone(),
            Error::InvalidRefreshToken { .. } => "Token de refresco inválido".to_string(),
            Error::TokenMismatch { .. } => "Token no válido para este usuario".to_string(),
            Error::TokenNotFound => "Token de refresco no encontrado".to_string(),
            Error::UnsupportedDocumentType { requested } => format!("Tipo de documento no soportado: {requested}"),
            Error::Internal { .. } => "Error interno del servidor".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Recurso no encontrado".to_string(),
                DbError::UniqueViolation { table, constraint, .. } => match (table.as_deref(), constraint.as_deref()) {
                    (Some("users"), Some(c)) if c.contains("email") => "El usuario ya existe".to_string(),
                    _ => "El recurso ya existe".to_string(),
                },
                DbError::ForeignKeyViolation { .. } => "Referencia inválida a un recurso relacionado".to_string(),
                DbError::CheckViolation { .. } => "Datos inválidos".to_string(),
                DbError::Other(_) => "Error de base de datos".to_string(),
            },
            Error::Other(_) => "Error interno del servidor".to_string(),
        }
    }

    /// Optional detail for the `technicalMessage` field of the envelope
    pub fn technical_message(&self) -> Option<String> {
        match self {
            Error::InvalidRefreshToken { expired: true } => Some("refresh token expired".to_string()),
            Error::InvalidRefreshToken { expired: false } => Some("refresh token not found".to_string()),
            Error::Internal { .. } | Error::Other(_) => Some(self.to_string()),
            Error::Database(DbError::UniqueViolation { message, .. })
            | Error::Database(DbError::ForeignKeyViolation { message, .. })
            | Error::Database(DbError::CheckViolation { message, .. }) => Some(message.clone()),
            Error::Database(DbError::Other(err)) => Some(err.to_string()),
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Database(_) | Error::Conflict { .. } => {
                tracing::warn!("Conflict or constraint error: {}", self);
            }
            Error::InvalidCredentials
            | Error::Unauthenticated { .. }
            | Error::Forbidden { .. }
            | Error::InvalidRefreshToken { .. }
            | Error::TokenMismatch { .. } => {
                tracing::info!("Authorization error: {}", self);
            }
            Error::Validation { .. } | Error::NotFound { .. } | Error::TokenNotFound | Error::UnsupportedDocumentType { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        ApiMessage::failure(self.status_code(), self.user_message(), self.technical_message()).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_error_renders_envelope_with_mirrored_code() {
        let (status, body) = render(Error::not_found("Reporte", 42)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], 404);
        assert_eq!(body["error"], true);
        assert_eq!(body["message"], "Reporte con id 42 no encontrado");
        assert!(body.get("technicalMessage").is_none());
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_internal_error_keeps_detail_out_of_primary_message() {
        let (status, body) = render(Error::Internal {
            operation: "render PDF document".to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Error interno del servidor");
        assert_eq!(body["technicalMessage"], "Failed to render PDF document");
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("users_email_unique".to_string()),
            table: Some("users".to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.user_message(), "El usuario ya existe");
    }

    #[test]
    fn test_refresh_failures_share_status_and_message() {
        let expired = Error::InvalidRefreshToken { expired: true };
        let missing = Error::InvalidRefreshToken { expired: false };
        assert_eq!(expired.status_code(), missing.status_code());
        assert_eq!(expired.user_message(), missing.user_message());
        assert_ne!(expired.technical_message(), missing.technical_message());
    }
}
