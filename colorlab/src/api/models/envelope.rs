//! Response envelope shared by every JSON endpoint.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Standard response body: `{ code, error, message, technicalMessage?, data? }`.
///
/// `code` always mirrors the HTTP status of the response carrying it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMessage<T> {
    pub code: u16,
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiMessage<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            code: status.as_u16(),
            error: false,
            message: message.into(),
            technical_message: None,
            data: Some(data),
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::success(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::success(StatusCode::CREATED, message, data)
    }
}

impl ApiMessage<()> {
    /// Successful response without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            error: false,
            message: message.into(),
            technical_message: None,
            data: None,
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>, technical_message: Option<String>) -> Self {
        Self {
            code: status.as_u16(),
            error: true,
            message: message.into(),
            technical_message,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiMessage<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serializes_camel_case_with_data() {
        let message = ApiMessage::created("Cliente creado", json!({ "id": 7 }));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value, json!({ "code": 201, "error": false, "message": "Cliente creado", "data": { "id": 7 } }));
    }

    #[test]
    fn test_failure_includes_technical_message() {
        let message = ApiMessage::failure(StatusCode::BAD_GATEWAY, "Error", Some("upstream".to_string()));
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["technicalMessage"], "upstream");
        assert_eq!(value["error"], true);
        assert_eq!(value["code"], 502);
    }

    #[test]
    fn test_deserializes_payload_without_default() {
        use crate::api::models::users::UserResponse;

        let bare: ApiMessage<UserResponse> =
            serde_json::from_value(json!({ "code": 404, "error": true, "message": "Usuario no encontrado" })).unwrap();
        assert!(bare.data.is_none());
        assert!(bare.technical_message.is_none());

        let full: ApiMessage<UserResponse> = serde_json::from_value(json!({
            "code": 200,
            "error": false,
            "message": "Usuario encontrado",
            "data": {
                "id": 3,
                "email": "ana@example.com",
                "name": "Ana",
                "role": 2,
                "createdAt": "2025-03-01T10:00:00Z",
                "updatedAt": "2025-03-01T10:00:00Z"
            }
        }))
        .unwrap();
        assert_eq!(full.data.map(|u| u.email).as_deref(), Some("ana@example.com"));
    }
}
