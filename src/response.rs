use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

/// Response envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiBody<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl<T: Serialize> ApiBody<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            errors: None,
        }
    }

    pub fn message_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
            errors: None,
        }
    }
}

impl ApiBody<Value> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            errors: None,
        }
    }

    pub fn failure(message: impl Into<String>, errors: Option<Value>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
            errors,
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<ApiBody<T>>) {
    (StatusCode::OK, Json(ApiBody::data(data)))
}

pub fn ok_message<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiBody<T>>) {
    (StatusCode::OK, Json(ApiBody::message_data(message, data)))
}

pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiBody<T>>) {
    (
        StatusCode::CREATED,
        Json(ApiBody::message_data(message, data)),
    )
}
