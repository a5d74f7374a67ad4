use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::dispatch::errors::DispatchError;

/// API error type with HTTP status code and message
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Creates a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Creates a 500 Internal Server Error
    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<DispatchError> for ApiError {
    fn from(error: DispatchError) -> Self {
        let message = error.to_string();
        match &error {
            _ if error.is_not_found() => Self::not_found(message),
            DispatchError::DuplicateAgent(_) | DispatchError::InvalidState(_) => {
                Self::conflict(message)
            }
            DispatchError::InvalidInput(_) => Self::bad_request(message),
            _ => Self::internal_server_error(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn dispatch_errors_map_to_status() {
        let id = Uuid::new_v4();
        let cases = vec![
            (DispatchError::AgentNotFound(id), StatusCode::NOT_FOUND),
            (DispatchError::TaskNotFound(id), StatusCode::NOT_FOUND),
            (
                DispatchError::SubtaskNotFound {
                    task_id: id,
                    subtask_id: id,
                },
                StatusCode::NOT_FOUND,
            ),
            (DispatchError::DuplicateAgent(id), StatusCode::CONFLICT),
            (
                DispatchError::InvalidState("busy".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                DispatchError::InvalidInput("negative".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DispatchError::Config("bad".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status, status);
        }
    }

    #[test]
    fn message_is_preserved() {
        let id = Uuid::new_v4();
        let api_error = ApiError::from(DispatchError::TaskNotFound(id));

        assert_eq!(api_error.message, format!("Task not found: {}", id));
    }
}
