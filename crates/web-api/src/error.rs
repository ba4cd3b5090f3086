use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, ServerEvent};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
    }

    pub fn bad_frame(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_FRAME", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }

    /// 转成发往单个 WebSocket 连接的 error 事件
    pub fn into_event(self) -> ServerEvent {
        ServerEvent::error(self.body.code, self.body.message)
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let message = error.to_string();
        match error {
            DomainError::DuplicateUser(_) => ApiError::new(StatusCode::CONFLICT, "USER_EXISTS", message),
            DomainError::Unauthenticated => {
                ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", message)
            }
            DomainError::Forbidden => ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message),
            DomainError::UnknownRoom(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", message)
            }
            DomainError::UnknownParticipant(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "UNKNOWN_PARTICIPANT", message)
            }
            DomainError::NotJoined => ApiError::new(StatusCode::CONFLICT, "NOT_JOINED", message),
            DomainError::InvalidArgument { .. } => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_ARGUMENT", message)
            }
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => err.into(),
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal server error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
