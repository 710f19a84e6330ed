use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sea_orm::DbErr;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::error;

/// 字段 → 违规信息，按字段名排序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同一字段只保留第一条违规
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    Permission(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Permission(_) => "permission_denied",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::Database(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }
}

/// 请求体无法反序列化时同样按校验失败处理。
///
/// 类型错误的文本形如 `...target type: file_size: invalid type: ...`，
/// 能解析出字段路径时挂到顶层字段上，否则挂到 `body`。
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        if !matches!(rejection, JsonRejection::JsonDataError(_)) {
            return AppError::validation("body", text);
        }
        let detail = text.split_once("target type: ").map_or(text.as_str(), |(_, detail)| detail);
        match detail.split_once(": ") {
            Some((path, message)) if is_field_path(path) => AppError::validation(top_level_field(path), message),
            _ => AppError::validation("body", detail),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text())
    }
}

fn is_field_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'))
}

// tags[0] -> tags
fn top_level_field(path: &str) -> &str {
    path.split(|c: char| c == '.' || c == '[').next().unwrap_or(path)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a ValidationErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Database(e) => {
                // 数据库细节只写日志，不返回给客户端
                error!("数据库操作失败: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let fields = match &self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
            fields,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_message_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "Title is required");
        errors.add("title", "Title must be at least 3 characters");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("title"), Some("Title is required"));
    }

    #[test]
    fn maps_error_kinds_to_status_codes() {
        assert_eq!(AppError::validation("x", "bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("r".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Permission("r".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::InvalidState("r".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::Database(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn field_paths_reduce_to_top_level_fields() {
        assert!(is_field_path("file_size"));
        assert!(is_field_path("tags[0]"));
        assert!(!is_field_path("invalid type"));
        assert!(!is_field_path(""));
        assert_eq!(top_level_field("tags[0]"), "tags");
        assert_eq!(top_level_field("file_size"), "file_size");
    }

    #[test]
    fn empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
