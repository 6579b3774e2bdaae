use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rusqlite::ffi;
use serde_json::json;

use crate::config::Environment;

/// Causes shown to development clients in place of a stack trace.
const STACK_DEPTH: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("refund could not be requested")]
    Gateway(#[source] anyhow::Error),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingFields(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> String {
        match self {
            AppError::MissingFields(_) => "MISSING_FIELDS".to_string(),
            AppError::Validation(_) => "VALIDATION_ERROR".to_string(),
            AppError::NotFound(_) => "NOT_FOUND".to_string(),
            AppError::Unauthorized => "UNAUTHORIZED".to_string(),
            AppError::Forbidden(_) => "FORBIDDEN".to_string(),
            AppError::Conflict(_) => "CONFLICT".to_string(),
            AppError::Unavailable(_) => "UNAVAILABLE".to_string(),
            AppError::Gateway(_) => "GATEWAY_ERROR".to_string(),
            AppError::Internal(err) => classify_storage_error(err)
                .map(|fault| fault.code)
                .unwrap_or_else(|| "INTERNAL_ERROR".to_string()),
        }
    }

    /// JSON body with an `error` string; development builds also get `code`, `details` and `stack`.
    pub fn render(&self, environment: Environment) -> Response {
        let mut body = json!({ "error": self.to_string() });

        if let AppError::MissingFields(fields) = self {
            body["missingFields"] = json!(fields);
        }
        if let AppError::Unavailable(_) = self {
            body["available"] = json!(false);
        }

        if environment.is_development() && !matches!(self, AppError::Unauthorized) {
            body["code"] = json!(self.code());
            match self {
                AppError::Internal(err) => {
                    body["details"] = match classify_storage_error(err) {
                        Some(fault) => json!({
                            "category": fault.category.as_str(),
                            "message": fault.details,
                        }),
                        None => json!(err.to_string()),
                    };
                    body["stack"] = json!(stack_of(err));
                }
                AppError::Gateway(err) => {
                    body["details"] = json!(err.to_string());
                    body["stack"] = json!(stack_of(err));
                }
                AppError::MissingFields(fields) => body["details"] = json!(fields),
                other => body["details"] = json!(other.to_string()),
            }
        }

        (self.status(), axum::Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.render(Environment::Production)
    }
}

fn stack_of(err: &anyhow::Error) -> Vec<String> {
    err.chain()
        .take(STACK_DEPTH)
        .map(|cause| cause.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageCategory {
    UniqueViolation,
    ForeignKeyViolation,
    NotNullViolation,
    CheckViolation,
    NotFound,
}

impl StorageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageCategory::UniqueViolation => "unique_violation",
            StorageCategory::ForeignKeyViolation => "foreign_key_violation",
            StorageCategory::NotNullViolation => "not_null_violation",
            StorageCategory::CheckViolation => "check_violation",
            StorageCategory::NotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageFault {
    pub category: StorageCategory,
    pub code: String,
    pub details: String,
}

/// Finds a SQLite constraint or not-found error anywhere in the cause chain.
pub fn classify_storage_error(err: &anyhow::Error) -> Option<StorageFault> {
    let sqlite = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<rusqlite::Error>())?;

    match sqlite {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let (category, code) = match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    (StorageCategory::UniqueViolation, "SQLITE_CONSTRAINT_UNIQUE")
                }
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    (StorageCategory::UniqueViolation, "SQLITE_CONSTRAINT_PRIMARYKEY")
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    (StorageCategory::ForeignKeyViolation, "SQLITE_CONSTRAINT_FOREIGNKEY")
                }
                ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    (StorageCategory::NotNullViolation, "SQLITE_CONSTRAINT_NOTNULL")
                }
                ffi::SQLITE_CONSTRAINT_CHECK => {
                    (StorageCategory::CheckViolation, "SQLITE_CONSTRAINT_CHECK")
                }
                _ => return None,
            };
            Some(StorageFault {
                category,
                code: code.to_string(),
                details: message.clone().unwrap_or_else(|| failure.to_string()),
            })
        }
        rusqlite::Error::QueryReturnedNoRows => Some(StorageFault {
            category: StorageCategory::NotFound,
            code: "SQLITE_NO_ROWS".to_string(),
            details: err.to_string(),
        }),
        _ => None,
    }
}
