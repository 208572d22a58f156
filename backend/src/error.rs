//! Error handling for the Home Service backend
//!
//! Provides consistent error responses in English and Thai

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::allocation::AllocationError;
use thiserror::Error;

use crate::services::applier::CommittedStep;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock movement errors
    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock {
        requested: Decimal,
        available: Decimal,
    },

    /// Some FEFO steps were committed before a later step failed
    #[error("Partial consumption: {} step(s) committed, {outstanding} outstanding", .committed.len())]
    PartialConsumption {
        committed: Vec<CommittedStep>,
        outstanding: Decimal,
        cause: Box<AppError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Build a validation error for one field
    pub fn validation(field: &str, message: &str, message_th: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_th: message_th.to_string(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Conflict { .. } => "CONFLICT",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::PartialConsumption { .. } => "PARTIAL_CONSUMPTION",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PartialConsumption { .. } => StatusCode::CONFLICT,
            AppError::Configuration(_)
            | AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::InvalidQuantity(msg) => AppError::Validation {
                field: "qty".to_string(),
                message: msg.to_string(),
                message_th: "จำนวนไม่ถูกต้อง".to_string(),
            },
            AllocationError::InsufficientStock {
                requested,
                available,
            } => AppError::InsufficientStock {
                requested,
                available,
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Report the first failing field, by name
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::Validation {
                    field: field.to_string(),
                    message,
                    message_th: format!("ข้อมูล {} ไม่ถูกต้อง", field),
                }
            }
            None => AppError::validation("body", "Invalid input", "ข้อมูลไม่ถูกต้อง"),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn detail(&self) -> ErrorDetail {
        let code = self.code().to_string();
        match self {
            AppError::Unauthorized(message) => ErrorDetail {
                code,
                message_en: message.clone(),
                message_th: "ไม่ได้รับอนุญาต".to_string(),
                field: None,
                details: None,
            },
            AppError::Validation {
                field,
                message,
                message_th,
            } => ErrorDetail {
                code,
                message_en: message.clone(),
                message_th: message_th.clone(),
                field: Some(field.clone()),
                details: None,
            },
            AppError::Conflict {
                resource,
                message,
                message_th,
            } => ErrorDetail {
                code,
                message_en: message.clone(),
                message_th: message_th.clone(),
                field: Some(resource.clone()),
                details: None,
            },
            AppError::NotFound(resource) => ErrorDetail {
                code,
                message_en: format!("{} not found", resource),
                message_th: format!("ไม่พบ {}", resource),
                field: None,
                details: None,
            },
            AppError::InsufficientStock {
                requested,
                available,
            } => ErrorDetail {
                code,
                message_en: format!(
                    "Insufficient stock: requested {}, available {}",
                    requested.normalize(),
                    available.normalize()
                ),
                message_th: format!(
                    "สต็อกไม่พอ: ต้องการ {} คงเหลือ {}",
                    requested.normalize(),
                    available.normalize()
                ),
                field: None,
                details: Some(serde_json::json!({
                    "requested": requested,
                    "available": available,
                })),
            },
            AppError::PartialConsumption {
                committed,
                outstanding,
                cause,
            } => ErrorDetail {
                code,
                message_en: format!(
                    "Stock changed while consuming; {} batch(es) were already debited",
                    committed.len()
                ),
                message_th: format!(
                    "สต็อกเปลี่ยนระหว่างเบิก ตัดไปแล้ว {} ล็อต",
                    committed.len()
                ),
                field: None,
                details: Some(serde_json::json!({
                    "committed": committed,
                    "outstanding": outstanding,
                    "cause": cause.code(),
                })),
            },
            AppError::Configuration(_) => ErrorDetail {
                code,
                message_en: "Server configuration error".to_string(),
                message_th: "เกิดข้อผิดพลาดในการตั้งค่า".to_string(),
                field: None,
                details: None,
            },
            AppError::DatabaseError(_) => ErrorDetail {
                code,
                message_en: "A database error occurred".to_string(),
                message_th: "เกิดข้อผิดพลาดกับฐานข้อมูล".to_string(),
                field: None,
                details: None,
            },
            AppError::Internal(_) | AppError::InternalError(_) => ErrorDetail {
                code,
                message_en: "An internal server error occurred".to_string(),
                message_th: "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                field: None,
                details: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
