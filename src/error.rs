use crate::analysis::classifier::{ModelLoadError, ScoringError};
use crate::analysis::ratios::RatioError;
use crate::analysis::validation::ValidationError;
use crate::commands::dataset::DatasetError;
use crate::commands::settings::ConfigError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::error::Error as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Computation(#[from] RatioError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    ModelLoad(#[from] ModelLoadError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Failed to bind or serve: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_)
            | AppError::Validation(_)
            | AppError::Computation(_)
            | AppError::Scoring(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            AppError::Validation(err) => Some(err.field()),
            AppError::Computation(RatioError::InvalidIncome(_)) => Some("estimatedIncome"),
            _ => None,
        }
    }

    /// The error and each of its sources joined with `: `.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(err) = source {
            let text = err.to_string();
            if !message.contains(&text) {
                message.push_str(": ");
                message.push_str(&text);
            }
            source = err.source();
        }
        message
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed: {}", self.chain());
        } else {
            log::warn!("Rejected request: {self}");
        }

        let body = ErrorBody {
            detail: self.to_string(),
            field: self.field(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_map_to_unprocessable_entity() {
        assert_eq!(
            AppError::from(ValidationError::InvalidAge(17)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(RatioError::InvalidIncome(0.0)).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::from(ScoringError::NonFiniteScore).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn dataset_failures_are_server_errors() {
        let err = AppError::from(DatasetError::InvalidStoredClient {
            id: "c1".to_string(),
            reason: "bad date".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.chain().contains("c1"));
    }

    #[test]
    fn malformed_requests_are_unprocessable_without_a_field() {
        let err = AppError::InvalidRequest("missing field `age`".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.field(), None);
        assert!(err.to_string().contains("age"));
    }

    #[test]
    fn validation_errors_carry_their_field() {
        let err = AppError::from(ValidationError::InvalidAge(17));
        assert_eq!(err.field(), Some("age"));
        assert_eq!(AppError::Internal("boom".into()).field(), None);
    }
}
