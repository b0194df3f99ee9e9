use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use sea_orm::DbErr;
use serde_json::json;
use tracing::error;

use crate::notifications::reminders::ReminderError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid query parameters: {0}")]
    InvalidQuery(#[from] QueryRejection),
    #[error("Unknown reminder check: {0}")]
    UnknownCheck(String),
    #[error("Reference date {0} is out of range")]
    DateOutOfRange(NaiveDate),
    #[error("Database error")]
    Database(#[from] DbErr),
    #[error("Reminder check failed")]
    Reminder(ReminderError),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidJson(_) | Self::InvalidQuery(_) | Self::DateOutOfRange(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UnknownCheck(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Reminder(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ReminderError> for ApiError {
    fn from(error: ReminderError) -> Self {
        match error {
            ReminderError::DateOutOfRange(date) => Self::DateOutOfRange(date),
            other => Self::Reminder(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
