use axum::{
    routing::{get, post},
    Router,
};

use crate::app::App;

pub mod error;
pub mod health_checks;
pub mod notifications;
pub mod reminders;

/// Operations endpoints, mounted under `/api`.
pub fn routes() -> Router<App> {
    Router::new()
        .route("/notifications", get(notifications::index))
        .route("/reminders/{check}/run", post(reminders::run))
}
