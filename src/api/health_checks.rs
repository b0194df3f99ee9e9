use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::app::App;

pub async fn ok() -> StatusCode {
    StatusCode::OK
}

/// 200 when the database answers, 503 otherwise.
pub async fn ready(State(app): State<App>) -> Response {
    match app.db.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::tests::setup_test::setup_test;

    #[tokio::test]
    async fn liveness_and_readiness_answer_ok() {
        let test = setup_test().await;

        test.server.get("/liveness").await.assert_status_ok();
        test.server.get("/readiness").await.assert_status_ok();
    }

    #[tokio::test]
    async fn readiness_fails_once_the_database_is_gone() {
        let test = setup_test().await;
        test.db.clone().close().await.unwrap();

        test.server
            .get("/readiness")
            .await
            .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }
}
