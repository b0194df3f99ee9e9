use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    app::App,
    notifications::reminders::{run_check, ReminderCheck},
};

use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct RunRequest {
    pub reference_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub check: ReminderCheck,
    pub reference_date: NaiveDate,
    pub enqueued: usize,
}

/// `POST /api/reminders/{check}/run`: runs a check now. The body is optional.
pub async fn run(
    State(app): State<App>,
    Path(check): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<RunResponse>), ApiError> {
    let check = ReminderCheck::from_str(&check).map_err(|_| ApiError::UnknownCheck(check))?;
    let request: RunRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RunRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };

    let reference_date = request
        .reference_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let enqueued = run_check(&app, check, reference_date).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(RunResponse {
            check,
            reference_date,
            enqueued,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;
    use crate::{
        database::models::order_status::OrderStatus,
        tests::{
            fixtures::{insert_customer, insert_order, OrderFixture},
            setup_test::setup_test,
        },
    };

    #[tokio::test]
    async fn runs_a_check_for_the_requested_day() {
        let test = setup_test().await;
        let reference_date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Active)
                .ending((reference_date - Duration::days(3)).and_hms_opt(12, 0, 0).unwrap()),
        )
        .await;

        let response = test
            .server
            .post("/api/reminders/overdue/run")
            .json(&json!({ "reference_date": "2026-10-19" }))
            .await;

        response.assert_status(StatusCode::ACCEPTED);
        let body: RunResponse = response.json();
        assert_eq!(body.check, ReminderCheck::Overdue);
        assert_eq!(body.reference_date, reference_date);
        assert_eq!(body.enqueued, 1);
        assert_eq!(test.enqueued_jobs_of_type("dispatch_notification").len(), 1);
    }

    #[tokio::test]
    async fn body_is_optional() {
        let test = setup_test().await;

        let response = test.server.post("/api/reminders/pickup/run").await;

        response.assert_status(StatusCode::ACCEPTED);
        let body: RunResponse = response.json();
        assert_eq!(body.reference_date, Utc::now().date_naive());
        assert_eq!(body.enqueued, 0);
    }

    #[tokio::test]
    async fn unknown_checks_are_not_found() {
        let test = setup_test().await;

        test.server
            .post("/api/reminders/weekly/run")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn last_representable_day_is_a_bad_request() {
        let test = setup_test().await;

        for check in ["pickup", "return", "overdue"] {
            let response = test
                .server
                .post(&format!("/api/reminders/{check}/run"))
                .json(&json!({ "reference_date": "+262142-12-31" }))
                .await;

            response.assert_status_bad_request();
        }
        assert!(test.enqueued_jobs_of_type("dispatch_notification").is_empty());
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let test = setup_test().await;

        test.server
            .post("/api/reminders/return/run")
            .text("{ not json")
            .await
            .assert_status_bad_request();
    }
}
