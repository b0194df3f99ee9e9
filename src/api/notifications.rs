use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    app::App,
    database::models::{notification_log, notification_status::NotificationStatus},
    notifications::log::{recent, LogQuery},
};

use super::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct NotificationsParams {
    pub order_id: Option<Uuid>,
    pub status: Option<NotificationStatus>,
    pub limit: Option<u64>,
}

/// `GET /api/notifications`: the notification log, newest first.
pub async fn index(
    State(app): State<App>,
    params: Result<Query<NotificationsParams>, QueryRejection>,
) -> Result<Json<Vec<notification_log::Model>>, ApiError> {
    let Query(params) = params?;

    let entries = recent(
        &app.db,
        &LogQuery {
            order_id: params.order_id,
            status: params.status,
            limit: params.limit,
        },
    )
    .await?;

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::{
        notifications::log::{record, NewLogEntry},
        tests::setup_test::setup_test,
    };

    fn entry(order_id: Uuid, status: NotificationStatus) -> NewLogEntry {
        NewLogEntry {
            customer_id: None,
            recipient: "ada@example.com".to_string(),
            template: "return_reminder".to_string(),
            order_id: Some(order_id),
            reminder_cycle: None,
            status,
            error: (status == NotificationStatus::Failed).then(|| "rejected".to_string()),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn lists_entries_with_filters() {
        let test = setup_test().await;
        let order_id = Uuid::new_v4();
        for status in [NotificationStatus::Sent, NotificationStatus::Failed] {
            record(&test.db, entry(order_id, status)).await.unwrap();
        }
        record(&test.db, entry(Uuid::new_v4(), NotificationStatus::Sent))
            .await
            .unwrap();

        let all: Vec<Value> = test.server.get("/api/notifications").await.json();
        assert_eq!(all.len(), 3);

        let failed: Vec<Value> = test
            .server
            .get("/api/notifications")
            .add_query_param("status", "failed")
            .await
            .json();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["error"], "rejected");
        assert_eq!(failed[0]["channel"], "email");

        let limited: Vec<Value> = test
            .server
            .get("/api/notifications")
            .add_query_param("order_id", order_id)
            .add_query_param("limit", 1)
            .await
            .json();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn rejects_malformed_filters() {
        let test = setup_test().await;

        test.server
            .get("/api/notifications")
            .add_query_param("status", "bounced")
            .await
            .assert_status_bad_request();
    }
}
