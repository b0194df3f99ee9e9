use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::database::models::{
    notification_channel::NotificationChannel,
    notification_log::{self, Entity as NotificationLog},
    notification_status::NotificationStatus,
};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 500;

/// A finished dispatch, about to be written to the log.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub customer_id: Option<Uuid>,
    pub recipient: String,
    pub template: String,
    pub order_id: Option<Uuid>,
    pub reminder_cycle: Option<i32>,
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub context: Value,
}

/// Template context plus the `order_id` and `template` keys.
fn metadata(entry: &NewLogEntry) -> Value {
    let mut metadata = match &entry.context {
        Value::Object(context) => context.clone(),
        Value::Null => Map::new(),
        other => Map::from_iter([("context".to_string(), other.clone())]),
    };
    metadata.insert("order_id".to_string(), json!(entry.order_id));
    metadata.insert("template".to_string(), json!(entry.template));
    Value::Object(metadata)
}

pub async fn record(
    db: &DatabaseConnection,
    entry: NewLogEntry,
) -> Result<notification_log::Model, DbErr> {
    let metadata = metadata(&entry);

    notification_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        customer_id: Set(entry.customer_id),
        recipient: Set(entry.recipient),
        channel: Set(NotificationChannel::Email),
        template: Set(entry.template),
        order_id: Set(entry.order_id),
        reminder_cycle: Set(entry.reminder_cycle),
        status: Set(entry.status),
        error: Set(entry.error),
        metadata: Set(metadata),
        created_at: Set(chrono::Utc::now().naive_utc()),
    }
    .insert(db)
    .await
}

#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    pub order_id: Option<Uuid>,
    pub status: Option<NotificationStatus>,
    pub limit: Option<u64>,
}

/// Newest entries first.
pub async fn recent(
    db: &DatabaseConnection,
    query: &LogQuery,
) -> Result<Vec<notification_log::Model>, DbErr> {
    let mut select = NotificationLog::find();

    if let Some(order_id) = query.order_id {
        select = select.filter(notification_log::Column::OrderId.eq(order_id));
    }
    if let Some(status) = query.status {
        select = select.filter(notification_log::Column::Status.eq(status));
    }

    select
        .order_by_desc(notification_log::Column::CreatedAt)
        .limit(query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT))
        .all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::setup_test::setup_test;

    fn entry(order_id: Uuid, status: NotificationStatus) -> NewLogEntry {
        NewLogEntry {
            customer_id: None,
            recipient: "ada@example.com".to_string(),
            template: "overdue_notice".to_string(),
            order_id: Some(order_id),
            reminder_cycle: Some(3),
            status,
            error: None,
            context: json!({ "days_overdue": 3, "late_fee": 300 }),
        }
    }

    #[tokio::test]
    async fn metadata_carries_order_and_template() {
        let test = setup_test().await;
        let order_id = Uuid::new_v4();

        let row = record(&test.db, entry(order_id, NotificationStatus::Sent))
            .await
            .unwrap();

        assert_eq!(row.channel, NotificationChannel::Email);
        assert_eq!(row.metadata["order_id"], json!(order_id));
        assert_eq!(row.metadata["template"], "overdue_notice");
        assert_eq!(row.metadata["late_fee"], 300);
    }

    #[tokio::test]
    async fn filters_by_order_and_status() {
        let test = setup_test().await;
        let order_id = Uuid::new_v4();
        record(&test.db, entry(order_id, NotificationStatus::Sent)).await.unwrap();
        record(&test.db, entry(order_id, NotificationStatus::Failed)).await.unwrap();
        record(&test.db, entry(Uuid::new_v4(), NotificationStatus::Sent)).await.unwrap();

        let for_order = recent(
            &test.db,
            &LogQuery {
                order_id: Some(order_id),
                ..LogQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(for_order.len(), 2);

        let failed = recent(
            &test.db,
            &LogQuery {
                status: Some(NotificationStatus::Failed),
                ..LogQuery::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].order_id, Some(order_id));
    }
}
