use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

use crate::database::models::notification_log::{self, Entity as NotificationLog};

use super::template::NotificationTemplate;

/// Whether a notification for this order and template (and reminder cycle,
/// when given) is already in the log, whatever its status.
///
/// Nothing locks between this check and the insert made by the dispatch job,
/// so two checks running at the same time can both return `false`.
pub async fn already_notified(
    db: &DatabaseConnection,
    order_id: Uuid,
    template: NotificationTemplate,
    reminder_cycle: Option<i32>,
) -> Result<bool, DbErr> {
    let mut query = NotificationLog::find()
        .filter(notification_log::Column::OrderId.eq(order_id))
        .filter(notification_log::Column::Template.eq(template.to_string()));

    if let Some(cycle) = reminder_cycle {
        query = query.filter(notification_log::Column::ReminderCycle.eq(cycle));
    }

    Ok(query.count(db).await? > 0)
}
