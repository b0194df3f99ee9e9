//! `SeaORM` Entity for the notification audit log
//!
//! One row per finished dispatch: `sent` on success, `failed` once the job
//! gave up. `order_id`, `template` and `reminder_cycle` are copied out of the
//! metadata so the duplicate check is an indexed lookup.

use crate::database::models::{
    notification_channel::NotificationChannel, notification_status::NotificationStatus,
};
use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "notification_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub recipient: String,
    pub channel: NotificationChannel,
    pub template: String,
    pub order_id: Option<Uuid>,
    pub reminder_cycle: Option<i32>,
    pub status: NotificationStatus,
    pub error: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
