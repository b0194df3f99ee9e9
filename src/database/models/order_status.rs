use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a rental order.
///
/// Stored as a plain string column. Other parts of the back office may write
/// values outside this set; reminder scans always filter on an explicit list
/// of statuses, so such rows are never decoded here.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    DeriveActiveEnum,
    EnumIter,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "reserved")]
    Reserved,
    #[sea_orm(string_value = "picked_up")]
    PickedUp,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "overdue")]
    Overdue,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// Statuses of orders waiting to be picked up.
    pub const AWAITING_PICKUP: [Self; 2] = [Self::Confirmed, Self::Reserved];

    /// Statuses of orders whose items are out with the customer.
    pub const OUT_ON_RENT: [Self; 2] = [Self::Active, Self::PickedUp];
}
