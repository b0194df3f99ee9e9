//! Order scans behind the pickup, return and overdue checks.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

use super::reminders::ReminderError;
use tracing::warn;

use crate::database::models::{
    customer,
    order_status::OrderStatus,
    rental_order::{self, Entity as RentalOrder},
};

#[derive(Debug, Clone)]
pub struct EligibleOrder {
    pub order: rental_order::Model,
    pub customer: customer::Model,
}

#[derive(Debug, Clone)]
pub struct OverdueOrder {
    pub order: rental_order::Model,
    pub customer: customer::Model,
    pub days_overdue: i64,
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Start of `date` and start of the day after, or an error on the last
/// representable day.
fn day_bounds(date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), ReminderError> {
    let next_day = date
        .checked_add_days(Days::new(1))
        .ok_or(ReminderError::DateOutOfRange(date))?;

    Ok((start_of_day(date), start_of_day(next_day)))
}

/// Whole days between the day a rental was due back and `today`.
#[must_use]
pub fn days_overdue(rental_end: NaiveDateTime, today: NaiveDate) -> i64 {
    (today - rental_end.date()).num_days()
}

/// Orders picked up on `date` whose status is in `statuses`.
pub async fn orders_starting_on(
    db: &DatabaseConnection,
    date: NaiveDate,
    statuses: &[OrderStatus],
) -> Result<Vec<EligibleOrder>, ReminderError> {
    let (start, end) = day_bounds(date)?;

    let rows = RentalOrder::find()
        .filter(rental_order::Column::Status.is_in(statuses.iter().copied()))
        .filter(rental_order::Column::RentalStart.gte(start))
        .filter(rental_order::Column::RentalStart.lt(end))
        .order_by_asc(rental_order::Column::RentalStart)
        .find_also_related(customer::Entity)
        .all(db)
        .await?;

    Ok(with_customers(rows))
}

/// Orders due back on `date` whose status is in `statuses`.
pub async fn orders_ending_on(
    db: &DatabaseConnection,
    date: NaiveDate,
    statuses: &[OrderStatus],
) -> Result<Vec<EligibleOrder>, ReminderError> {
    let (start, end) = day_bounds(date)?;

    let rows = RentalOrder::find()
        .filter(rental_order::Column::Status.is_in(statuses.iter().copied()))
        .filter(rental_order::Column::RentalEnd.gte(start))
        .filter(rental_order::Column::RentalEnd.lt(end))
        .order_by_asc(rental_order::Column::RentalEnd)
        .find_also_related(customer::Entity)
        .all(db)
        .await?;

    Ok(with_customers(rows))
}

/// Orders that were due back before `today` and are still out.
pub async fn overdue_orders(
    db: &DatabaseConnection,
    today: NaiveDate,
    statuses: &[OrderStatus],
) -> Result<Vec<OverdueOrder>, DbErr> {
    let rows = RentalOrder::find()
        .filter(rental_order::Column::Status.is_in(statuses.iter().copied()))
        .filter(rental_order::Column::RentalEnd.lt(start_of_day(today)))
        .order_by_asc(rental_order::Column::RentalEnd)
        .find_also_related(customer::Entity)
        .all(db)
        .await?;

    Ok(with_customers(rows)
        .into_iter()
        .filter_map(|EligibleOrder { order, customer }| {
            let days_overdue = days_overdue(order.rental_end?, today);
            Some(OverdueOrder {
                order,
                customer,
                days_overdue,
            })
        })
        .collect())
}

fn with_customers(
    rows: Vec<(rental_order::Model, Option<customer::Model>)>,
) -> Vec<EligibleOrder> {
    rows.into_iter()
        .filter_map(|(order, customer)| match customer {
            Some(customer) => Some(EligibleOrder { order, customer }),
            None => {
                warn!(
                    "Skipping order {} ({}): customer {} not found",
                    order.reference, order.id, order.customer_id
                );
                None
            }
        })
        .collect()
}
