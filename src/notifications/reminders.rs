//! The `reminder_check` job: scan for orders due for a pickup reminder, a
//! return reminder or an overdue notice, and enqueue one dispatch job per
//! order that has not been notified yet.

use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    app::App,
    database::models::{customer, order_status::OrderStatus, rental_order},
    job_queue::JobQueueError,
    jobs::{Job, JobError},
};

use super::{
    dedup::already_notified,
    dispatch::{DispatchNotificationArguments, DispatchNotificationJob},
    eligibility::{orders_ending_on, orders_starting_on, overdue_orders},
    template::{NotificationTemplate, OverdueNotice, PickupReminder, ReturnReminder},
};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReminderCheck {
    /// Orders picked up tomorrow
    Pickup,
    /// Orders due back today
    Return,
    /// Orders past their return date
    Overdue,
}

impl ReminderCheck {
    #[must_use]
    pub const fn template(self) -> NotificationTemplate {
        match self {
            Self::Pickup => NotificationTemplate::PickupReminder,
            Self::Return => NotificationTemplate::ReturnReminder,
            Self::Overdue => NotificationTemplate::OverdueNotice,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error(transparent)]
    Enqueue(#[from] JobQueueError),
    #[error("Failed to build notification context: {0}")]
    Context(#[from] serde_json::Error),
    #[error("No day after {0}")]
    DateOutOfRange(NaiveDate),
}

impl From<ReminderError> for JobError {
    fn from(error: ReminderError) -> Self {
        match error {
            ReminderError::DateOutOfRange(_) | ReminderError::Context(_) => {
                Self::FailPermanently(error.to_string())
            }
            ReminderError::Database(_) | ReminderError::Enqueue(_) => {
                Self::TryAgainLater(error.to_string())
            }
        }
    }
}

/// Late fee accrued after `days_overdue` days.
#[must_use]
pub const fn late_fee(days_overdue: i64, daily_late_fee: i64) -> i64 {
    days_overdue.saturating_mul(daily_late_fee)
}

/// Overdue notices go out on every `interval_days`-th day overdue.
#[must_use]
pub const fn is_notice_day(days_overdue: i64, interval_days: i64) -> bool {
    interval_days > 0 && days_overdue > 0 && days_overdue % interval_days == 0
}

fn format_date(timestamp: Option<NaiveDateTime>) -> String {
    timestamp
        .map(|timestamp| timestamp.date().format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn dispatch_arguments(
    order: &rental_order::Model,
    customer: &customer::Model,
    template: NotificationTemplate,
    context: serde_json::Value,
    reminder_cycle: Option<i32>,
) -> DispatchNotificationArguments {
    DispatchNotificationArguments {
        recipient: customer.contact_email().map(ToString::to_string),
        customer_id: Some(customer.id),
        template: template.to_string(),
        context,
        order_id: Some(order.id),
        reminder_cycle,
    }
}

async fn pickup_reminders(
    app: &App,
    today: NaiveDate,
) -> Result<Vec<DispatchNotificationArguments>, ReminderError> {
    let template = NotificationTemplate::PickupReminder;
    let tomorrow = today
        .checked_add_days(Days::new(1))
        .ok_or(ReminderError::DateOutOfRange(today))?;

    let mut reminders = Vec::new();
    for eligible in orders_starting_on(&app.db, tomorrow, &OrderStatus::AWAITING_PICKUP).await? {
        let (order, customer) = (&eligible.order, &eligible.customer);
        if already_notified(&app.db, order.id, template, None).await? {
            debug!("Order {} already has a {}", order.reference, template);
            continue;
        }

        let context = serde_json::to_value(PickupReminder {
            customer_name: customer.name.clone(),
            order_reference: order.reference.clone(),
            pickup_date: format_date(order.rental_start),
        })?;
        reminders.push(dispatch_arguments(order, customer, template, context, None));
    }

    Ok(reminders)
}

async fn return_reminders(
    app: &App,
    today: NaiveDate,
) -> Result<Vec<DispatchNotificationArguments>, ReminderError> {
    let template = NotificationTemplate::ReturnReminder;

    let mut reminders = Vec::new();
    for eligible in orders_ending_on(&app.db, today, &OrderStatus::OUT_ON_RENT).await? {
        let (order, customer) = (&eligible.order, &eligible.customer);
        if already_notified(&app.db, order.id, template, None).await? {
            debug!("Order {} already has a {}", order.reference, template);
            continue;
        }

        let context = serde_json::to_value(ReturnReminder {
            customer_name: customer.name.clone(),
            order_reference: order.reference.clone(),
            return_date: format_date(order.rental_end),
        })?;
        reminders.push(dispatch_arguments(order, customer, template, context, None));
    }

    Ok(reminders)
}

async fn overdue_notices(
    app: &App,
    today: NaiveDate,
) -> Result<Vec<DispatchNotificationArguments>, ReminderError> {
    let template = NotificationTemplate::OverdueNotice;
    let policy = &app.config.reminders;

    let mut notices = Vec::new();
    for overdue in overdue_orders(&app.db, today, &OrderStatus::OUT_ON_RENT).await? {
        let (order, customer) = (&overdue.order, &overdue.customer);
        if !is_notice_day(overdue.days_overdue, policy.overdue_notice_interval_days) {
            debug!(
                "Order {} is {} days overdue, not a notice day",
                order.reference, overdue.days_overdue
            );
            continue;
        }

        let cycle = i32::try_from(overdue.days_overdue).unwrap_or(i32::MAX);
        if already_notified(&app.db, order.id, template, Some(cycle)).await? {
            debug!(
                "Order {} already has a {} for day {}",
                order.reference, template, cycle
            );
            continue;
        }

        let context = serde_json::to_value(OverdueNotice {
            customer_name: customer.name.clone(),
            order_reference: order.reference.clone(),
            return_date: format_date(order.rental_end),
            days_overdue: overdue.days_overdue,
            late_fee: late_fee(overdue.days_overdue, policy.daily_late_fee),
        })?;
        notices.push(dispatch_arguments(
            order,
            customer,
            template,
            context,
            Some(cycle),
        ));
    }

    Ok(notices)
}

/// Runs one check as of `today` and returns how many dispatch jobs it
/// enqueued.
pub async fn run_check(
    app: &App,
    check: ReminderCheck,
    today: NaiveDate,
) -> Result<usize, ReminderError> {
    // Scans look at whole days, so the day after `today` must exist
    if today.succ_opt().is_none() {
        return Err(ReminderError::DateOutOfRange(today));
    }

    let notifications = match check {
        ReminderCheck::Pickup => pickup_reminders(app, today).await?,
        ReminderCheck::Return => return_reminders(app, today).await?,
        ReminderCheck::Overdue => overdue_notices(app, today).await?,
    };

    for arguments in &notifications {
        app.run_job::<DispatchNotificationJob>(arguments).await?;
    }

    info!(
        "🔔 {} check for {} enqueued {} notification(s)",
        check,
        today,
        notifications.len()
    );
    Ok(notifications.len())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderCheckArguments {
    pub check: ReminderCheck,
    /// Run as of this day instead of today (UTC)
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

pub struct ReminderCheckJob;

impl Job for ReminderCheckJob {
    type Arguments = ReminderCheckArguments;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
        let today = arguments
            .reference_date
            .unwrap_or_else(|| Utc::now().date_naive());

        run_check(app, arguments.check, today).await?;
        Ok(())
    }

    fn name() -> &'static str {
        "reminder_check"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        database::models::notification_status::NotificationStatus,
        notifications::log::{record, NewLogEntry},
        tests::{
            fixtures::{insert_customer, insert_order, OrderFixture},
            setup_test::{setup_test, TestUtils},
        },
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn days_from_today(days: i64) -> NaiveDateTime {
        (today() + chrono::Duration::days(days))
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    fn dispatches(test: &TestUtils) -> Vec<DispatchNotificationArguments> {
        test.enqueued_jobs_of_type("dispatch_notification")
            .iter()
            .map(|job| job.arguments_as().unwrap())
            .collect()
    }

    async fn log_sent(test: &TestUtils, order_id: uuid::Uuid, template: &str, cycle: Option<i32>) {
        record(
            &test.db,
            NewLogEntry {
                customer_id: None,
                recipient: "ada@example.com".to_string(),
                template: template.to_string(),
                order_id: Some(order_id),
                reminder_cycle: cycle,
                status: NotificationStatus::Sent,
                error: None,
                context: json!({}),
            },
        )
        .await
        .unwrap();
    }

    #[test]
    fn notices_go_out_every_third_day() {
        let notice_days: Vec<i64> = (0..10).filter(|days| is_notice_day(*days, 3)).collect();

        assert_eq!(notice_days, [3, 6, 9]);
        assert!(!is_notice_day(3, 0));
    }

    #[test]
    fn late_fee_is_linear_in_days() {
        assert_eq!(late_fee(3, 100), 300);
        assert_eq!(late_fee(6, 100), 600);
        assert_eq!(late_fee(0, 100), 0);
    }

    #[tokio::test]
    async fn pickup_check_enqueues_one_reminder_per_order() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        let confirmed = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Confirmed).starting(days_from_today(1)),
        )
        .await;
        let reserved = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-2", OrderStatus::Reserved).starting(days_from_today(1)),
        )
        .await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-3", OrderStatus::Cancelled).starting(days_from_today(1)),
        )
        .await;

        let enqueued = run_check(&test.app, ReminderCheck::Pickup, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 2);
        let mut order_ids: Vec<_> = dispatches(&test).iter().map(|d| d.order_id).collect();
        order_ids.sort();
        let mut expected = vec![Some(confirmed.id), Some(reserved.id)];
        expected.sort();
        assert_eq!(order_ids, expected);

        let first = &dispatches(&test)[0];
        assert_eq!(first.template, "pickup_reminder");
        assert_eq!(first.recipient.as_deref(), Some("ada@example.com"));
        assert_eq!(first.context["pickup_date"], "2026-10-20");
    }

    #[tokio::test]
    async fn pickup_check_skips_orders_already_logged() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        let order = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Confirmed).starting(days_from_today(1)),
        )
        .await;
        log_sent(&test, order.id, "pickup_reminder", None).await;

        let enqueued = run_check(&test.app, ReminderCheck::Pickup, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 0);
        assert!(dispatches(&test).is_empty());
    }

    #[tokio::test]
    async fn return_check_targets_orders_due_today() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Grace", Some("grace@example.com")).await;
        let due = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::PickedUp).ending(days_from_today(0)),
        )
        .await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-2", OrderStatus::Active).ending(days_from_today(1)),
        )
        .await;

        let enqueued = run_check(&test.app, ReminderCheck::Return, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 1);
        let dispatch = &dispatches(&test)[0];
        assert_eq!(dispatch.order_id, Some(due.id));
        assert_eq!(dispatch.template, "return_reminder");
        assert_eq!(dispatch.context["return_date"], "2026-10-19");
    }

    #[tokio::test]
    async fn two_days_overdue_is_not_a_notice_day() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Active).ending(days_from_today(-2)),
        )
        .await;

        let enqueued = run_check(&test.app, ReminderCheck::Overdue, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 0);
    }

    #[tokio::test]
    async fn three_days_overdue_gets_a_notice_with_late_fee() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        let order = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::PickedUp).ending(days_from_today(-3)),
        )
        .await;

        let enqueued = run_check(&test.app, ReminderCheck::Overdue, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 1);
        let dispatch = &dispatches(&test)[0];
        assert_eq!(dispatch.order_id, Some(order.id));
        assert_eq!(dispatch.template, "overdue_notice");
        assert_eq!(dispatch.reminder_cycle, Some(3));
        assert_eq!(dispatch.context["days_overdue"], 3);
        assert_eq!(dispatch.context["late_fee"], 300);
    }

    #[tokio::test]
    async fn each_overdue_cycle_is_notified_once() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        let order = insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Active).ending(days_from_today(-6)),
        )
        .await;
        log_sent(&test, order.id, "overdue_notice", Some(3)).await;

        let enqueued = run_check(&test.app, ReminderCheck::Overdue, today())
            .await
            .unwrap();
        assert_eq!(enqueued, 1);
        assert_eq!(dispatches(&test)[0].context["late_fee"], 600);

        log_sent(&test, order.id, "overdue_notice", Some(6)).await;
        test.clear_enqueued_jobs();
        let enqueued = run_check(&test.app, ReminderCheck::Overdue, today())
            .await
            .unwrap();
        assert_eq!(enqueued, 0);
    }

    #[tokio::test]
    async fn dispatching_prevents_a_second_scheduled_send() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Reserved).starting(days_from_today(1)),
        )
        .await;

        run_check(&test.app, ReminderCheck::Pickup, today())
            .await
            .unwrap();
        for arguments in dispatches(&test) {
            test.execute_job::<DispatchNotificationJob>(arguments)
                .await
                .unwrap();
        }
        test.clear_enqueued_jobs();

        let enqueued = run_check(&test.app, ReminderCheck::Pickup, today())
            .await
            .unwrap();

        assert_eq!(enqueued, 0);
        assert_eq!(test.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn customers_without_email_are_still_enqueued() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", None).await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Active).ending(days_from_today(0)),
        )
        .await;

        run_check(&test.app, ReminderCheck::Return, today())
            .await
            .unwrap();

        let dispatch = &dispatches(&test)[0];
        assert_eq!(dispatch.recipient, None);
        assert_eq!(dispatch.customer_id, Some(customer.id));
    }

    #[tokio::test]
    async fn job_uses_the_reference_date() {
        let test = setup_test().await;
        let customer = insert_customer(&test.db, "Ada", Some("ada@example.com")).await;
        insert_order(
            &test.db,
            &customer,
            OrderFixture::new("R-1", OrderStatus::Active).ending(days_from_today(-9)),
        )
        .await;

        test.execute_job::<ReminderCheckJob>(ReminderCheckArguments {
            check: ReminderCheck::Overdue,
            reference_date: Some(today()),
        })
        .await
        .unwrap();

        let dispatch = &dispatches(&test)[0];
        assert_eq!(dispatch.reminder_cycle, Some(9));
        assert_eq!(dispatch.context["late_fee"], 900);
    }

    #[tokio::test]
    async fn last_representable_day_fails_every_check() {
        let test = setup_test().await;

        for check in [ReminderCheck::Pickup, ReminderCheck::Return, ReminderCheck::Overdue] {
            let result = run_check(&test.app, check, NaiveDate::MAX).await;

            assert!(matches!(result, Err(ReminderError::DateOutOfRange(_))));
        }

        let day_before = NaiveDate::MAX.pred_opt().unwrap();
        let result = run_check(&test.app, ReminderCheck::Pickup, day_before).await;
        assert!(matches!(result, Err(ReminderError::DateOutOfRange(_))));

        let result = test
            .execute_job::<ReminderCheckJob>(ReminderCheckArguments {
                check: ReminderCheck::Return,
                reference_date: Some(NaiveDate::MAX),
            })
            .await;
        assert!(matches!(result, Err(JobError::FailPermanently(_))));
    }

    #[test]
    fn check_arguments_use_lowercase_names() {
        let arguments: ReminderCheckArguments =
            serde_json::from_value(json!({ "check": "return" })).unwrap();

        assert_eq!(arguments.check, ReminderCheck::Return);
        assert_eq!(arguments.reference_date, None);
        assert_eq!(ReminderCheck::Overdue.template(), NotificationTemplate::OverdueNotice);
    }
}
