//! The `dispatch_notification` job: render one notification, send it and
//! record the outcome in the notification log.

use std::str::FromStr;

use sea_orm::{DbErr, EntityTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    app::App,
    database::models::{
        customer::{self, Entity as Customer},
        notification_status::NotificationStatus,
        rental_order::Entity as RentalOrder,
    },
    emails::{send_text_email, EmailError},
    jobs::{Job, JobError},
};

use super::{
    log::{record, NewLogEntry},
    template::{NotificationTemplate, TemplateError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchNotificationArguments {
    /// Address to send to; falls back to the customer's email when absent.
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub customer_id: Option<Uuid>,
    pub template: String,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub order_id: Option<Uuid>,
    #[serde(default)]
    pub reminder_cycle: Option<i32>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Customer {0} not found")]
    CustomerNotFound(Uuid),
    #[error("Order {0} not found")]
    OrderNotFound(Uuid),
    #[error("No recipient email address")]
    MissingRecipient,
    #[error("Unknown template: {0}")]
    UnknownTemplate(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Email(#[from] EmailError),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<DispatchError> for JobError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Email(e) => e.into(),
            DispatchError::Database(e) => Self::TryAgainLater(e.to_string()),
            e @ (DispatchError::CustomerNotFound(_)
            | DispatchError::OrderNotFound(_)
            | DispatchError::MissingRecipient
            | DispatchError::UnknownTemplate(_)
            | DispatchError::Template(_)) => Self::FailPermanently(e.to_string()),
        }
    }
}

pub struct DispatchNotificationJob;

impl Job for DispatchNotificationJob {
    type Arguments = DispatchNotificationArguments;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
        let recipient = deliver(app, &arguments).await.inspect_err(|e| {
            warn!(
                "Dispatch of {} for order {:?} failed: {}",
                arguments.template, arguments.order_id, e
            );
        })?;

        info!(
            "📧 Sent {} to {} for order {:?}",
            arguments.template, recipient, arguments.order_id
        );

        // The email is out; a failed log write must not trigger a resend.
        if let Err(e) = record(&app.db, log_entry(&arguments, recipient, None)).await {
            error!(
                "Failed to record sent {} for order {:?}: {}",
                arguments.template, arguments.order_id, e
            );
        }

        Ok(())
    }

    async fn on_failure(app: &App, arguments: Self::Arguments, error: &JobError) {
        error!(
            "❌ Giving up on {} for order {:?}: {}",
            arguments.template, arguments.order_id, error
        );

        let recipient = fallback_recipient(app, &arguments).await;
        let entry = log_entry(&arguments, recipient, Some(error.to_string()));
        if let Err(e) = record(&app.db, entry).await {
            error!(
                "Failed to record failed {} for order {:?}: {}",
                arguments.template, arguments.order_id, e
            );
        }
    }

    fn name() -> &'static str {
        "dispatch_notification"
    }
}

fn log_entry(
    arguments: &DispatchNotificationArguments,
    recipient: String,
    error: Option<String>,
) -> NewLogEntry {
    NewLogEntry {
        customer_id: arguments.customer_id,
        recipient,
        template: arguments.template.clone(),
        order_id: arguments.order_id,
        reminder_cycle: arguments.reminder_cycle,
        status: if error.is_some() {
            NotificationStatus::Failed
        } else {
            NotificationStatus::Sent
        },
        error,
        context: arguments.context.clone(),
    }
}

fn explicit_recipient(arguments: &DispatchNotificationArguments) -> Option<&str> {
    arguments
        .recipient
        .as_deref()
        .map(str::trim)
        .filter(|recipient| !recipient.is_empty())
}

/// Checks the order and customer still exist, renders and sends. Returns the
/// address the email went to.
async fn deliver(
    app: &App,
    arguments: &DispatchNotificationArguments,
) -> Result<String, DispatchError> {
    let customer = match arguments.customer_id {
        Some(customer_id) => Some(
            Customer::find_by_id(customer_id)
                .one(&app.db)
                .await?
                .ok_or(DispatchError::CustomerNotFound(customer_id))?,
        ),
        None => None,
    };

    if let Some(order_id) = arguments.order_id {
        RentalOrder::find_by_id(order_id)
            .one(&app.db)
            .await?
            .ok_or(DispatchError::OrderNotFound(order_id))?;
    }

    let recipient = explicit_recipient(arguments)
        .or_else(|| customer.as_ref().and_then(customer::Model::contact_email))
        .ok_or(DispatchError::MissingRecipient)?
        .to_string();

    let template = NotificationTemplate::from_str(&arguments.template)
        .map_err(|_| DispatchError::UnknownTemplate(arguments.template.clone()))?;
    let email = template.render(&arguments.context)?;

    send_text_email(app, &recipient, &email.subject, email.body).await?;

    Ok(recipient)
}

/// Best known address for the failure record; empty when there is none.
async fn fallback_recipient(app: &App, arguments: &DispatchNotificationArguments) -> String {
    if let Some(recipient) = explicit_recipient(arguments) {
        return recipient.to_string();
    }

    let Some(customer_id) = arguments.customer_id else {
        return String::new();
    };

    match Customer::find_by_id(customer_id).one(&app.db).await {
        Ok(Some(customer)) => customer.contact_email().unwrap_or_default().to_string(),
        Ok(None) => String::new(),
        Err(e) => {
            warn!("Could not load customer {}: {}", customer_id, e);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        database::models::{notification_log, order_status::OrderStatus},
        notifications::log::{recent, LogQuery},
        tests::{
            fixtures::{insert_customer, insert_order, OrderFixture},
            setup_test::{setup_test, JobOutcome},
        },
    };

    fn pickup_context() -> serde_json::Value {
        json!({
            "customer_name": "Ada",
            "order_reference": "R-1",
            "pickup_date": "2026-10-20",
        })
    }

    async fn log_rows(db: &sea_orm::DatabaseConnection) -> Vec<notification_log::Model> {
        recent(db, &LogQuery::default()).await.unwrap()
    }

    async fn arguments_for_order(
        db: &sea_orm::DatabaseConnection,
        email: Option<&str>,
    ) -> DispatchNotificationArguments {
        let customer = insert_customer(db, "Ada", email).await;
        let order = insert_order(db, &customer, OrderFixture::new("R-1", OrderStatus::Confirmed))
            .await;

        DispatchNotificationArguments {
            recipient: customer.contact_email().map(ToString::to_string),
            customer_id: Some(customer.id),
            template: NotificationTemplate::PickupReminder.to_string(),
            context: pickup_context(),
            order_id: Some(order.id),
            reminder_cycle: None,
        }
    }

    #[tokio::test]
    async fn sends_and_records_one_sent_row() {
        let test = setup_test().await;
        let arguments = arguments_for_order(&test.db, Some("ada@example.com")).await;

        test.execute_job::<DispatchNotificationJob>(arguments.clone())
            .await
            .unwrap();

        assert_eq!(test.sent_emails().len(), 1);
        let rows = log_rows(&test.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, NotificationStatus::Sent);
        assert_eq!(rows[0].recipient, "ada@example.com");
        assert_eq!(rows[0].order_id, arguments.order_id);
        assert_eq!(rows[0].template, "pickup_reminder");
    }

    #[tokio::test]
    async fn each_successful_dispatch_writes_its_own_row() {
        let test = setup_test().await;
        let arguments = arguments_for_order(&test.db, Some("ada@example.com")).await;

        for _ in 0..2 {
            test.execute_job::<DispatchNotificationJob>(arguments.clone())
                .await
                .unwrap();
        }

        assert_eq!(test.sent_emails().len(), 2);
        assert_eq!(log_rows(&test.db).await.len(), 2);
    }

    #[tokio::test]
    async fn falls_back_to_the_customer_email() {
        let test = setup_test().await;
        let arguments = DispatchNotificationArguments {
            recipient: None,
            ..arguments_for_order(&test.db, Some(" grace@example.com ")).await
        };

        test.execute_job::<DispatchNotificationJob>(arguments)
            .await
            .unwrap();

        assert_eq!(log_rows(&test.db).await[0].recipient, "grace@example.com");
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_sent() {
        let test = setup_test().await;
        let arguments = arguments_for_order(&test.db, Some("ada@example.com")).await;
        test.app.mailer.fail_next_sends(2);

        let outcome = test.perform_job::<DispatchNotificationJob>(arguments).await;

        let JobOutcome::Completed {
            attempts,
            waited_seconds,
        } = outcome
        else {
            panic!("expected the dispatch to complete, got {outcome:?}");
        };
        assert_eq!(attempts, 3);
        assert!(waited_seconds >= 2 * 60);

        let rows = log_rows(&test.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn exhausted_retries_record_one_failed_row() {
        let test = setup_test().await;
        let arguments = arguments_for_order(&test.db, Some("ada@example.com")).await;
        test.app.mailer.fail_next_sends(10);

        let outcome = test.perform_job::<DispatchNotificationJob>(arguments).await;

        assert!(matches!(outcome, JobOutcome::Failed { attempts: 4, .. }));
        let rows = log_rows(&test.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, NotificationStatus::Failed);
        assert!(rows[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("rejected")));
    }

    #[tokio::test]
    async fn missing_customer_email_fails_without_retry() {
        let test = setup_test().await;
        let arguments = arguments_for_order(&test.db, None).await;

        let outcome = test.perform_job::<DispatchNotificationJob>(arguments).await;

        assert!(matches!(outcome, JobOutcome::Failed { attempts: 1, .. }));
        assert!(test.sent_emails().is_empty());
        let rows = log_rows(&test.db).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, NotificationStatus::Failed);
        assert_eq!(rows[0].recipient, "");
        assert_eq!(rows[0].error.as_deref(), Some("No recipient email address"));
    }

    #[tokio::test]
    async fn missing_order_fails_permanently() {
        let test = setup_test().await;
        let arguments = DispatchNotificationArguments {
            order_id: Some(Uuid::new_v4()),
            ..arguments_for_order(&test.db, Some("ada@example.com")).await
        };

        let result = test
            .execute_job::<DispatchNotificationJob>(arguments)
            .await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
        assert!(test.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn missing_customer_fails_permanently() {
        let test = setup_test().await;
        let arguments = DispatchNotificationArguments {
            customer_id: Some(Uuid::new_v4()),
            ..arguments_for_order(&test.db, Some("ada@example.com")).await
        };

        let outcome = test.perform_job::<DispatchNotificationJob>(arguments).await;

        assert!(matches!(outcome, JobOutcome::Failed { attempts: 1, .. }));
        assert_eq!(log_rows(&test.db).await[0].recipient, "ada@example.com");
    }

    #[tokio::test]
    async fn context_that_does_not_fit_the_template_fails_permanently() {
        let test = setup_test().await;
        let arguments = DispatchNotificationArguments {
            context: json!({ "customer_name": "Ada" }),
            ..arguments_for_order(&test.db, Some("ada@example.com")).await
        };

        let result = test
            .execute_job::<DispatchNotificationJob>(arguments)
            .await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
    }

    #[tokio::test]
    async fn unknown_template_fails_permanently() {
        let test = setup_test().await;
        let arguments = DispatchNotificationArguments {
            template: "welcome".to_string(),
            ..arguments_for_order(&test.db, Some("ada@example.com")).await
        };

        let result = test
            .execute_job::<DispatchNotificationJob>(arguments)
            .await;

        assert!(matches!(result, Err(JobError::FailPermanently(_))));
    }
}
