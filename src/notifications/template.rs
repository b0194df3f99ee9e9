//! Plain text email templates for customer notifications.
//!
//! Each template has a context struct that is both what the reminder checks
//! serialize into the dispatch job and what askama renders. Dispatch only
//! carries the JSON form, so rendering starts by decoding it back.

use askama::Template;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationTemplate {
    PickupReminder,
    ReturnReminder,
    OverdueNotice,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Context does not fit template {template}: {source}")]
    Context {
        template: NotificationTemplate,
        source: serde_json::Error,
    },
    #[error("Failed to render template {template}: {source}")]
    Render {
        template: NotificationTemplate,
        source: askama::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Template)]
#[template(path = "notifications/pickup_reminder.txt")]
pub struct PickupReminder {
    pub customer_name: String,
    pub order_reference: String,
    pub pickup_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Template)]
#[template(path = "notifications/return_reminder.txt")]
pub struct ReturnReminder {
    pub customer_name: String,
    pub order_reference: String,
    pub return_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Template)]
#[template(path = "notifications/overdue_notice.txt")]
pub struct OverdueNotice {
    pub customer_name: String,
    pub order_reference: String,
    pub return_date: String,
    pub days_overdue: i64,
    pub late_fee: i64,
}

impl NotificationTemplate {
    pub fn render(self, context: &serde_json::Value) -> Result<RenderedEmail, TemplateError> {
        match self {
            Self::PickupReminder => {
                let email: PickupReminder = self.decode(context)?;
                let subject = format!("Your rental {} is ready for pickup", email.order_reference);
                self.finish(subject, &email)
            }
            Self::ReturnReminder => {
                let email: ReturnReminder = self.decode(context)?;
                let subject = format!("Your rental {} is due back today", email.order_reference);
                self.finish(subject, &email)
            }
            Self::OverdueNotice => {
                let email: OverdueNotice = self.decode(context)?;
                let subject = format!("Your rental {} is overdue", email.order_reference);
                self.finish(subject, &email)
            }
        }
    }

    fn decode<T: DeserializeOwned>(self, context: &serde_json::Value) -> Result<T, TemplateError> {
        T::deserialize(context).map_err(|source| TemplateError::Context {
            template: self,
            source,
        })
    }

    fn finish(self, subject: String, email: &impl Template) -> Result<RenderedEmail, TemplateError> {
        let body = email.render().map_err(|source| TemplateError::Render {
            template: self,
            source,
        })?;

        Ok(RenderedEmail { subject, body })
    }
}
