use lettre::{message::header::ContentType, Message};
use thiserror::Error;

use crate::{app::App, jobs::JobError, mailer::MailerError};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(#[from] lettre::address::AddressError),
    #[error("Failed to build email: {0}")]
    BuilderError(#[from] lettre::error::Error),
    #[error("Failed to send email: {0}")]
    TransportError(String),
}

impl From<MailerError> for EmailError {
    fn from(error: MailerError) -> Self {
        Self::TransportError(error.to_string())
    }
}

impl From<EmailError> for JobError {
    /// Only transport errors can go away on their own.
    fn from(error: EmailError) -> Self {
        match error {
            EmailError::TransportError(e) => Self::TryAgainLater(e),
            e @ (EmailError::InvalidRecipient(_) | EmailError::BuilderError(_)) => {
                Self::FailPermanently(e.to_string())
            }
        }
    }
}

/// Sends a plain text email from the configured sender.
pub async fn send_text_email(
    app: &App,
    recipient: &str,
    subject: &str,
    body: String,
) -> Result<(), EmailError> {
    let email = Message::builder()
        .from(app.config.email.sender().clone())
        .to(recipient.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)?;

    app.mailer.send(email).await?;

    Ok(())
}
