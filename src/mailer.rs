use std::{
    fmt::{self, Debug},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};

use crate::config::EmailConfig;

pub type MailerError = Box<dyn std::error::Error + Send + Sync>;

/// In-memory transport that captures sent emails for tests.
///
/// Can be told to reject the next `n` sends, which is how tests exercise the
/// retry path of notification dispatch.
#[derive(Clone, Default)]
pub struct MockTransport {
    messages: Arc<Mutex<Vec<Message>>>,
    failures_remaining: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` sends with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    fn send(&self, message: Message) -> Result<(), MailerError> {
        let rejected = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err("mock transport rejected the message".into());
        }

        self.lock().push(message);
        Ok(())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Mailer that can be either a real SMTP transport or a mock for testing.
#[derive(Clone)]
pub enum Mailer {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Mock(MockTransport),
}

impl Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smtp(_) => f.debug_tuple("Mailer::Smtp").finish(),
            Self::Mock(_) => f.debug_tuple("Mailer::Mock").finish(),
        }
    }
}

impl Mailer {
    pub fn mock() -> Self {
        Self::Mock(MockTransport::new())
    }

    /// Builds the transport described by the `[email]` configuration section.
    pub fn from_config(config: &EmailConfig) -> Result<Self, lettre::transport::smtp::Error> {
        let EmailConfig::Smtp {
            host,
            port,
            username,
            password,
            use_tls,
            ..
        } = config
        else {
            return Ok(Self::mock());
        };

        let mut builder = if *use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?.port(*port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(*port)
        };

        if let (Some(username), Some(password)) = (username, password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self::Smtp(builder.build()))
    }

    pub async fn send(&self, message: Message) -> Result<(), MailerError> {
        match self {
            Self::Smtp(transport) => {
                transport.send(message).await?;
                Ok(())
            }
            Self::Mock(mock) => mock.send(message),
        }
    }

    /// Sent emails, or `None` for the SMTP mailer.
    pub fn messages(&self) -> Option<Vec<Message>> {
        match self {
            Self::Mock(transport) => Some(transport.messages()),
            Self::Smtp(_) => None,
        }
    }

    pub fn clear_messages(&self) {
        if let Self::Mock(transport) = self {
            transport.clear();
        }
    }

    /// Make the mock transport reject the next `count` sends. No-op for SMTP.
    pub fn fail_next_sends(&self, count: usize) {
        if let Self::Mock(transport) = self {
            transport.fail_next(count);
        }
    }
}
