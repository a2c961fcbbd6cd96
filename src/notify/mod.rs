//! # Operator Notification
//!
//! Sends the end-of-run message to the operator. Exactly one notification
//! goes out per maintenance run: success-shaped on full completion,
//! failure-shaped otherwise.
//!
//! Transport failures never escalate. The orchestrator converts the send
//! result into a [`NotifyOutcome`] and logs it; a broken relay must not mask
//! or replace the maintenance outcome being reported.

use std::sync::Mutex;

use thiserror::Error;

/// Result type for notification sends
pub type NotifyResult<T> = Result<T, NotifyError>;

/// Notification transport errors. Always handled locally by the
/// orchestrator, never re-raised into the failure boundary.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    /// A sender or recipient address could not be parsed
    #[error("invalid address {0}")]
    InvalidAddress(String),

    /// The message could not be assembled
    #[error("could not build message: {0}")]
    BuildMessage(String),

    /// The relay rejected or never received the message
    #[error("transport error: {0}")]
    Transport(String),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Sender address
    pub sender: String,
    /// One or more recipient addresses
    pub recipients: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

impl Notification {
    /// Assemble a notification.
    pub fn new(
        sender: impl Into<String>,
        recipients: Vec<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipients,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// What became of the run's notification: sent, or failed with a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The transport accepted the message
    Sent,
    /// The send failed; the reason is logged, never raised
    Failed(String),
}

/// Outbound message transport.
pub trait Notifier: Send + Sync {
    /// Synchronously send one notification.
    fn send(&self, notification: &Notification) -> NotifyResult<()>;
}

/// SMTP notifier.
///
/// Talks to a plain relay on the local network; no authentication and no
/// TLS, which is why the transport is built with `builder_dangerous`.
pub struct SmtpNotifier {
    relay_host: String,
    relay_port: u16,
}

impl SmtpNotifier {
    /// Create a notifier for the given relay.
    pub fn new(relay_host: impl Into<String>, relay_port: u16) -> Self {
        Self {
            relay_host: relay_host.into(),
            relay_port,
        }
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, notification: &Notification) -> NotifyResult<()> {
        use lettre::{message::header::ContentType, Message, SmtpTransport, Transport};

        let mut builder = Message::builder()
            .from(
                notification
                    .sender
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(notification.sender.clone()))?,
            )
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &notification.recipients {
            builder = builder.to(recipient
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(recipient.clone()))?);
        }
        let email = builder
            .body(notification.body.clone())
            .map_err(|e| NotifyError::BuildMessage(e.to_string()))?;

        let mailer = SmtpTransport::builder_dangerous(&self.relay_host)
            .port(self.relay_port)
            .build();
        mailer
            .send(&email)
            .map(|_| ())
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}

/// Notifier that prints the message to stdout instead of sending it.
/// Used by rehearsal runs.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, notification: &Notification) -> NotifyResult<()> {
        println!(
            "notification to {}: [{}] {}",
            notification.recipients.join(", "),
            notification.subject,
            notification.body
        );
        Ok(())
    }
}

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    /// Sent notifications (for testing)
    sent: Mutex<Vec<Notification>>,
    fail_with: Mutex<Option<String>>,
}

impl MockNotifier {
    /// Create a mock that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with the given transport reason.
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock().unwrap() = Some(reason.to_string());
    }

    /// Notifications accepted so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of accepted notifications.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Notifier for MockNotifier {
    fn send(&self, notification: &Notification) -> NotifyResult<()> {
        if let Some(reason) = self.fail_with.lock().unwrap().clone() {
            return Err(NotifyError::Transport(reason));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
