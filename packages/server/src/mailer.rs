use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Outgoing account mail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mail {
    /// Confirms a freshly registered address.
    Confirm { to: String, token: String },
    /// Confirms the pending address of an email change.
    ChangeEmail { to: String, token: String },
    /// Carries a password-recovery token.
    ResetPassword { to: String, token: String },
}

impl Mail {
    pub fn recipient(&self) -> &str {
        match self {
            Mail::Confirm { to, .. } | Mail::ChangeEmail { to, .. } | Mail::ResetPassword { to, .. } => {
                to
            }
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Mail::Confirm { token, .. }
            | Mail::ChangeEmail { token, .. }
            | Mail::ResetPassword { token, .. } => token,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Mail::Confirm { .. } => "Confirm your account",
            Mail::ChangeEmail { .. } => "Confirm your new email address",
            Mail::ResetPassword { .. } => "Reset your password",
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

/// Hands mail to the log instead of an SMTP relay.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        // The token is a credential; it never reaches the log.
        info!(to = mail.recipient(), subject = mail.subject(), "Outgoing mail");
        Ok(())
    }
}
