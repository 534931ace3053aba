use std::sync::Arc;

use tracing::info;

use crate::error::AppError;

/// Outgoing email. Only a logging implementation ships; real delivery is out of scope.
pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

pub type SharedMailer = Arc<dyn Mailer>;

#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        info!(
            from = %self.from,
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "Mock email sent"
        );
        Ok(())
    }
}
