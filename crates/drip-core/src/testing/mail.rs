use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{DripError, Result};
use crate::mail::Email;
use crate::store::MailSender;

/// Mail sender that records instead of sending.
#[derive(Default)]
pub struct RecordingMailSender {
    sent: Mutex<Vec<Email>>,
    failure: Mutex<Option<String>>,
}

impl RecordingMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    /// Emails sent so far.
    pub fn sent(&self) -> Vec<Email> {
        lock(&self.sent).clone()
    }

    /// Assert that exactly one email went to `to`.
    pub fn assert_sent_to(&self, to: &str) {
        let count = lock(&self.sent).iter().filter(|e| e.to == to).count();
        assert_eq!(count, 1, "expected one email to {}, found {}", to, count);
    }
}

#[async_trait]
impl MailSender for RecordingMailSender {
    async fn send_email(&self, email: &Email) -> Result<()> {
        if let Some(message) = lock(&self.failure).clone() {
            return Err(DripError::Mail(message));
        }
        lock(&self.sent).push(email.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
