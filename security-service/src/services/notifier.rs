use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Delivers password reset codes to their owners.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reset_code(
        &self,
        to_email: &str,
        otp: &str,
        expiry_minutes: i64,
    ) -> Result<(), AppError>;
}

/// A message the mock notifier accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to_email: String,
    pub otp: String,
    pub expiry_minutes: i64,
}

/// In-memory notifier that records every delivery and can be made to fail.
#[derive(Debug, Default)]
pub struct MockNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: AtomicBool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent code sent to `email`, if any.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|d| d.to_email == email)
            .map(|d| d.otp.clone())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_reset_code(
        &self,
        to_email: &str,
        otp: &str,
        expiry_minutes: i64,
    ) -> Result<(), AppError> {
        if self.failing.load(Ordering::SeqCst) {
            tracing::error!(to = %to_email, "Failed to send password reset code");
            return Err(AppError::NotificationError(format!(
                "delivery to {} refused",
                to_email
            )));
        }

        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Delivery {
                to_email: to_email.to_string(),
                otp: otp.to_string(),
                expiry_minutes,
            });

        tracing::info!(to = %to_email, "Password reset code sent");
        Ok(())
    }
}
