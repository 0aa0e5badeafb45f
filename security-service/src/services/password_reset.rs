//! OTP password reset with a daily request cap and progressive lockout.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::error::ServiceError;
use super::metrics;
use super::otp::{generate_otp, otp_matches};
use super::{AuditLog, Clock, Notifier};
use crate::config::ResetConfig;
use crate::models::{
    minutes_until, AuditEvent, AuditEventType, BlockReason, ResetAttempt, ResetBlock,
    ResetFailure, ResetResult, ResetStatus, Severity, VerifyResult,
};

/// Failed verifications tolerated before the lockout ladder tops out.
const MAX_VERIFY_ATTEMPTS: u32 = 3;

fn request_window() -> Duration {
    Duration::hours(24)
}

pub struct PasswordResetService {
    config: ResetConfig,
    notifier: Arc<dyn Notifier>,
    audit_log: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    attempts: DashMap<String, ResetAttempt>,
}

impl PasswordResetService {
    pub fn new(
        config: ResetConfig,
        notifier: Arc<dyn Notifier>,
        audit_log: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            notifier,
            audit_log,
            clock,
            attempts: DashMap::new(),
        }
    }

    /// Issue a fresh OTP for `email` and hand it to the notifier.
    ///
    /// The record is committed before dispatch, so a failed delivery still
    /// consumes one of the day's requests.
    #[tracing::instrument(skip(self))]
    pub async fn request_reset(&self, email: &str) -> ResetResult {
        let now = self.clock.now();
        let otp = match self.reserve(email, now) {
            Ok(otp) => otp,
            Err(block) => {
                metrics::record_reset_request("blocked");
                return ResetResult::Blocked(block);
            }
        };

        let expiry_minutes = self.config.otp_expiry_minutes;
        let dispatch = self
            .notifier
            .send_reset_code(email, &otp, expiry_minutes);

        match AssertUnwindSafe(dispatch).catch_unwind().await {
            Ok(Ok(())) => {
                metrics::record_reset_request("issued");
                self.audit(
                    email,
                    AuditEventType::PasswordResetRequested,
                    Severity::Info,
                    "Password reset OTP sent successfully",
                );
                ResetResult::Success {
                    message: "Password reset OTP sent to your email".to_string(),
                }
            }
            Ok(Err(err)) => {
                let err = ServiceError::from(err);
                tracing::error!(error = %err, "Password reset delivery failed");
                metrics::record_reset_request("delivery_failed");
                self.audit(
                    email,
                    AuditEventType::PasswordResetFailed,
                    Severity::Error,
                    "Failed to send password reset email",
                );
                ResetResult::Error {
                    failure: ResetFailure::DeliveryFailed,
                }
            }
            Err(payload) => {
                let err = ServiceError::NotifierPanicked(panic_message(payload.as_ref()));
                tracing::error!(error = %err, "Notifier panicked during password reset");
                metrics::record_reset_request("internal");
                self.audit(
                    email,
                    AuditEventType::PasswordResetFailed,
                    Severity::Security,
                    format!("Exception during password reset: {}", err),
                );
                ResetResult::Error {
                    failure: ResetFailure::Internal,
                }
            }
        }
    }

    /// Claim a request slot under the record's entry guard and return the new
    /// OTP, or the block that prevents one.
    fn reserve(&self, email: &str, now: DateTime<Utc>) -> Result<String, ResetBlock> {
        let window = request_window();

        match self.attempts.entry(email.to_string()) {
            Entry::Vacant(vacant) => {
                let otp = generate_otp();
                vacant.insert(ResetAttempt::issue(otp.clone(), now, None, window));
                Ok(otp)
            }
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();

                if record.blocked {
                    if let Some(until) = record.active_block(now) {
                        return Err(ResetBlock {
                            reason: BlockReason::Locked,
                            until,
                            minutes_remaining: minutes_until(now, until),
                        });
                    }
                    *record = record.tally_only();
                }

                if record.requests_in_window >= self.config.max_requests_per_day
                    && now - record.request_window_start < window
                {
                    let until = record.request_window_start + window;
                    record.block(until);
                    metrics::record_reset_lockout(BlockReason::DailyLimitExceeded);
                    tracing::warn!(until = %until, "Daily password reset limit reached");
                    self.audit(
                        email,
                        AuditEventType::PasswordResetFailed,
                        Severity::Warning,
                        "Daily password reset limit exceeded",
                    );
                    return Err(ResetBlock {
                        reason: BlockReason::DailyLimitExceeded,
                        until,
                        minutes_remaining: minutes_until(now, until),
                    });
                }

                let otp = generate_otp();
                let next = ResetAttempt::issue(otp.clone(), now, Some(&*record), window);
                *record = next;
                Ok(otp)
            }
        }
    }

    /// Check `candidate` against the live OTP for `email`.
    ///
    /// A match consumes the record. A miss escalates the lockout.
    #[tracing::instrument(skip(self, candidate))]
    pub fn verify_otp(&self, email: &str, candidate: &str) -> VerifyResult {
        let now = self.clock.now();

        let mut occupied = match self.attempts.entry(email.to_string()) {
            Entry::Occupied(occupied) => occupied,
            Entry::Vacant(_) => return no_request_found(),
        };

        if let Some(until) = occupied.get().active_block(now) {
            return VerifyResult::Blocked(ResetBlock {
                reason: BlockReason::Locked,
                until,
                minutes_remaining: minutes_until(now, until),
            });
        }

        if !occupied.get().has_live_otp() {
            return no_request_found();
        }

        let expiry = Duration::minutes(self.config.otp_expiry_minutes);
        if occupied.get().is_expired(now, expiry) {
            self.audit(
                email,
                AuditEventType::PasswordResetFailed,
                Severity::Warning,
                "OTP expired",
            );
            return VerifyResult::Error {
                failure: ResetFailure::Expired,
            };
        }

        if otp_matches(&occupied.get().otp, candidate) {
            occupied.remove();
            self.audit(
                email,
                AuditEventType::PasswordResetSuccess,
                Severity::Info,
                "OTP verified successfully",
            );
            return VerifyResult::Success;
        }

        let record = occupied.get_mut();
        record.attempts = record.attempts.saturating_add(1);
        record.last_attempt = now;

        let attempt = record.attempts;
        let lockout_minutes = self.lockout_minutes(attempt);
        let until = now + Duration::minutes(lockout_minutes);
        record.block(until);

        let reason = BlockReason::FailedVerification {
            attempt,
            lockout_minutes,
        };
        let block = ResetBlock {
            reason,
            until,
            minutes_remaining: minutes_until(now, until),
        };

        metrics::record_reset_lockout(reason);
        self.audit(
            email,
            AuditEventType::PasswordResetFailed,
            Severity::Warning,
            format!(
                "OTP verification failed - attempt {}. {}",
                attempt,
                block.message()
            ),
        );
        VerifyResult::Blocked(block)
    }

    fn lockout_minutes(&self, attempt: u32) -> i64 {
        match attempt {
            0..=2 => self.config.first_lockout_minutes,
            3 => self.config.second_lockout_minutes,
            _ => self.config.final_lockout_minutes,
        }
    }

    pub fn status(&self, email: &str) -> Option<ResetStatus> {
        let now = self.clock.now();
        self.attempts.get(email).map(|record| ResetStatus {
            email: email.to_string(),
            attempts: record.attempts,
            attempts_remaining: MAX_VERIFY_ATTEMPTS.saturating_sub(record.attempts),
            issued_at: record.first_attempt,
            last_attempt: record.last_attempt,
            blocked_until: record.active_block(now),
            requests_in_window: record.requests_in_window,
            otp_pending: record.has_live_otp(),
        })
    }

    pub fn clear(&self) {
        self.attempts.clear();
        tracing::info!("Password reset records cleared");
    }

    fn audit(
        &self,
        email: &str,
        event_type: AuditEventType,
        severity: Severity,
        details: impl Into<String>,
    ) {
        self.audit_log
            .record(AuditEvent::new(event_type, severity, details).username(email));
    }
}

fn no_request_found() -> VerifyResult {
    VerifyResult::Error {
        failure: ResetFailure::NoRequestFound,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
