//! Password reset model - per-email OTP state and flow results.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// OTP length in decimal digits.
pub const OTP_LENGTH: usize = 6;

/// Live reset state for one email address.
#[derive(Debug, Clone)]
pub struct ResetAttempt {
    pub(crate) otp: String,
    /// Starts at 1 on issue and grows with each failed verification.
    pub attempts: u32,
    /// When the current OTP was issued.
    pub first_attempt: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
    pub blocked: bool,
    pub block_until: Option<DateTime<Utc>>,
    /// Reset requests made since `request_window_start`.
    pub requests_in_window: u32,
    pub request_window_start: DateTime<Utc>,
}

impl ResetAttempt {
    /// Issue a fresh OTP, carrying over the daily request tally from `previous`
    /// while its window is still open.
    pub(crate) fn issue(
        otp: String,
        now: DateTime<Utc>,
        previous: Option<&ResetAttempt>,
        request_window: Duration,
    ) -> Self {
        let (requests_in_window, request_window_start) = match previous {
            Some(prev) if now - prev.request_window_start < request_window => {
                (prev.requests_in_window + 1, prev.request_window_start)
            }
            _ => (1, now),
        };

        Self {
            otp,
            attempts: 1,
            first_attempt: now,
            last_attempt: now,
            blocked: false,
            block_until: None,
            requests_in_window,
            request_window_start,
        }
    }

    /// Keep only the daily tally once a block has run out.
    pub(crate) fn tally_only(&self) -> Self {
        Self {
            otp: String::new(),
            attempts: 0,
            first_attempt: self.first_attempt,
            last_attempt: self.last_attempt,
            blocked: false,
            block_until: None,
            requests_in_window: self.requests_in_window,
            request_window_start: self.request_window_start,
        }
    }

    /// True when the record carries an OTP that can still be verified.
    pub fn has_live_otp(&self) -> bool {
        !self.otp.is_empty()
    }

    pub fn active_block(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.block_until {
            Some(until) if self.blocked && now < until => Some(until),
            _ => None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, expiry: Duration) -> bool {
        now - self.first_attempt > expiry
    }

    pub(crate) fn block(&mut self, until: DateTime<Utc>) {
        self.blocked = true;
        self.block_until = Some(until);
    }
}

/// Whole minutes left until `until`, rounded up and never below 1.
pub fn minutes_until(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let seconds = (until - now).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

fn describe_minutes(minutes: i64) -> String {
    match minutes {
        1 => "1 minute".to_string(),
        60 => "1 hour".to_string(),
        m if m > 0 && m % 60 == 0 => format!("{} hours", m / 60),
        m => format!("{} minutes", m),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// A previously set block is still running.
    Locked,
    DailyLimitExceeded,
    /// A failed verification escalated the lockout.
    FailedVerification { attempt: u32, lockout_minutes: i64 },
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Locked => "locked",
            BlockReason::DailyLimitExceeded => "daily_limit_exceeded",
            BlockReason::FailedVerification { .. } => "failed_verification",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetBlock {
    pub reason: BlockReason,
    pub until: DateTime<Utc>,
    pub minutes_remaining: i64,
}

impl ResetBlock {
    pub fn message(&self) -> String {
        match self.reason {
            BlockReason::Locked => format!(
                "Account temporarily blocked. Please try again in {}.",
                describe_minutes(self.minutes_remaining)
            ),
            BlockReason::DailyLimitExceeded => {
                "Daily password reset limit exceeded. Please try again tomorrow.".to_string()
            }
            BlockReason::FailedVerification {
                attempt,
                lockout_minutes,
            } => match attempt {
                2 => format!(
                    "Too many failed attempts. Account blocked for {}.",
                    describe_minutes(lockout_minutes)
                ),
                3 => format!(
                    "Account blocked for {} due to multiple failed attempts.",
                    describe_minutes(lockout_minutes)
                ),
                _ => format!(
                    "Account blocked for {} due to repeated failed attempts.",
                    describe_minutes(lockout_minutes)
                ),
            },
        }
    }
}

impl fmt::Display for ResetBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// User-correctable or internal failures of the reset flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetFailure {
    NoRequestFound,
    Expired,
    DeliveryFailed,
    Internal,
}

impl fmt::Display for ResetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ResetFailure::NoRequestFound => "No password reset request found",
            ResetFailure::Expired => "OTP has expired. Please request a new one.",
            ResetFailure::DeliveryFailed => {
                "Failed to send password reset email. Please try again."
            }
            ResetFailure::Internal => "An error occurred. Please try again.",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResetResult {
    Success { message: String },
    Blocked(ResetBlock),
    Error { failure: ResetFailure },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyResult {
    Success,
    Blocked(ResetBlock),
    Error { failure: ResetFailure },
}

/// Redacted view of a reset record; never carries the OTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetStatus {
    pub email: String,
    pub attempts: u32,
    pub attempts_remaining: u32,
    pub issued_at: DateTime<Utc>,
    pub last_attempt: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
    pub requests_in_window: u32,
    pub otp_pending: bool,
}
