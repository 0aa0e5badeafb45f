//! Access attempt model - per-identity check history and decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use super::Permission;

/// Why an access check was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The identity is serving a temporary block.
    TemporarilyBlocked,
    /// This check tripped the per-identity attempt limit.
    RateLimitExceeded,
    NotFoundOrInactive,
    PermissionDenied,
    RoleAccessDenied,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::TemporarilyBlocked => "temporarily_blocked",
            DenialReason::RateLimitExceeded => "rate_limit_exceeded",
            DenialReason::NotFoundOrInactive => "not_found_or_inactive",
            DenialReason::PermissionDenied => "permission_denied",
            DenialReason::RoleAccessDenied => "role_access_denied",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            DenialReason::TemporarilyBlocked => "User is temporarily blocked",
            DenialReason::RateLimitExceeded => "Rate limit exceeded",
            DenialReason::NotFoundOrInactive => "User not found or inactive",
            DenialReason::PermissionDenied => "Permission denied",
            DenialReason::RoleAccessDenied => "Role access denied",
        };
        f.write_str(message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum AccessDecision {
    Granted,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AccessDecision::Granted => None,
            AccessDecision::Denied(reason) => Some(*reason),
        }
    }
}

/// One permission check in an identity's trailing attempt history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessAttempt {
    pub timestamp: DateTime<Utc>,
    pub permission: Permission,
    pub decision: AccessDecision,
}
