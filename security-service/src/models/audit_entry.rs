//! Audit log entry model - security event record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Security event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailed,
    Logout,
    PermissionDenied,
    RoleAccessDenied,
    PasswordResetRequested,
    PasswordResetSuccess,
    PasswordResetFailed,
    SuspiciousActivity,
    RateLimitExceeded,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::LoginSuccess => "LOGIN_SUCCESS",
            AuditEventType::LoginFailed => "LOGIN_FAILED",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::PermissionDenied => "PERMISSION_DENIED",
            AuditEventType::RoleAccessDenied => "ROLE_ACCESS_DENIED",
            AuditEventType::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
            AuditEventType::PasswordResetSuccess => "PASSWORD_RESET_SUCCESS",
            AuditEventType::PasswordResetFailed => "PASSWORD_RESET_FAILED",
            AuditEventType::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            AuditEventType::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }

    /// Denial-class events go through flood control before they are stored.
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            AuditEventType::PermissionDenied | AuditEventType::RoleAccessDenied
        )
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit severity, ordered from least to most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Security,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Security => "security",
        }
    }
}

/// Caller-supplied request context, copied verbatim into audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// An event submitted to the audit log. The log stamps it on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: Severity,
    pub details: String,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub context: RequestContext,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, severity: Severity, details: impl Into<String>) -> Self {
        Self {
            event_type,
            severity,
            details: details.into(),
            user_id: None,
            username: None,
            context: RequestContext::default(),
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn context(mut self, context: &RequestContext) -> Self {
        self.context = context.clone();
        self
    }
}

/// A stored audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Position in the log's total order; strictly increasing.
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub event_type: AuditEventType,
    pub details: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub severity: Severity,
    pub session_id: Option<String>,
}

impl AuditLogEntry {
    pub(crate) fn from_event(event: AuditEvent, sequence: u64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence,
            timestamp,
            user_id: event.user_id,
            username: event.username,
            event_type: event.event_type,
            details: event.details,
            ip_address: event.context.ip_address,
            user_agent: event.context.user_agent,
            severity: event.severity,
            session_id: event.context.session_id,
        }
    }
}

impl fmt::Display for AuditLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} - User: {} ({}) - {} - IP: {}",
            self.timestamp.format("%b %d, %Y %H:%M:%S"),
            self.event_type,
            self.username.as_deref().unwrap_or("Unknown"),
            self.user_id.as_deref().unwrap_or("N/A"),
            self.details,
            self.ip_address.as_deref().unwrap_or("N/A"),
        )
    }
}
