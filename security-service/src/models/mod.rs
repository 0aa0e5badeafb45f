pub mod access_attempt;
pub mod audit_entry;
pub mod identity;
pub mod reset_attempt;

pub use access_attempt::{AccessAttempt, AccessDecision, DenialReason};
pub use audit_entry::{AuditEvent, AuditEventType, AuditLogEntry, RequestContext, Severity};
pub use identity::{Identity, Permission, Role};
pub use reset_attempt::{
    minutes_until, BlockReason, ResetAttempt, ResetBlock, ResetFailure, ResetResult,
    ResetStatus, VerifyResult, OTP_LENGTH,
};
