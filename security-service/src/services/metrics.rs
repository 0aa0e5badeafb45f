//! Counters for security decisions, emitted through the `metrics` facade.

use metrics::counter;

use crate::models::{AuditEventType, BlockReason, DenialReason};

pub fn record_audit_event(event_type: AuditEventType) {
    counter!("audit_events_total", "event_type" => event_type.as_str()).increment(1);
}

pub fn record_audit_suppressed(event_type: AuditEventType) {
    counter!("audit_events_suppressed_total", "event_type" => event_type.as_str()).increment(1);
}

pub fn record_access_denied(reason: DenialReason) {
    counter!("access_denied_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_identity_block() {
    counter!("identity_blocks_total").increment(1);
}

pub fn record_reset_lockout(reason: BlockReason) {
    counter!("password_reset_lockouts_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_reset_request(outcome: &'static str) {
    counter!("password_reset_requests_total", "outcome" => outcome).increment(1);
}
