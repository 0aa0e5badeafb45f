//! Permission and role checks with per-identity attempt limiting.
//!
//! Permission checks are tracked in a trailing window per username. The check
//! that brings the window to `max_attempts_per_window` blocks the identity for
//! `block_duration_seconds`. Role checks honour an existing block but never
//! read or write the attempt history.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use super::metrics;
use super::{AuditLog, Clock, IdentityDirectory};
use crate::config::AccessConfig;
use crate::models::{
    AccessAttempt, AccessDecision, AuditEvent, AuditEventType, DenialReason, Identity,
    Permission, RequestContext, Role, Severity,
};

pub struct AccessControl {
    config: AccessConfig,
    directory: Arc<dyn IdentityDirectory>,
    audit_log: Arc<AuditLog>,
    clock: Arc<dyn Clock>,
    attempts: DashMap<String, VecDeque<AccessAttempt>>,
    blocked: DashMap<String, DateTime<Utc>>,
    last_sweep: Mutex<DateTime<Utc>>,
}

impl AccessControl {
    pub fn new(
        config: AccessConfig,
        directory: Arc<dyn IdentityDirectory>,
        audit_log: Arc<AuditLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let last_sweep = Mutex::new(clock.now());
        Self {
            config,
            directory,
            audit_log,
            clock,
            attempts: DashMap::new(),
            blocked: DashMap::new(),
            last_sweep,
        }
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.attempt_window_seconds)
    }

    pub fn check_permission(
        &self,
        username: &str,
        permission: Permission,
        context: &RequestContext,
    ) -> bool {
        self.authorize_permission(username, permission, context)
            .is_granted()
    }

    #[tracing::instrument(skip(self, context), fields(permission = %permission))]
    pub fn authorize_permission(
        &self,
        username: &str,
        permission: Permission,
        context: &RequestContext,
    ) -> AccessDecision {
        let now = self.clock.now();
        self.sweep(now);

        // Resolved up front so the directory is never called under a shard lock.
        let identity = self.resolve(username);

        let decision = {
            // The entry guard serializes concurrent checks for this username.
            let mut history = self.attempts.entry(username.to_string()).or_default();
            trim(&mut history, now, self.window());

            let decision = if self.is_blocked(username, now) {
                AccessDecision::Denied(DenialReason::TemporarilyBlocked)
            } else if history.len() + 1 >= self.config.max_attempts_per_window {
                let until = now + Duration::seconds(self.config.block_duration_seconds);
                self.blocked.insert(username.to_string(), until);
                AccessDecision::Denied(DenialReason::RateLimitExceeded)
            } else {
                match &identity {
                    Some(identity) if identity.has_permission(permission) => {
                        AccessDecision::Granted
                    }
                    Some(_) => AccessDecision::Denied(DenialReason::PermissionDenied),
                    None => AccessDecision::Denied(DenialReason::NotFoundOrInactive),
                }
            };

            history.push_back(AccessAttempt {
                timestamp: now,
                permission,
                decision,
            });
            tracing::debug!(
                granted = decision.is_granted(),
                recent_attempts = history.len(),
                "Access attempt recorded"
            );
            decision
        };

        match decision.denial_reason() {
            None => {}
            Some(DenialReason::RateLimitExceeded) => self.report_block(username, context),
            Some(DenialReason::PermissionDenied) => self.audit_denial(
                AuditEventType::PermissionDenied,
                identity.as_ref().map(|identity| identity.id.as_str()),
                username,
                format!("Access denied for permission: {}", permission),
                context,
            ),
            Some(reason) => self.audit_denial(
                AuditEventType::PermissionDenied,
                None,
                username,
                format!("Access denied for permission: {} - {}", permission, reason),
                context,
            ),
        }

        record_decision(decision);
        decision
    }

    pub fn check_role_access(
        &self,
        username: &str,
        required_role: Role,
        context: &RequestContext,
    ) -> bool {
        self.authorize_role(username, required_role, context)
            .is_granted()
    }

    #[tracing::instrument(skip(self, context), fields(required_role = %required_role))]
    pub fn authorize_role(
        &self,
        username: &str,
        required_role: Role,
        context: &RequestContext,
    ) -> AccessDecision {
        let now = self.clock.now();
        self.sweep(now);

        let decision = if self.is_blocked(username, now) {
            let reason = DenialReason::TemporarilyBlocked;
            self.audit_denial(
                AuditEventType::RoleAccessDenied,
                None,
                username,
                format!("Role: {} - {}", required_role, reason),
                context,
            );
            AccessDecision::Denied(reason)
        } else {
            match self.resolve(username) {
                Some(identity) if identity.role.satisfies(required_role) => AccessDecision::Granted,
                Some(identity) => {
                    self.audit_denial(
                        AuditEventType::RoleAccessDenied,
                        Some(&identity.id),
                        username,
                        format!("Role: {}", required_role),
                        context,
                    );
                    AccessDecision::Denied(DenialReason::RoleAccessDenied)
                }
                None => {
                    self.audit_denial(
                        AuditEventType::RoleAccessDenied,
                        None,
                        username,
                        format!(
                            "Role: {} - {}",
                            required_role,
                            DenialReason::NotFoundOrInactive
                        ),
                        context,
                    );
                    AccessDecision::Denied(DenialReason::NotFoundOrInactive)
                }
            }
        };

        record_decision(decision);
        decision
    }

    /// Active identity for `username`, if the directory has one.
    fn resolve(&self, username: &str) -> Option<Identity> {
        self.directory
            .lookup(username)
            .filter(|identity| identity.active)
    }

    fn is_blocked(&self, username: &str, now: DateTime<Utc>) -> bool {
        self.blocked
            .get(username)
            .map(|until| now < *until)
            .unwrap_or(false)
    }

    fn report_block(&self, username: &str, context: &RequestContext) {
        metrics::record_identity_block();
        tracing::warn!(username = %username, "Identity blocked due to rate limiting");
        self.audit_log.record(
            AuditEvent::new(
                AuditEventType::SuspiciousActivity,
                Severity::Warning,
                "User blocked due to rate limiting",
            )
            .username(username)
            .context(context),
        );
    }

    /// Drop idle histories and expired blocks, at most once per attempt window.
    ///
    /// Must not be called while holding a guard on either map.
    fn sweep(&self, now: DateTime<Utc>) {
        let window = self.window();
        {
            let mut last = self
                .last_sweep
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if now - *last <= window {
                return;
            }
            *last = now;
        }

        self.attempts.retain(|_, history| {
            trim(history, now, window);
            !history.is_empty()
        });
        self.blocked.retain(|_, until| now < *until);
        tracing::debug!(
            tracked = self.attempts.len(),
            blocked = self.blocked.len(),
            "Swept idle access state"
        );
    }

    fn audit_denial(
        &self,
        event_type: AuditEventType,
        user_id: Option<&str>,
        username: &str,
        details: String,
        context: &RequestContext,
    ) {
        let mut event = AuditEvent::new(event_type, Severity::Warning, details)
            .username(username)
            .context(context);
        if let Some(id) = user_id {
            event = event.user_id(id);
        }
        self.audit_log.record(event);
    }

    /// Lift a block early. Returns whether one was in place.
    pub fn unblock(&self, username: &str) -> bool {
        let removed = self.blocked.remove(username).is_some();
        if removed {
            tracing::info!(username = %username, "Identity unblocked");
        }
        removed
    }

    pub fn clear_attempts(&self) {
        self.attempts.clear();
    }

    pub fn clear_blocks(&self) {
        self.blocked.clear();
    }

    /// Attempts for `username` that fall inside the trailing window.
    pub fn attempts(&self, username: &str) -> Vec<AccessAttempt> {
        let now = self.clock.now();
        let window = self.window();
        self.attempts
            .get(username)
            .map(|history| {
                history
                    .iter()
                    .filter(|attempt| now - attempt.timestamp < window)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Identities whose block has not yet expired, with their expiry.
    pub fn blocked_identities(&self) -> HashMap<String, DateTime<Utc>> {
        let now = self.clock.now();
        self.blocked
            .iter()
            .filter(|entry| now < *entry.value())
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn identity(&self, username: &str) -> Option<Identity> {
        self.directory.lookup(username)
    }
}

fn trim(history: &mut VecDeque<AccessAttempt>, now: DateTime<Utc>, window: Duration) {
    while history
        .front()
        .is_some_and(|attempt| now - attempt.timestamp >= window)
    {
        history.pop_front();
    }
}

fn record_decision(decision: AccessDecision) {
    if let AccessDecision::Denied(reason) = decision {
        metrics::record_access_denied(reason);
    }
}
