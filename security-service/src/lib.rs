pub mod config;
pub mod models;
pub mod services;

use std::sync::Arc;

use crate::config::SecurityConfig;
use crate::services::{
    AccessControl, AuditLog, Clock, IdentityDirectory, Notifier, PasswordResetService,
    SystemClock,
};

/// The component graph owned by the hosting application.
///
/// One audit log is shared by reference between access control and the
/// password reset flow; nothing in the crate keeps global state.
#[derive(Clone)]
pub struct SecurityState {
    pub config: SecurityConfig,
    pub audit_log: Arc<AuditLog>,
    pub access_control: Arc<AccessControl>,
    pub password_reset: Arc<PasswordResetService>,
}

impl SecurityState {
    pub fn new(
        config: SecurityConfig,
        directory: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_clock(config, directory, notifier, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: SecurityConfig,
        directory: Arc<dyn IdentityDirectory>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let audit_log = Arc::new(AuditLog::new(config.audit.clone(), clock.clone()));
        let access_control = Arc::new(AccessControl::new(
            config.access.clone(),
            directory,
            audit_log.clone(),
            clock.clone(),
        ));
        let password_reset = Arc::new(PasswordResetService::new(
            config.reset.clone(),
            notifier,
            audit_log.clone(),
            clock,
        ));

        tracing::info!(
            audit_capacity = config.audit.capacity,
            "Security components initialized"
        );

        Self {
            config,
            audit_log,
            access_control,
            password_reset,
        }
    }
}
