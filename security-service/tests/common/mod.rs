//! Shared setup for security-service integration tests.
//!
//! Builds the full component graph over an in-memory directory, a mock
//! notifier and a manual clock.

#![allow(dead_code)]

use async_trait::async_trait;
use security_service::{
    config::SecurityConfig,
    models::{Identity, Permission, Role},
    services::{InMemoryDirectory, ManualClock, MockNotifier, Notifier},
    SecurityState,
};
use service_core::error::AppError;
use std::sync::Arc;

pub const ADMIN: &str = "sagar@zenevo.com";
pub const EMPLOYEE: &str = "rutvik@zenevo.com";
pub const INACTIVE: &str = "former@zenevo.com";

/// Test application with every component wired to the same clock.
pub struct TestApp {
    pub state: SecurityState,
    pub notifier: Arc<MockNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(SecurityConfig::default())
    }

    pub fn with_config(config: SecurityConfig) -> Self {
        init_tracing();

        let notifier = Arc::new(MockNotifier::new());
        let clock = Arc::new(ManualClock::default());
        let state = SecurityState::with_clock(
            config,
            Arc::new(directory()),
            notifier.clone(),
            clock.clone(),
        );

        Self {
            state,
            notifier,
            clock,
        }
    }

    /// The code most recently delivered to `email`.
    pub fn code_for(&self, email: &str) -> String {
        self.notifier
            .last_code_for(email)
            .expect("no code delivered")
    }

    /// A six digit code guaranteed to differ from the one delivered to `email`.
    pub fn wrong_code_for(&self, email: &str) -> String {
        let code = self.code_for(email);
        if code == "000000" {
            "111111".to_string()
        } else {
            "000000".to_string()
        }
    }
}

pub fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new([
        Identity::new("1", ADMIN, ADMIN, Role::Admin, Permission::ALL),
        Identity::new(
            "2",
            EMPLOYEE,
            EMPLOYEE,
            Role::Employee,
            [
                Permission::ViewDashboard,
                Permission::MarkAttendance,
                Permission::ViewHistory,
            ],
        ),
        Identity::new("3", INACTIVE, INACTIVE, Role::Manager, Permission::ALL).deactivated(),
    ])
}

pub fn init_tracing() {
    // Only the first test in a binary installs the subscriber.
    let _ = service_core::observability::init_tracing("security-service-test", "warn");
}

/// Notifier whose delivery path panics.
pub struct PanickingNotifier;

#[async_trait]
impl Notifier for PanickingNotifier {
    async fn send_reset_code(
        &self,
        _to_email: &str,
        _otp: &str,
        _expiry_minutes: i64,
    ) -> Result<(), AppError> {
        panic!("smtp relay exploded");
    }
}
