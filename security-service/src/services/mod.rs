//! Services layer for security-service.
//!
//! Audit log, access control and the password reset flow, plus the
//! collaborators they are wired with.

mod access_control;
mod audit_log;
mod clock;
mod directory;
pub mod error;
pub mod metrics;
mod notifier;
pub mod otp;
mod password_reset;

pub use access_control::AccessControl;
pub use audit_log::{AuditLog, RecordOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{IdentityDirectory, InMemoryDirectory};
pub use error::ServiceError;
pub use notifier::{Delivery, MockNotifier, Notifier};
pub use password_reset::PasswordResetService;
