mod common;

use chrono::Duration;
use common::{TestApp, ADMIN, EMPLOYEE, INACTIVE};
use security_service::models::{
    AccessDecision, AuditEventType, DenialReason, Permission, RequestContext, Role,
};
use std::thread;

fn ctx() -> RequestContext {
    RequestContext::new()
        .with_ip("192.168.1.20")
        .with_user_agent("ats-android/2.1")
        .with_session("session-42")
}

#[test]
fn test_permission_checks_follow_directory() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    assert!(access.check_permission(ADMIN, Permission::ManageRoles, &ctx()));
    assert!(access.check_permission(EMPLOYEE, Permission::ViewHistory, &ctx()));
    assert!(!access.check_permission(EMPLOYEE, Permission::ViewSecurityLogs, &ctx()));
    assert!(!access.check_permission(INACTIVE, Permission::ViewDashboard, &ctx()));
    assert!(!access.check_permission("ghost@zenevo.com", Permission::ViewDashboard, &ctx()));

    let denials = app
        .state
        .audit_log
        .by_event_type(AuditEventType::PermissionDenied);
    assert_eq!(denials.len(), 3);
    assert_eq!(denials[0].user_agent.as_deref(), Some("ats-android/2.1"));
    assert_eq!(denials[0].session_id.as_deref(), Some("session-42"));
    assert!(denials[1].details.ends_with("User not found or inactive"));
}

#[test]
fn test_role_hierarchy() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for role in [Role::Employee, Role::Manager, Role::HrManager, Role::Admin] {
        assert!(access.check_role_access(ADMIN, role, &ctx()));
    }
    assert!(access.check_role_access(EMPLOYEE, Role::Employee, &ctx()));
    assert!(!access.check_role_access(EMPLOYEE, Role::HrManager, &ctx()));
    assert_eq!(
        access.authorize_role(INACTIVE, Role::Employee, &ctx()),
        AccessDecision::Denied(DenialReason::NotFoundOrInactive)
    );
}

#[test]
fn test_tenth_check_blocks_and_eleventh_is_temporarily_blocked() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for _ in 0..9 {
        assert!(access.check_permission(ADMIN, Permission::ViewDashboard, &ctx()));
    }
    assert!(!access.check_permission(ADMIN, Permission::ViewDashboard, &ctx()));
    assert_eq!(
        access.authorize_permission(ADMIN, Permission::ViewDashboard, &ctx()),
        AccessDecision::Denied(DenialReason::TemporarilyBlocked)
    );
    assert!(access.blocked_identities().contains_key(ADMIN));

    // Other identities are unaffected.
    assert!(access.check_permission(EMPLOYEE, Permission::ViewDashboard, &ctx()));

    let suspicious = app
        .state
        .audit_log
        .by_event_type(AuditEventType::SuspiciousActivity);
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].details, "User blocked due to rate limiting");
    assert_eq!(suspicious[0].username.as_deref(), Some(ADMIN));
}

#[test]
fn test_block_ignores_membership_until_expiry() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for _ in 0..10 {
        access.check_permission(EMPLOYEE, Permission::MarkAttendance, &ctx());
    }

    app.clock.advance(Duration::minutes(4));
    assert_eq!(
        access.authorize_permission(EMPLOYEE, Permission::MarkAttendance, &ctx()),
        AccessDecision::Denied(DenialReason::TemporarilyBlocked)
    );
    assert_eq!(
        access.authorize_role(EMPLOYEE, Role::Employee, &ctx()),
        AccessDecision::Denied(DenialReason::TemporarilyBlocked)
    );

    app.clock.advance(Duration::minutes(1));
    assert!(access.check_permission(EMPLOYEE, Permission::MarkAttendance, &ctx()));
}

#[test]
fn test_repeated_denials_are_flood_controlled() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for _ in 0..8 {
        assert!(!access.check_permission(EMPLOYEE, Permission::ManageUsers, &ctx()));
    }

    let log = &app.state.audit_log;
    assert_eq!(log.by_event_type(AuditEventType::PermissionDenied).len(), 5);
    let escalations = log.by_event_type(AuditEventType::RateLimitExceeded);
    assert_eq!(escalations.len(), 1);
    assert_eq!(
        escalations[0].details,
        format!(
            "Rate limit exceeded for PERMISSION_DENIED. User: {}, IP: 192.168.1.20",
            EMPLOYEE
        )
    );
}

#[test]
fn test_role_checks_never_count_towards_block() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for _ in 0..30 {
        access.check_role_access(EMPLOYEE, Role::Employee, &ctx());
    }
    assert!(access.attempts(EMPLOYEE).is_empty());
    assert!(access.check_permission(EMPLOYEE, Permission::ViewDashboard, &ctx()));
}

#[test]
fn test_unblock_restores_access_without_audit() {
    let app = TestApp::new();
    let access = &app.state.access_control;

    for _ in 0..10 {
        access.check_permission(ADMIN, Permission::ViewReports, &ctx());
    }
    let before = app.state.audit_log.len();

    assert!(access.unblock(ADMIN));
    access.clear_attempts();
    assert_eq!(app.state.audit_log.len(), before);
    assert!(access.check_permission(ADMIN, Permission::ViewReports, &ctx()));
}

#[test]
fn test_identity_passthrough() {
    let app = TestApp::new();
    let identity = app.state.access_control.identity(INACTIVE).unwrap();
    assert!(!identity.active);
    assert_eq!(identity.role, Role::Manager);
    assert!(app.state.access_control.identity("ghost@zenevo.com").is_none());
}

#[test]
fn test_concurrent_checks_grant_at_most_nine() {
    let app = TestApp::new();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let access = app.state.access_control.clone();
            thread::spawn(move || access.authorize_permission(ADMIN, Permission::ViewDashboard, &ctx()))
        })
        .collect();
    let decisions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let granted = decisions.iter().filter(|d| d.is_granted()).count();
    let tripped = decisions
        .iter()
        .filter(|d| d.denial_reason() == Some(DenialReason::RateLimitExceeded))
        .count();
    assert_eq!(granted, 9);
    assert_eq!(tripped, 1);
    assert_eq!(app.state.access_control.attempts(ADMIN).len(), 32);
}
