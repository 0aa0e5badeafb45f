mod common;

use chrono::Duration;
use common::TestApp;
use security_service::{
    config::AuditConfig,
    models::{AuditEvent, AuditEventType, RequestContext, Severity},
    services::{AuditLog, ManualClock, RecordOutcome},
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;

fn denial(username: &str, ip: &str) -> AuditEvent {
    AuditEvent::new(
        AuditEventType::PermissionDenied,
        Severity::Warning,
        "Access denied for permission: MANAGE_USERS",
    )
    .username(username)
    .context(&RequestContext::new().with_ip(ip))
}

#[test]
fn test_six_denials_yield_five_entries_and_one_escalation() {
    let app = TestApp::new();
    let log = &app.state.audit_log;

    for _ in 0..6 {
        log.record(denial("eve", "10.0.0.9"));
    }

    assert_eq!(log.len(), 6);
    assert_eq!(log.by_event_type(AuditEventType::PermissionDenied).len(), 5);
    assert_eq!(log.by_event_type(AuditEventType::RateLimitExceeded).len(), 1);
    assert_eq!(log.flood_stats().get("eve_PERMISSION_DENIED_10.0.0.9"), Some(&6));
}

#[test]
fn test_flood_window_restarts_after_sixty_seconds() {
    let app = TestApp::new();
    let log = &app.state.audit_log;

    for _ in 0..9 {
        log.record(denial("eve", "10.0.0.9"));
    }
    assert_eq!(log.len(), 6);

    app.clock.advance(Duration::seconds(61));
    assert!(matches!(
        log.record(denial("eve", "10.0.0.9")),
        RecordOutcome::Appended(_)
    ));
    assert_eq!(log.flood_stats().get("eve_PERMISSION_DENIED_10.0.0.9"), Some(&1));
}

#[test]
fn test_flood_keys_include_ip() {
    let app = TestApp::new();
    let log = &app.state.audit_log;

    for _ in 0..5 {
        log.record(denial("eve", "10.0.0.9"));
        log.record(denial("eve", "10.0.0.10"));
    }
    assert_eq!(log.by_event_type(AuditEventType::PermissionDenied).len(), 10);
}

#[test]
fn test_recent_is_newest_first() {
    let app = TestApp::new();
    let log = &app.state.audit_log;

    for n in 0..5 {
        log.record(
            AuditEvent::new(AuditEventType::LoginSuccess, Severity::Info, format!("login {}", n))
                .username("sagar@zenevo.com"),
        );
    }

    let recent: Vec<_> = log.recent(3).into_iter().map(|e| e.details).collect();
    assert_eq!(recent, vec!["login 4", "login 3", "login 2"]);
    assert_eq!(log.recent(50).len(), 5);
}

#[test]
fn test_capacity_is_never_exceeded() {
    let clock = Arc::new(ManualClock::default());
    let log = AuditLog::new(
        AuditConfig {
            capacity: 50,
            ..AuditConfig::default()
        },
        clock,
    );

    for n in 0..120 {
        log.record(AuditEvent::new(
            AuditEventType::Logout,
            Severity::Info,
            n.to_string(),
        ));
    }

    assert_eq!(log.len(), 50);
    assert_eq!(log.capacity(), 50);
    let oldest = log.recent(50).pop().unwrap();
    assert_eq!(oldest.details, "70");
}

#[test]
fn test_concurrent_appends_form_one_total_order() {
    let clock = Arc::new(ManualClock::default());
    let log = Arc::new(AuditLog::new(AuditConfig::default(), clock));

    let handles: Vec<_> = (0..8)
        .map(|writer| {
            let log = log.clone();
            thread::spawn(move || {
                for n in 0..200 {
                    log.record(
                        AuditEvent::new(
                            AuditEventType::LoginFailed,
                            Severity::Warning,
                            format!("{}-{}", writer, n),
                        )
                        .username(format!("writer-{}", writer)),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(log.len(), 1000);
    let entries = log.recent(1000);
    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert!(sequences.windows(2).all(|w| w[0] == w[1] + 1));
    assert_eq!(sequences[0], 1600);

    let unique: HashSet<_> = entries.iter().map(|e| e.details.clone()).collect();
    assert_eq!(unique.len(), 1000);

    // Each writer's own entries keep their submission order.
    let mine: Vec<_> = log
        .by_user("writer-3")
        .into_iter()
        .map(|e| e.details)
        .collect();
    let mut sorted = mine.clone();
    sorted.sort_by_key(|d| d.split('-').nth(1).and_then(|n| n.parse::<u32>().ok()));
    assert_eq!(mine, sorted);
}

#[tokio::test]
async fn test_mirror_receives_accepted_entries() {
    let clock = Arc::new(ManualClock::default());
    let (tx, mut rx) = mpsc::channel(16);
    let log = AuditLog::new(AuditConfig::default(), clock).with_mirror(tx);

    for _ in 0..7 {
        log.record(denial("eve", "10.0.0.9"));
    }

    let mut mirrored = Vec::new();
    while let Ok(entry) = rx.try_recv() {
        mirrored.push(entry.event_type);
    }
    assert_eq!(mirrored.len(), 6);
    assert_eq!(mirrored[5], AuditEventType::RateLimitExceeded);
}

#[test]
fn test_closed_mirror_does_not_affect_log() {
    let clock = Arc::new(ManualClock::default());
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let log = AuditLog::new(AuditConfig::default(), clock).with_mirror(tx);

    log.record(AuditEvent::new(AuditEventType::Logout, Severity::Info, "bye"));
    assert_eq!(log.len(), 1);
}

#[test]
fn test_clear_resets_entries_and_flood_counters() {
    let app = TestApp::new();
    let log = &app.state.audit_log;
    for _ in 0..7 {
        log.record(denial("eve", "10.0.0.9"));
    }

    log.clear();
    assert!(log.is_empty());
    assert!(log.flood_stats().is_empty());
    assert!(matches!(
        log.record(denial("eve", "10.0.0.9")),
        RecordOutcome::Appended(_)
    ));
}

#[test]
fn test_filters_preserve_chronological_order() {
    let app = TestApp::new();
    let log = &app.state.audit_log;

    log.record(AuditEvent::new(AuditEventType::LoginSuccess, Severity::Info, "a").username("x"));
    log.record(AuditEvent::new(AuditEventType::Logout, Severity::Info, "b").username("y"));
    log.record(AuditEvent::new(AuditEventType::LoginFailed, Severity::Warning, "c").username("x"));

    let by_user: Vec<_> = log.by_user("x").into_iter().map(|e| e.details).collect();
    assert_eq!(by_user, vec!["a", "c"]);
    let info: Vec<_> = log
        .by_severity(Severity::Info)
        .into_iter()
        .map(|e| e.details)
        .collect();
    assert_eq!(info, vec!["a", "b"]);
}
