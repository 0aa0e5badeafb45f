//! Bounded, flood-controlled security audit log.
//!
//! Entries live in a fixed-capacity ring buffer; once it is full every append
//! evicts the oldest entry. Denial-class events (permission and role denials)
//! are counted per (username, event type, IP) inside a fixed window: the first
//! `flood_threshold` are stored, the next one is replaced by a single
//! `RATE_LIMIT_EXCEEDED` entry, and the rest are dropped until the window
//! expires.
//!
//! Each accepted entry is mirrored to `tracing` and, if attached, to a bounded
//! channel. Neither can affect the log itself.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use super::metrics;
use super::Clock;
use crate::config::AuditConfig;
use crate::models::{AuditEvent, AuditEventType, AuditLogEntry, Severity};

/// What `record` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored under this sequence number.
    Appended(u64),
    /// Replaced by a rate-limit entry stored under this sequence number.
    Suppressed(u64),
    /// Discarded by flood control.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FloodKey {
    username: Option<String>,
    event_type: AuditEventType,
    ip_address: Option<String>,
}

impl fmt::Display for FloodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.username.as_deref().unwrap_or("unknown"),
            self.event_type,
            self.ip_address.as_deref().unwrap_or("unknown"),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct FloodCounter {
    count: u32,
    window_start: DateTime<Utc>,
}

enum FloodVerdict {
    Accept,
    Escalate,
    Drop,
}

#[derive(Debug)]
struct LogState {
    entries: VecDeque<AuditLogEntry>,
    floods: HashMap<FloodKey, FloodCounter>,
    floods_pruned_at: DateTime<Utc>,
    next_sequence: u64,
}

impl LogState {
    fn admit(&mut self, key: FloodKey, now: DateTime<Utc>, config: &AuditConfig) -> FloodVerdict {
        let window = Duration::seconds(config.flood_window_seconds);
        self.prune_floods(now, window);

        let counter = self.floods.entry(key).or_insert(FloodCounter {
            count: 0,
            window_start: now,
        });

        if now - counter.window_start > window {
            *counter = FloodCounter {
                count: 1,
                window_start: now,
            };
        } else {
            counter.count = counter.count.saturating_add(1);
        }

        match counter.count {
            c if c <= config.flood_threshold => FloodVerdict::Accept,
            c if c == config.flood_threshold + 1 => FloodVerdict::Escalate,
            _ => FloodVerdict::Drop,
        }
    }

    /// Drop counters whose window has run out, at most once per window.
    fn prune_floods(&mut self, now: DateTime<Utc>, window: Duration) {
        if now - self.floods_pruned_at <= window {
            return;
        }
        self.floods_pruned_at = now;
        self.floods
            .retain(|_, counter| now - counter.window_start <= window);
    }

    fn append(&mut self, event: AuditEvent, now: DateTime<Utc>, capacity: usize) -> AuditLogEntry {
        let entry = AuditLogEntry::from_event(event, self.next_sequence, now);
        self.next_sequence += 1;

        if self.entries.len() >= capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());
        entry
    }
}

pub struct AuditLog {
    config: AuditConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<LogState>,
    mirror: Option<mpsc::Sender<AuditLogEntry>>,
}

impl AuditLog {
    pub fn new(config: AuditConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.capacity.max(1);
        let now = clock.now();
        Self {
            config: AuditConfig { capacity, ..config },
            clock,
            state: Mutex::new(LogState {
                entries: VecDeque::with_capacity(capacity),
                floods: HashMap::new(),
                floods_pruned_at: now,
                next_sequence: 1,
            }),
            mirror: None,
        }
    }

    /// Also forward every accepted entry to `sender`, best effort.
    pub fn with_mirror(mut self, sender: mpsc::Sender<AuditLogEntry>) -> Self {
        self.mirror = Some(sender);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, event: AuditEvent) -> RecordOutcome {
        let now = self.clock.now();
        let event_type = event.event_type;

        let (outcome, stored) = {
            let mut state = self.lock_state();

            let verdict = if event_type.is_denial() {
                let key = FloodKey {
                    username: event.username.clone(),
                    event_type,
                    ip_address: event.context.ip_address.clone(),
                };
                state.admit(key, now, &self.config)
            } else {
                FloodVerdict::Accept
            };

            match verdict {
                FloodVerdict::Accept => {
                    let entry = state.append(event, now, self.config.capacity);
                    (RecordOutcome::Appended(entry.sequence), Some(entry))
                }
                FloodVerdict::Escalate => {
                    let entry = state.append(rate_limit_event(event), now, self.config.capacity);
                    (RecordOutcome::Suppressed(entry.sequence), Some(entry))
                }
                FloodVerdict::Drop => (RecordOutcome::Dropped, None),
            }
        };

        match &stored {
            Some(entry) => {
                if matches!(outcome, RecordOutcome::Suppressed(_)) {
                    metrics::record_audit_suppressed(event_type);
                }
                metrics::record_audit_event(entry.event_type);
                self.mirror(entry);
            }
            None => metrics::record_audit_suppressed(event_type),
        }

        outcome
    }

    fn mirror(&self, entry: &AuditLogEntry) {
        let username = entry.username.as_deref().unwrap_or("unknown");
        let ip = entry.ip_address.as_deref().unwrap_or("unknown");
        match entry.severity {
            Severity::Debug => tracing::debug!(
                sequence = entry.sequence,
                event_type = %entry.event_type,
                username = %username,
                ip = %ip,
                details = %entry.details,
                "Security event"
            ),
            Severity::Info => tracing::info!(
                sequence = entry.sequence,
                event_type = %entry.event_type,
                username = %username,
                ip = %ip,
                details = %entry.details,
                "Security event"
            ),
            Severity::Warning => tracing::warn!(
                sequence = entry.sequence,
                event_type = %entry.event_type,
                username = %username,
                ip = %ip,
                details = %entry.details,
                "Security event"
            ),
            Severity::Error => tracing::error!(
                sequence = entry.sequence,
                event_type = %entry.event_type,
                username = %username,
                ip = %ip,
                details = %entry.details,
                "Security event"
            ),
            Severity::Security => tracing::warn!(
                security = true,
                sequence = entry.sequence,
                event_type = %entry.event_type,
                username = %username,
                ip = %ip,
                details = %entry.details,
                "Security event"
            ),
        }

        if let Some(sender) = &self.mirror {
            if let Err(e) = sender.try_send(entry.clone()) {
                tracing::debug!(
                    sequence = entry.sequence,
                    error = %e,
                    "Audit mirror unavailable, entry kept in memory only"
                );
            }
        }
    }

    /// Newest first, at most `limit` entries.
    pub fn recent(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.lock_state()
            .entries
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn by_user(&self, username: &str) -> Vec<AuditLogEntry> {
        self.filtered(|entry| entry.username.as_deref() == Some(username))
    }

    pub fn by_event_type(&self, event_type: AuditEventType) -> Vec<AuditLogEntry> {
        self.filtered(|entry| entry.event_type == event_type)
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<AuditLogEntry> {
        self.filtered(|entry| entry.severity == severity)
    }

    fn filtered(&self, predicate: impl Fn(&AuditLogEntry) -> bool) -> Vec<AuditLogEntry> {
        self.lock_state()
            .entries
            .iter()
            .filter(|entry| predicate(entry))
            .cloned()
            .collect()
    }

    /// Wipe entries and flood counters. Callers are responsible for
    /// authorizing this.
    pub fn clear(&self) {
        let mut state = self.lock_state();
        state.entries.clear();
        state.floods.clear();
        tracing::info!("Audit log cleared");
    }

    /// Current count per flood key, rendered as `username_EVENT_ip`.
    pub fn flood_stats(&self) -> HashMap<String, u32> {
        self.lock_state()
            .floods
            .iter()
            .map(|(key, counter)| (key.to_string(), counter.count))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }
}

fn rate_limit_event(original: AuditEvent) -> AuditEvent {
    let details = format!(
        "Rate limit exceeded for {}. User: {}, IP: {}",
        original.event_type,
        original.username.as_deref().unwrap_or("unknown"),
        original.context.ip_address.as_deref().unwrap_or("unknown"),
    );

    AuditEvent {
        event_type: AuditEventType::RateLimitExceeded,
        severity: Severity::Warning,
        details,
        ..original
    }
}
