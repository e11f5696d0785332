//! Issuer instance health tracking.
//!
//! # Health states
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 INSTANCE HEALTH STATE MACHINE                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │        failure                 failures >= threshold            │
//! │  ┌──────────┐          ┌───────────┐          ┌──────────┐      │
//! │  │  ALIVE   │ ───────► │ SUSPECTED │ ───────► │   DEAD   │      │
//! │  │ (in use) │          │ (in use)  │          │ (skipped)│      │
//! │  └──────────┘          └───────────┘          └──────────┘      │
//! │        ▲                     │                      │           │
//! │        │       success       │     window elapsed  │           │
//! │        └─────────────────────┴──────────◄──────────┘           │
//! │                                        (probe again)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions are monotonic within one observation window: an instance only
//! worsens until either a call succeeds or the window elapses and the dead
//! mark expires. Health is inferred from call outcomes on the request path;
//! an external health checker can force recovery via
//! [`IssuerFailoverPool::record_recovery`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One deployed instance of the token-issuing backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerInstance {
    /// Stable identifier, used as the health-record key.
    pub id: String,
    /// Base URL of the instance.
    pub base_url: String,
}

impl IssuerInstance {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>) -> Self {
        IssuerInstance {
            id: id.into(),
            base_url: base_url.into(),
        }
    }
}

/// Observed health of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceHealth {
    /// No recent failures; first pick.
    Alive,
    /// Recent failures below the threshold; still tried.
    Suspected,
    /// Threshold reached; skipped until the observation window elapses.
    Dead,
}

impl std::fmt::Display for InstanceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceHealth::Alive => write!(f, "alive"),
            InstanceHealth::Suspected => write!(f, "suspected"),
            InstanceHealth::Dead => write!(f, "dead"),
        }
    }
}

/// Pool behavior configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Failures within the window before an instance is marked dead.
    pub failure_threshold: u32,
    /// How long a dead mark holds before the instance is probed again.
    pub observation_window: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            observation_window: Duration::from_secs(30),
        }
    }
}

/// Per-instance health record.
struct HealthRecord {
    health: InstanceHealth,
    /// Failures observed in the current window.
    failure_count: AtomicU32,
    /// When the instance was marked dead.
    marked_dead_at: Option<Instant>,
}

impl HealthRecord {
    fn new() -> Self {
        Self {
            health: InstanceHealth::Alive,
            failure_count: AtomicU32::new(0),
            marked_dead_at: None,
        }
    }
}

/// Tracks redundant issuer instances and routes around dead ones.
///
/// Shared by all in-flight requests; record-level synchronization only, so
/// unrelated requests never serialize on each other.
pub struct IssuerFailoverPool {
    instances: Vec<IssuerInstance>,
    records: RwLock<HashMap<String, HealthRecord>>,
    config: PoolConfig,
}

impl IssuerFailoverPool {
    pub fn new(instances: Vec<IssuerInstance>, config: PoolConfig) -> Self {
        IssuerFailoverPool {
            instances,
            records: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Instances to try for one translation request, in declaration order,
    /// skipping those marked dead within the current observation window. A
    /// dead instance whose window has elapsed is included again as a probe.
    pub fn candidates(&self) -> Vec<IssuerInstance> {
        let mut records = self.records.write();
        self.instances
            .iter()
            .filter(|instance| {
                let record = records
                    .entry(instance.id.clone())
                    .or_insert_with(HealthRecord::new);
                match record.health {
                    InstanceHealth::Alive | InstanceHealth::Suspected => true,
                    InstanceHealth::Dead => match record.marked_dead_at {
                        Some(marked_at) if marked_at.elapsed() >= self.config.observation_window => {
                            info!(instance = %instance.id, "dead mark expired, probing instance again");
                            record.health = InstanceHealth::Suspected;
                            record.failure_count.store(
                                self.config.failure_threshold.saturating_sub(1),
                                Ordering::Relaxed,
                            );
                            record.marked_dead_at = None;
                            true
                        }
                        Some(_) => {
                            debug!(instance = %instance.id, "skipping dead instance");
                            false
                        }
                        // Dead without a timestamp cannot expire; treat as live.
                        None => true,
                    },
                }
            })
            .cloned()
            .collect()
    }

    /// Records a failed call (timeout, connection error, 5xx or zombie).
    pub fn record_failure(&self, instance_id: &str) {
        let mut records = self.records.write();
        let record = records
            .entry(instance_id.to_string())
            .or_insert_with(HealthRecord::new);

        let failures = record.failure_count.fetch_add(1, Ordering::Relaxed) + 1;

        match record.health {
            InstanceHealth::Alive => {
                record.health = InstanceHealth::Suspected;
                debug!(instance = instance_id, failures, "instance suspected");
            }
            InstanceHealth::Suspected | InstanceHealth::Dead => {}
        }

        if failures >= self.config.failure_threshold && record.health != InstanceHealth::Dead {
            warn!(
                instance = instance_id,
                failures,
                threshold = self.config.failure_threshold,
                window_secs = self.config.observation_window.as_secs(),
                "instance marked dead"
            );
            record.health = InstanceHealth::Dead;
            record.marked_dead_at = Some(Instant::now());
        }
    }

    /// Records a successful call; resets the instance to alive.
    pub fn record_success(&self, instance_id: &str) {
        let mut records = self.records.write();
        let record = records
            .entry(instance_id.to_string())
            .or_insert_with(HealthRecord::new);

        if record.health != InstanceHealth::Alive {
            info!(instance = instance_id, "instance recovered");
        }
        record.health = InstanceHealth::Alive;
        record.failure_count.store(0, Ordering::Relaxed);
        record.marked_dead_at = None;
    }

    /// External health-check hook: force an instance back to alive.
    pub fn record_recovery(&self, instance_id: &str) {
        self.record_success(instance_id);
    }

    /// Observed health of one instance.
    pub fn health(&self, instance_id: &str) -> InstanceHealth {
        self.records
            .read()
            .get(instance_id)
            .map(|record| record.health)
            .unwrap_or(InstanceHealth::Alive)
    }

    /// Total number of configured instances, live or not.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}
