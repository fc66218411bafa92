//! Shared scheduler status for the /health endpoint.
//! Updated by the scheduler, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use crate::scheduler::RunReport;

#[derive(Default)]
pub struct HealthState {
    /// True while a scheduler run holds the run guard.
    running: AtomicBool,
    /// Nanosecond timestamps of the latest run (0 = none yet).
    last_run_started_at_ns: AtomicI64,
    last_run_finished_at_ns: AtomicI64,
    runs_completed: AtomicU64,
    last_queries_processed: AtomicU64,
    last_queries_failed: AtomicU64,
    last_observations_recorded: AtomicU64,
    last_persistence_failures: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub running: bool,
    pub last_run_started_at: Option<i64>,
    pub last_run_finished_at: Option<i64>,
    pub runs_completed: u64,
    pub last_queries_processed: u64,
    pub last_queries_failed: u64,
    pub last_observations_recorded: u64,
    pub last_persistence_failures: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_started(&self, at_ns: i64) {
        self.running.store(true, Ordering::Relaxed);
        self.last_run_started_at_ns.store(at_ns, Ordering::Relaxed);
    }

    pub fn run_finished(&self, report: &RunReport, at_ns: i64) {
        self.last_queries_processed
            .store(report.queries_processed as u64, Ordering::Relaxed);
        self.last_queries_failed
            .store(report.queries_failed as u64, Ordering::Relaxed);
        self.last_observations_recorded
            .store(report.observations_recorded as u64, Ordering::Relaxed);
        self.last_persistence_failures
            .store(report.persistence_failures as u64, Ordering::Relaxed);
        self.last_run_finished_at_ns.store(at_ns, Ordering::Relaxed);
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let ts = |v: &AtomicI64| Some(v.load(Ordering::Relaxed)).filter(|t| *t > 0);
        HealthSnapshot {
            running: self.is_running(),
            last_run_started_at: ts(&self.last_run_started_at_ns),
            last_run_finished_at: ts(&self.last_run_finished_at_ns),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            last_queries_processed: self.last_queries_processed.load(Ordering::Relaxed),
            last_queries_failed: self.last_queries_failed.load(Ordering::Relaxed),
            last_observations_recorded: self.last_observations_recorded.load(Ordering::Relaxed),
            last_persistence_failures: self.last_persistence_failures.load(Ordering::Relaxed),
        }
    }
}
