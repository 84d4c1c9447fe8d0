//! Background jobs
//!
//! Jobs are registered on a [`Scheduler`] with a daily UTC fire time. Jobs
//! flagged `run_immediately` run once, in registration order, before any
//! schedule starts; a failure there aborts startup.

pub mod settlement;

pub use settlement::SettlementJob;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use dbc_common::Clock;

use crate::error::{Error, Result};

/// Unit of scheduled work
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

/// When a job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at `hour:minute` UTC
    DailyAt { hour: u32, minute: u32 },
}

impl Schedule {
    /// First fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::DailyAt { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0)
                    .unwrap_or(NaiveTime::MIN);
                let today = now.date_naive().and_time(time).and_utc();
                if today > now {
                    today
                } else {
                    today.checked_add_days(Days::new(1)).unwrap_or(today)
                }
            }
        }
    }

    /// Next fire time given the previous one
    ///
    /// Never at or before `previous`, so a clock that lags behind the timer
    /// cannot fire the same slot twice.
    pub fn next_fire(
        &self,
        previous: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.next_after(previous.map_or(now, |previous| previous.max(now)))
    }
}

struct Entry {
    job: Arc<dyn Job>,
    schedule: Schedule,
    run_immediately: bool,
}

/// Runs registered jobs on their schedules
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    entries: Vec<Entry>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Vec::new(),
            handles: Vec::new(),
        }
    }

    pub fn register(&mut self, job: Arc<dyn Job>, schedule: Schedule, run_immediately: bool) {
        info!(job = job.name(), ?schedule, run_immediately, "Job registered");
        self.entries.push(Entry {
            job,
            schedule,
            run_immediately,
        });
    }

    /// Run the immediate jobs, then spawn one task per job
    pub async fn start(&mut self) -> Result<()> {
        for entry in self.entries.iter().filter(|e| e.run_immediately) {
            run_job(entry.job.as_ref()).await.map_err(|e| Error::Job {
                name: entry.job.name().to_string(),
                source: Box::new(e),
            })?;
        }

        for entry in &self.entries {
            let job = Arc::clone(&entry.job);
            let clock = Arc::clone(&self.clock);
            let schedule = entry.schedule;

            self.handles.push(tokio::spawn(async move {
                let mut last = None;
                loop {
                    let now = clock.now();
                    let next = schedule.next_fire(last, now);
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    debug!(job = job.name(), %next, "Waiting for next run");
                    tokio::time::sleep(wait).await;

                    if let Err(e) = run_job(job.as_ref()).await {
                        error!(job = job.name(), error = %e, "Scheduled job failed");
                    }
                    last = Some(next);
                }
            }));
        }

        info!(jobs = self.entries.len(), "Scheduler started");
        Ok(())
    }

    /// Stop every scheduled task
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handles.iter().any(|h| !h.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_job(job: &dyn Job) -> Result<()> {
    debug!(job = job.name(), "Job started");
    job.run().await?;
    debug!(job = job.name(), "Job finished");
    Ok(())
}
