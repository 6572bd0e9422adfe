use crate::core::pipeline::RefreshPipeline;
use crate::core::scheduler::{RefreshPhase, RefreshScheduler, RefreshSnapshot, RefreshTicket};
use crate::domain::model::{DisturbanceLevel, RiskReport};
use crate::utils::error::{ErrorSeverity, MonitorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotDue,
    InFlight,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Current level ingested and both tables rebuilt.
    Refreshed(Box<RiskReport>),
    /// Tables rebuilt but the current level is unknown; `last_refreshed_at` did not advance.
    Degraded(Box<RiskReport>),
    /// No report could be built; the previous report is kept.
    Failed {
        message: String,
        severity: ErrorSeverity,
    },
    Skipped(SkipReason),
}

impl RefreshOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Refreshed(_) => "refreshed",
            Self::Degraded(_) => "degraded",
            Self::Failed { .. } => "failed",
            Self::Skipped(SkipReason::NotDue) => "not-due",
            Self::Skipped(SkipReason::InFlight) => "in-flight",
        }
    }

    pub fn report(&self) -> Option<&RiskReport> {
        match self {
            Self::Refreshed(report) | Self::Degraded(report) => Some(report),
            _ => None,
        }
    }

    pub fn ran(&self) -> bool {
        !matches!(self, Self::Skipped(_))
    }
}

/// Latest report plus the refresh countdown, for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub report: RiskReport,
    pub refresh: RefreshSnapshot,
}

/// Drives a `RefreshPipeline` from a `RefreshScheduler`.
///
/// At most one refresh runs at a time; triggers arriving while one is in
/// flight are dropped. The scheduler lock is only held to begin and complete
/// a cycle, never across the pipeline's I/O.
pub struct MonitorEngine<P: RefreshPipeline> {
    pipeline: P,
    scheduler: Mutex<RefreshScheduler>,
    latest: RwLock<Option<RiskReport>>,
}

impl<P: RefreshPipeline> MonitorEngine<P> {
    pub fn new(pipeline: P, interval_seconds: u64, created_at: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            pipeline,
            scheduler: Mutex::new(RefreshScheduler::new(interval_seconds, created_at)?),
            latest: RwLock::new(None),
        })
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    fn scheduler(&self) -> Result<MutexGuard<'_, RefreshScheduler>> {
        lock_scheduler(&self.scheduler)
    }

    /// Refresh if the schedule says so. Safe to call every second.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<RefreshOutcome> {
        let ticket = {
            let mut scheduler = self.scheduler()?;
            if scheduler.phase() == RefreshPhase::Refreshing {
                return Ok(RefreshOutcome::Skipped(SkipReason::InFlight));
            }
            scheduler.begin_tick(now)
        };

        match ticket {
            Some(ticket) => self.execute(ticket).await,
            None => Ok(RefreshOutcome::Skipped(SkipReason::NotDue)),
        }
    }

    /// Refresh now, ignoring the schedule.
    pub async fn force_refresh(&self, now: DateTime<Utc>) -> Result<RefreshOutcome> {
        let ticket = self.scheduler()?.begin_forced(now);
        match ticket {
            Some(ticket) => self.execute(ticket).await,
            None => {
                tracing::debug!("Manual refresh dropped, a refresh is already in flight");
                Ok(RefreshOutcome::Skipped(SkipReason::InFlight))
            }
        }
    }

    async fn execute(&self, ticket: RefreshTicket) -> Result<RefreshOutcome> {
        tracing::info!(
            "🔄 Starting {:?} refresh at {}",
            ticket.trigger,
            ticket.started_at
        );

        let started_at = ticket.started_at;
        let guard = InFlightGuard {
            scheduler: &self.scheduler,
            ticket: Some(ticket),
        };
        let result = self.pipeline.run(started_at).await;

        let outcome = match result {
            Ok(report) => {
                let success = report.current_level.is_some();
                *self.latest.write().await = Some(report.clone());
                if success {
                    RefreshOutcome::Refreshed(Box::new(report))
                } else {
                    RefreshOutcome::Degraded(Box::new(report))
                }
            }
            Err(e) => {
                tracing::error!(
                    "❌ Refresh failed: {} (Category: {:?}, Severity: {:?})",
                    e,
                    e.category(),
                    e.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
                RefreshOutcome::Failed {
                    message: e.to_string(),
                    severity: e.severity(),
                }
            }
        };

        let success = matches!(outcome, RefreshOutcome::Refreshed(_));
        guard.finish(success)?;

        match &outcome {
            RefreshOutcome::Refreshed(report) => tracing::info!(
                "✅ Refreshed: Kp {} now, {} {}",
                fmt_level(report.current_level),
                fmt_level(report.forecast_level),
                report.forecast_label
            ),
            RefreshOutcome::Degraded(report) => tracing::warn!(
                "⚠️ Degraded refresh with {} ingestion issue(s)",
                report.issues.len()
            ),
            _ => {}
        }

        Ok(outcome)
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.scheduler()?.seconds_remaining(now))
    }

    pub fn refresh_snapshot(&self, now: DateTime<Utc>) -> Result<RefreshSnapshot> {
        Ok(self.scheduler()?.snapshot(now))
    }

    pub async fn latest_report(&self) -> Option<RiskReport> {
        self.latest.read().await.clone()
    }

    /// `None` until the first report has been built.
    pub async fn snapshot(&self, now: DateTime<Utc>) -> Result<Option<MonitorSnapshot>> {
        let refresh = self.refresh_snapshot(now)?;
        Ok(self
            .latest_report()
            .await
            .map(|report| MonitorSnapshot { report, refresh }))
    }
}

fn lock_scheduler(
    scheduler: &Mutex<RefreshScheduler>,
) -> Result<MutexGuard<'_, RefreshScheduler>> {
    scheduler.lock().map_err(|_| {
        MonitorError::contract("refresh scheduler lock poisoned by a panicked refresh")
    })
}

/// Ends the in-flight ticket. Dropped without `finish` (the refresh future was
/// cancelled), it completes the ticket as failed so the scheduler returns to Idle.
struct InFlightGuard<'a> {
    scheduler: &'a Mutex<RefreshScheduler>,
    ticket: Option<RefreshTicket>,
}

impl InFlightGuard<'_> {
    fn finish(mut self, success: bool) -> Result<()> {
        if let Some(ticket) = self.ticket.take() {
            lock_scheduler(self.scheduler)?.complete(ticket, success);
        }
        Ok(())
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        tracing::warn!(
            "⚠️ {:?} refresh started at {} was cancelled before completing",
            ticket.trigger,
            ticket.started_at
        );
        if let Ok(mut scheduler) = self.scheduler.lock() {
            scheduler.complete(ticket, false);
        }
    }
}

fn fmt_level(level: Option<DisturbanceLevel>) -> String {
    level
        .map(|l| l.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
