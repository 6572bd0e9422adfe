//! Refresh lifecycle state machine.
//!
//! `Uninitialized -> Idle <-> Refreshing`. The scheduler never holds an error
//! state: every attempt, successful or not, ends in `Idle` with a next attempt
//! scheduled one interval after the attempt started.
//!
//! Time is always injected (`now`), so the machine itself is synchronous and
//! deterministic. Async callers use the two-phase `begin_*`/`complete` API and
//! run the refresh work outside any lock.

use crate::utils::error::{MonitorError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One year.
pub const MAX_INTERVAL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    Uninitialized,
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshState {
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub next_refresh_at: DateTime<Utc>,
    pub interval_seconds: u64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

/// Proof that a refresh was started; hand it back to `complete`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    id: u64,
    pub started_at: DateTime<Utc>,
    pub trigger: RefreshTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ran { success: bool },
    NotDue,
    InFlight,
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    pub phase: RefreshPhase,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub next_refresh_at: DateTime<Utc>,
    pub seconds_remaining: u64,
    pub interval_seconds: u64,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub struct RefreshScheduler {
    phase: RefreshPhase,
    state: RefreshState,
    in_flight: Option<u64>,
    next_ticket_id: u64,
}

impl RefreshScheduler {
    /// The first tick is due immediately: `next_refresh_at` starts at `created_at`.
    pub fn new(interval_seconds: u64, created_at: DateTime<Utc>) -> Result<Self> {
        if interval_seconds == 0 {
            return Err(MonitorError::contract(
                "refresh interval must be a positive number of seconds",
            ));
        }
        // 間隔必須能加到任何可能的 started_at 上而不溢位
        let representable = i64::try_from(interval_seconds)
            .ok()
            .filter(|&secs| secs <= MAX_INTERVAL_SECONDS)
            .and_then(Duration::try_seconds)
            .and_then(|interval| created_at.checked_add_signed(interval))
            .is_some();
        if !representable {
            return Err(MonitorError::contract(format!(
                "refresh interval {}s is too large",
                interval_seconds
            )));
        }

        Ok(Self {
            phase: RefreshPhase::Uninitialized,
            state: RefreshState {
                last_refreshed_at: None,
                next_refresh_at: created_at,
                interval_seconds,
                last_attempt_at: None,
                consecutive_failures: 0,
            },
            in_flight: None,
            next_ticket_id: 0,
        })
    }

    pub fn phase(&self) -> RefreshPhase {
        self.phase
    }

    pub fn state(&self) -> &RefreshState {
        &self.state
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.state.interval_seconds as i64)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.phase != RefreshPhase::Refreshing && now >= self.state.next_refresh_at
    }

    /// Start a scheduled refresh if one is due. `None` means nothing changed.
    pub fn begin_tick(&mut self, now: DateTime<Utc>) -> Option<RefreshTicket> {
        if !self.is_due(now) {
            return None;
        }
        Some(self.start(now, RefreshTrigger::Scheduled))
    }

    /// Start a refresh regardless of schedule. `None` while one is already in flight.
    pub fn begin_forced(&mut self, now: DateTime<Utc>) -> Option<RefreshTicket> {
        if self.phase == RefreshPhase::Refreshing {
            return None;
        }
        Some(self.start(now, RefreshTrigger::Manual))
    }

    fn start(&mut self, now: DateTime<Utc>, trigger: RefreshTrigger) -> RefreshTicket {
        let id = self.next_ticket_id;
        self.next_ticket_id += 1;
        self.in_flight = Some(id);
        self.phase = RefreshPhase::Refreshing;
        self.state.last_attempt_at = Some(now);

        tracing::debug!("Refresh {} started ({:?}) at {}", id, trigger, now);
        RefreshTicket {
            id,
            started_at: now,
            trigger,
        }
    }

    /// Finish the in-flight refresh. Returns `false` for a stale ticket.
    pub fn complete(&mut self, ticket: RefreshTicket, success: bool) -> bool {
        if self.in_flight != Some(ticket.id) {
            tracing::warn!("Ignoring completion of stale refresh ticket {}", ticket.id);
            return false;
        }

        let next = ticket
            .started_at
            .checked_add_signed(self.interval())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if success {
            self.state.last_refreshed_at = Some(ticket.started_at);
            self.state.consecutive_failures = 0;
        } else {
            self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        }
        self.state.next_refresh_at = next;
        self.in_flight = None;
        self.phase = RefreshPhase::Idle;

        tracing::debug!(
            "Refresh {} finished (success: {}), next refresh at {}",
            ticket.id,
            success,
            next
        );
        true
    }

    /// Synchronous scheduled refresh; `refresh` returns whether it succeeded.
    pub fn tick<F>(&mut self, now: DateTime<Utc>, refresh: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        if self.phase == RefreshPhase::Refreshing {
            return TickOutcome::InFlight;
        }
        match self.begin_tick(now) {
            Some(ticket) => self.run(ticket, refresh),
            None => TickOutcome::NotDue,
        }
    }

    pub fn force_refresh<F>(&mut self, now: DateTime<Utc>, refresh: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        match self.begin_forced(now) {
            Some(ticket) => self.run(ticket, refresh),
            None => TickOutcome::InFlight,
        }
    }

    fn run<F>(&mut self, ticket: RefreshTicket, refresh: F) -> TickOutcome
    where
        F: FnOnce() -> bool,
    {
        let success = refresh();
        self.complete(ticket, success);
        TickOutcome::Ran { success }
    }

    /// Whole seconds until the next refresh, rounded up. Never mutates state.
    ///
    /// Before the first refresh this returns the full interval.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u64 {
        if self.phase == RefreshPhase::Uninitialized {
            return self.state.interval_seconds;
        }
        let millis = (self.state.next_refresh_at - now).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> RefreshSnapshot {
        RefreshSnapshot {
            phase: self.phase,
            last_refreshed_at: self.state.last_refreshed_at,
            next_refresh_at: self.state.next_refresh_at,
            seconds_remaining: self.seconds_remaining(now),
            interval_seconds: self.state.interval_seconds,
            consecutive_failures: self.state.consecutive_failures,
        }
    }
}
