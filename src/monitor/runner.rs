//! Poll loop wiring log source, windows, thresholds and notifications

use std::future::Future;

use chrono::Utc;

use super::session::MonitorSession;
use crate::alerts::{Alert, NotificationSink};
use crate::config::MonitorConfig;
use crate::ingest::{Action, Event, IngestError, LogSource};
use crate::storage::{CursorStore, PersistenceError};
use crate::window::{day_of, WindowKey};

/// Where the loop is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Polling,
    Processing,
    Persisting,
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Events returned by the log source
    pub fetched: usize,
    /// TAKE events on tracked items
    pub tracked: usize,
    pub alerts_sent: usize,
    pub delivery_failures: usize,
    /// Cursor after the batch
    pub cursor: u64,
}

/// Single-threaded watcher loop
///
/// One cycle fetches everything above the cursor, processes it in id order and
/// persists the cursor once. Cycles never overlap.
pub struct MonitorLoop<L, N, C> {
    config: MonitorConfig,
    source: L,
    notifier: N,
    store: C,
    session: MonitorSession,
    cursor: u64,
    phase: MonitorPhase,
}

impl<L, N, C> MonitorLoop<L, N, C>
where
    L: LogSource,
    N: NotificationSink,
    C: CursorStore,
{
    /// Create a loop resuming from the store's cursor
    ///
    /// An unreadable cursor restarts from 0: events may be re-alerted, never lost.
    pub fn new(config: MonitorConfig, source: L, notifier: N, store: C) -> Self {
        let cursor = match store.load() {
            Ok(cursor) => cursor,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read persisted cursor, starting from 0");
                0
            }
        };

        Self {
            session: MonitorSession::new(config.window),
            config,
            source,
            notifier,
            store,
            cursor,
            phase: MonitorPhase::Idle,
        }
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn session(&self) -> &MonitorSession {
        &self.session
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    fn set_phase(&mut self, phase: MonitorPhase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "Monitor phase");
        self.phase = phase;
    }

    /// Run cycles until `shutdown` resolves
    ///
    /// Shutdown is only observed between cycles, so a started cycle always
    /// reaches its persist step. Cycle errors are logged and never end the loop.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!(cursor = self.cursor, "Monitor started");
        tokio::pin!(shutdown);

        loop {
            match self.run_cycle().await {
                Ok(report) if report.fetched > 0 => {
                    tracing::info!(
                        fetched = report.fetched,
                        tracked = report.tracked,
                        alerts = report.alerts_sent,
                        failures = report.delivery_failures,
                        cursor = report.cursor,
                        "Cycle complete"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, cursor = self.cursor, "Monitor cycle failed");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = &mut shutdown => {
                    tracing::info!(cursor = self.cursor, "Monitor shutting down");
                    break;
                }
            }
        }
    }

    /// Fetch, process and persist one batch
    pub async fn run_cycle(&mut self) -> Result<CycleReport, MonitorError> {
        self.set_phase(MonitorPhase::Polling);

        if self.config.evict_stale_days {
            let today = day_of(&Utc::now().with_timezone(&self.config.timezone));
            let (windows, alerted) = self.session.evict_before(&today);
            if windows + alerted > 0 {
                tracing::debug!(windows, alerted, today = %today, "Evicted stale days");
            }
        }

        let events = match self.source.fetch_since(self.cursor) {
            Ok(events) => events,
            Err(e) => {
                self.set_phase(MonitorPhase::Idle);
                return Err(e.into());
            }
        };

        self.set_phase(MonitorPhase::Processing);
        let mut report = CycleReport {
            fetched: events.len(),
            ..Default::default()
        };
        for event in &events {
            self.process_event(event, &mut report).await;
        }
        report.cursor = self.cursor;

        self.set_phase(MonitorPhase::Persisting);
        let persisted = self.store.save(self.cursor);
        self.set_phase(MonitorPhase::Idle);
        persisted?;

        Ok(report)
    }

    async fn process_event(&mut self, event: &Event, report: &mut CycleReport) {
        // Every fetched event counts as processed, whatever happens below
        self.cursor = self.cursor.max(event.id);

        if event.action != Action::Take {
            return;
        }

        let Some(rule) = self.config.item(event.item_id) else {
            tracing::trace!(event_id = event.id, item_id = event.item_id, "Untracked item");
            return;
        };
        report.tracked += 1;

        let key = WindowKey::for_event(event);
        let total = self
            .session
            .windows
            .apply_at(key.clone(), event.timestamp, event.quantity);

        if !self.config.threshold_mode.triggers(total, rule.max_per_window) {
            return;
        }
        if self.session.alerted.has_fired(&key) {
            tracing::debug!(
                event_id = event.id,
                subject_id = event.subject_id,
                item_id = event.item_id,
                total,
                "Already alerted for this key today"
            );
            return;
        }

        let alert = Alert::new(key.clone(), event, rule, total);
        match self.notifier.deliver(&alert).await {
            Ok(()) => {
                report.alerts_sent += 1;
                tracing::info!(
                    subject_name = %alert.subject_name,
                    subject_id = alert.subject_id,
                    item_id = alert.item_id,
                    sum = alert.total,
                    limit = alert.limit,
                    day = %alert.key.day,
                    "Alert sent"
                );
            }
            Err(e) => {
                report.delivery_failures += 1;
                tracing::error!(
                    event_id = event.id,
                    subject_id = alert.subject_id,
                    item_id = alert.item_id,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }
        // Delivery failure does not re-arm the key
        self.session.alerted.mark_fired(key);
    }
}

/// Errors that abort a single cycle
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Log fetch failed: {0}")]
    Ingest(#[from] IngestError),

    #[error("Cursor persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}
