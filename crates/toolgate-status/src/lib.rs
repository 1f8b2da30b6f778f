//! Per-tool failure tracking, separate from dependency availability.
//!
//! A tool trips to [`ToolStatus::Failed`] once its consecutive failure streak
//! reaches the configured threshold. Each trip schedules one deferred sweep
//! task. The task wakes after the rebind delay and, if the failure window has
//! not elapsed yet, waits out the remainder before recovering the tool. A
//! task whose trip has since been cleared by a success, reset or recovery
//! exits without touching the entry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use toolgate_events::EventBus;
use toolgate_protocol::{
    CoordinatorError, CoordinatorResult, ExecutionContext, StatusConfig, ToolEventKind,
    ToolStatus, ToolStatusInfo,
};
use toolgate_registry::{AvailabilityChange, ToolRegistry};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
struct StatusEntry {
    info: ToolStatusInfo,
    /// Id of the latest trip; a sweep task only acts on its own trip.
    trip: u64,
    sweep_scheduled: bool,
}

impl StatusEntry {
    fn new(tool_name: &str) -> Self {
        Self::from_info(ToolStatusInfo::new(tool_name))
    }

    fn from_info(info: ToolStatusInfo) -> Self {
        Self {
            info,
            trip: 0,
            sweep_scheduled: false,
        }
    }
}

/// What a scheduled sweep task does after checking its tool.
#[derive(Debug, PartialEq, Eq)]
enum SweepStep {
    Recovered,
    Done,
    WaitFor(Duration),
}

struct StatusInner {
    config: StatusConfig,
    trips: AtomicU64,
    table: Mutex<IndexMap<String, StatusEntry>>,
    registry: Arc<ToolRegistry>,
    events: EventBus,
}

fn status_event(previous: ToolStatus, info: &ToolStatusInfo) -> ToolEventKind {
    ToolEventKind::StatusChanged {
        tool_name: info.tool_name.clone(),
        previous,
        status: info.status,
        reason: info.reason.clone(),
        consecutive_failures: info.consecutive_failures,
    }
}

impl StatusInner {
    fn window_elapsed(&self, info: &ToolStatusInfo, now: DateTime<Utc>) -> bool {
        info.last_failure_time.is_some() && self.window_remaining(info, now).is_none()
    }

    /// Time left before a sweep at `now` may recover `info`, or `None` once
    /// recovery is allowed.
    fn window_remaining(&self, info: &ToolStatusInfo, now: DateTime<Utc>) -> Option<Duration> {
        let last_failure = info.last_failure_time?;
        let elapsed = (now - last_failure).to_std().unwrap_or_default();
        let window = self.config.failure_duration();
        // Recovery needs strictly more than the window.
        (elapsed <= window).then(|| window - elapsed + Duration::from_millis(1))
    }

    /// Recover `entry` if it is failed and its window has passed.
    fn try_recover(&self, entry: &mut StatusEntry, now: DateTime<Utc>) -> Vec<ToolEventKind> {
        if entry.info.status != ToolStatus::Failed || !self.window_elapsed(&entry.info, now) {
            return Vec::new();
        }
        let previous = entry.info.status;
        entry.info.status = ToolStatus::Available;
        entry.info.consecutive_failures = 0;
        entry.info.should_rebind = false;
        entry.info.reason = "recovered after failure window".to_owned();
        entry.sweep_scheduled = false;
        vec![
            status_event(previous, &entry.info),
            ToolEventKind::RebindCompleted {
                tool_name: entry.info.tool_name.clone(),
            },
        ]
    }

    /// One pass of the sweep task scheduled for `trip`.
    fn sweep_tool(&self, tool_name: &str, trip: u64, now: DateTime<Utc>) -> SweepStep {
        let (step, events) = {
            let mut table = self.table.lock();
            let Some(entry) = table.get_mut(tool_name) else {
                return SweepStep::Done;
            };
            if entry.trip != trip || !entry.sweep_scheduled {
                return SweepStep::Done;
            }
            if entry.info.status != ToolStatus::Failed {
                entry.sweep_scheduled = false;
                return SweepStep::Done;
            }
            match self.window_remaining(&entry.info, now) {
                Some(remaining) => (SweepStep::WaitFor(remaining), Vec::new()),
                None => {
                    let events = self.try_recover(entry, now);
                    if events.is_empty() {
                        entry.sweep_scheduled = false;
                        (SweepStep::Done, events)
                    } else {
                        (SweepStep::Recovered, events)
                    }
                }
            }
        };
        match &step {
            SweepStep::Recovered => info!(tool = %tool_name, "tool recovered by scheduled sweep"),
            SweepStep::WaitFor(remaining) => debug!(
                tool = %tool_name,
                remaining_ms = remaining.as_millis() as u64,
                "failure window still open"
            ),
            SweepStep::Done => {}
        }
        self.events.emit_all(events);
        step
    }
}

/// Failure-streak state machine for every tool that has reported an outcome.
#[derive(Clone)]
pub struct StatusManager {
    inner: Arc<StatusInner>,
}

impl StatusManager {
    pub fn new(config: StatusConfig, registry: Arc<ToolRegistry>, events: EventBus) -> Self {
        Self {
            inner: Arc::new(StatusInner {
                config,
                trips: AtomicU64::new(0),
                table: Mutex::new(IndexMap::new()),
                registry,
                events,
            }),
        }
    }

    pub fn config(&self) -> &StatusConfig {
        &self.inner.config
    }

    fn ensure_registered(&self, tool_name: &str) -> CoordinatorResult<()> {
        if self.inner.registry.contains(tool_name) {
            Ok(())
        } else {
            Err(CoordinatorError::UnknownTool(tool_name.to_owned()))
        }
    }

    /// Clear the failure streak and forward the execution to the registry so
    /// dependents are re-evaluated.
    #[instrument(skip(self, context))]
    pub fn report_success(
        &self,
        tool_name: &str,
        context: &ExecutionContext,
    ) -> CoordinatorResult<Vec<AvailabilityChange>> {
        self.ensure_registered(tool_name)?;
        let events = {
            let mut table = self.inner.table.lock();
            let entry = table
                .entry(tool_name.to_owned())
                .or_insert_with(|| StatusEntry::new(tool_name));
            let previous = entry.info.status;
            entry.info.status = ToolStatus::Available;
            entry.info.consecutive_failures = 0;
            entry.info.should_rebind = false;
            entry.info.last_success_time = Some(Utc::now());
            entry.info.reason = "last execution succeeded".to_owned();
            entry.sweep_scheduled = false;
            if previous != ToolStatus::Available {
                vec![status_event(previous, &entry.info)]
            } else {
                Vec::new()
            }
        };
        self.inner.events.emit_all(events);
        self.inner.registry.record_execution(tool_name, context)
    }

    /// Extend the failure streak, tripping the tool once it reaches the
    /// threshold.
    #[instrument(skip(self))]
    pub fn report_failure(&self, tool_name: &str, message: &str) -> CoordinatorResult<ToolStatusInfo> {
        self.ensure_registered(tool_name)?;
        let threshold = self.inner.config.failure_threshold;
        let (info, events, trip) = {
            let mut table = self.inner.table.lock();
            let entry = table
                .entry(tool_name.to_owned())
                .or_insert_with(|| StatusEntry::new(tool_name));
            let previous = entry.info.status;
            entry.info.consecutive_failures = entry.info.consecutive_failures.saturating_add(1);
            entry.info.last_failure_time = Some(Utc::now());

            let mut events = Vec::new();
            let mut trip = None;
            if entry.info.consecutive_failures >= threshold {
                entry.info.status = ToolStatus::Failed;
                entry.info.should_rebind = true;
                entry.info.reason = format!(
                    "failed {} consecutive times: {message}",
                    entry.info.consecutive_failures
                );
                if !entry.sweep_scheduled {
                    entry.sweep_scheduled = true;
                    entry.trip = self.inner.trips.fetch_add(1, Ordering::Relaxed) + 1;
                    trip = Some(entry.trip);
                }
            } else {
                entry.info.reason = format!(
                    "{}/{threshold} failures: {message}",
                    entry.info.consecutive_failures
                );
            }
            if previous != entry.info.status {
                events.push(status_event(previous, &entry.info));
            }
            (entry.info.clone(), events, trip)
        };

        if info.status == ToolStatus::Failed {
            warn!(
                consecutive_failures = info.consecutive_failures,
                threshold, "failure threshold reached"
            );
        }
        self.inner.events.emit_all(events);
        if let Some(trip) = trip {
            self.schedule_sweep(tool_name, trip);
        }
        Ok(info)
    }

    fn schedule_sweep(&self, tool_name: &str, trip: u64) {
        let delay = self.inner.config.rebind_delay();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(tool = %tool_name, "no async runtime; recovery sweep not scheduled");
            if let Some(entry) = self.inner.table.lock().get_mut(tool_name)
                && entry.trip == trip
            {
                entry.sweep_scheduled = false;
            }
            return;
        };

        let inner = self.inner.clone();
        let name = tool_name.to_owned();
        handle.spawn(async move {
            let mut wait = delay;
            loop {
                tokio::time::sleep(wait).await;
                match inner.sweep_tool(&name, trip, Utc::now()) {
                    SweepStep::WaitFor(remaining) => wait = remaining,
                    SweepStep::Recovered | SweepStep::Done => break,
                }
            }
        });
        self.inner.events.emit(ToolEventKind::RebindScheduled {
            tool_name: tool_name.to_owned(),
            delay_ms: delay.as_millis() as u64,
        });
    }

    /// Manual override. Counters are left untouched.
    #[instrument(skip(self, reason))]
    pub fn set_status(
        &self,
        tool_name: &str,
        status: ToolStatus,
        reason: impl Into<String>,
    ) -> CoordinatorResult<ToolStatusInfo> {
        self.ensure_registered(tool_name)?;
        let (info, previous) = {
            let mut table = self.inner.table.lock();
            let entry = table
                .entry(tool_name.to_owned())
                .or_insert_with(|| StatusEntry::new(tool_name));
            let previous = entry.info.status;
            entry.info.status = status;
            entry.info.reason = reason.into();
            if status != ToolStatus::Failed {
                entry.sweep_scheduled = false;
            }
            (entry.info.clone(), previous)
        };
        if previous != status {
            info!(%previous, %status, "status overridden");
            self.inner.events.emit(status_event(previous, &info));
        }
        Ok(info)
    }

    /// Forget counters and timestamps for one tool.
    pub fn reset(&self, tool_name: &str) -> CoordinatorResult<ToolStatusInfo> {
        self.ensure_registered(tool_name)?;
        let (info, previous) = {
            let mut table = self.inner.table.lock();
            let fresh = StatusEntry::new(tool_name);
            let previous = table
                .insert(tool_name.to_owned(), fresh.clone())
                .map_or(ToolStatus::Available, |old| old.info.status);
            (fresh.info, previous)
        };
        if previous != info.status {
            self.inner.events.emit(status_event(previous, &info));
        }
        Ok(info)
    }

    pub fn reset_all(&self) {
        let events: Vec<_> = {
            let mut table = self.inner.table.lock();
            table
                .drain(..)
                .filter(|(_, entry)| entry.info.status != ToolStatus::Available)
                .map(|(name, entry)| status_event(entry.info.status, &ToolStatusInfo::new(name)))
                .collect()
        };
        self.inner.events.emit_all(events);
    }

    /// Drop a tool's entry, typically on unregistration.
    pub fn forget(&self, tool_name: &str) -> Option<ToolStatusInfo> {
        self.inner
            .table
            .lock()
            .shift_remove(tool_name)
            .map(|entry| entry.info)
    }

    pub fn status(&self, tool_name: &str) -> Option<ToolStatusInfo> {
        self.inner
            .table
            .lock()
            .get(tool_name)
            .map(|entry| entry.info.clone())
    }

    /// Tools without an entry have never reported and count as usable.
    pub fn is_usable(&self, tool_name: &str) -> bool {
        self.inner
            .table
            .lock()
            .get(tool_name)
            .is_none_or(|entry| entry.info.status.is_usable())
    }

    pub fn all_statuses(&self) -> Vec<ToolStatusInfo> {
        self.export_records()
    }

    pub fn sweep(&self) -> Vec<String> {
        self.sweep_at(Utc::now())
    }

    /// Recover every failed tool whose failure window has elapsed at `now`.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<String> {
        let (recovered, events) = {
            let mut table = self.inner.table.lock();
            let mut recovered = Vec::new();
            let mut events = Vec::new();
            for (name, entry) in table.iter_mut() {
                let changes = self.inner.try_recover(entry, now);
                if !changes.is_empty() {
                    recovered.push(name.clone());
                    events.extend(changes);
                }
            }
            (recovered, events)
        };
        if !recovered.is_empty() {
            info!(count = recovered.len(), "sweep recovered tools");
        }
        self.inner.events.emit_all(events);
        recovered
    }

    pub fn tools_needing_rebind(&self) -> Vec<String> {
        self.inner
            .table
            .lock()
            .values()
            .filter(|entry| entry.info.should_rebind)
            .map(|entry| entry.info.tool_name.clone())
            .collect()
    }

    /// Clear the rebind flag once the caller has refreshed its tool set.
    pub fn acknowledge_rebind(&self, tool_name: &str) -> bool {
        match self.inner.table.lock().get_mut(tool_name) {
            Some(entry) if entry.info.should_rebind => {
                entry.info.should_rebind = false;
                true
            }
            _ => false,
        }
    }

    /// Flat record list, in first-report order.
    pub fn export_records(&self) -> Vec<ToolStatusInfo> {
        self.inner
            .table
            .lock()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Replace the whole table. Restored failed tools get no scheduled
    /// sweep; an explicit [`sweep`](Self::sweep) recovers them.
    pub fn restore_records(&self, records: Vec<ToolStatusInfo>) {
        let count = records.len();
        let mut table = self.inner.table.lock();
        table.clear();
        for info in records {
            table.insert(info.tool_name.clone(), StatusEntry::from_info(info));
        }
        info!(count, "status table restored");
    }
}
