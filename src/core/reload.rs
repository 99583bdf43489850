//! The reload sequence: re-read the file, refresh every registered value in
//! registration order, then fan out notifications.

use crate::core::ConfigProvider;
use crate::core::registry::RegisteredValue;
use crate::error::ConfigError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// A registered value whose refresh failed.
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    /// Registration index of the value.
    pub index: usize,
    /// The error its refresh returned.
    pub error: Arc<ConfigError>,
}

/// Outcome of one reload.
#[derive(Debug, Clone, Default)]
pub struct ReloadReport {
    /// Number of values that refreshed successfully.
    pub refreshed: usize,
    /// Values whose refresh failed, in registration order.
    pub failures: Vec<RefreshFailure>,
    /// Set when the file could not be read; no value was refreshed and no
    /// listener ran.
    pub file_error: Option<Arc<ConfigError>>,
}

impl ReloadReport {
    /// True when the file was read and every value refreshed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.file_error.is_none()
    }

    /// Every error of this reload, file error first.
    pub fn errors(&self) -> Vec<Arc<ConfigError>> {
        self.file_error
            .iter()
            .cloned()
            .chain(self.failures.iter().map(|f| Arc::clone(&f.error)))
            .collect()
    }
}

impl ConfigProvider {
    /// Run the full reload sequence.
    ///
    /// This is what the file watcher invokes on every detected change:
    ///
    /// 1. Re-read the bound file. If that fails the store keeps its previous
    ///    contents, the error is logged and the reload stops here.
    /// 2. Refresh every registered value in registration order. A failure is
    ///    logged and recorded, and the next value is refreshed regardless.
    /// 3. After each successful refresh, call that value's scoped listeners.
    /// 4. Call every global listener, even if some values failed.
    ///
    /// Errors never propagate out of a reload; the returned report is also
    /// kept for [`last_reload_report`](Self::last_reload_report). Listeners
    /// are not isolated: a panicking listener aborts the pass. Calling
    /// `reload` from inside a listener deadlocks.
    pub fn reload(&self) -> ReloadReport {
        let _pass = self.inner.reload_lock.lock();
        let started = Instant::now();

        let read = self.inner.store.write().read_in_config();
        let report = match read {
            Ok(()) => self.refresh_and_notify(),
            Err(err) => {
                warn!(error = %err, "reload skipped, keeping last-known-good configuration");
                ReloadReport {
                    file_error: Some(Arc::new(err)),
                    ..ReloadReport::default()
                }
            }
        };

        info!(
            refreshed = report.refreshed,
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "configuration reloaded"
        );
        *self.inner.last_reload.lock() = Some(report.clone());
        report
    }

    /// Report of the most recent reload, if any ran.
    pub fn last_reload_report(&self) -> Option<ReloadReport> {
        self.inner.last_reload.lock().clone()
    }

    /// Errors of the most recent reload; empty if it was clean or none ran.
    pub fn last_reload_errors(&self) -> Vec<Arc<ConfigError>> {
        self.inner
            .last_reload
            .lock()
            .as_ref()
            .map(ReloadReport::errors)
            .unwrap_or_default()
    }

    fn refresh_and_notify(&self) -> ReloadReport {
        let entries = self.inner.values.snapshot();
        let mut report = ReloadReport::default();

        for (index, entry) in entries.iter().enumerate() {
            match self.refresh_entry(index, entry) {
                Ok(()) => {
                    report.refreshed += 1;
                    entry.notify(self);
                }
                Err(failure) => report.failures.push(failure),
            }
        }

        self.inner.listeners.notify_all(self);
        report
    }

    /// Refresh every registered value without notifying anyone.
    pub(crate) fn refresh_all(&self) -> Vec<RefreshFailure> {
        self.inner
            .values
            .snapshot()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| self.refresh_entry(index, entry).err())
            .collect()
    }

    fn refresh_entry(
        &self,
        index: usize,
        entry: &RegisteredValue,
    ) -> std::result::Result<(), RefreshFailure> {
        entry.ensure_defaults(self);
        entry.value.refresh_value(self).map_err(|err| {
            warn!(index, error = %err, "update config failed");
            RefreshFailure {
                index,
                error: Arc::new(err),
            }
        })
    }
}
