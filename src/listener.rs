//! # Listener Module
//!
//! External observation seam for the wire dispatcher.
//!
//! The dispatcher notifies a [`DispatchListener`] when a call starts
//! (before argument decode begins) and exactly once when it completes,
//! correlating start and completion through the opaque call id returned by
//! `on_start`. This is the metrics boundary: sinks beyond this contract
//! are out of scope for the dispatch core.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::router::Route;

/// Observer notified once per dispatched call.
///
/// `on_start` fires after route resolution and before argument decode;
/// exactly one of `on_succeed` / `on_fail` then fires with the id it
/// returned. Implementations must be passive — they can observe and
/// record, never influence dispatch.
pub trait DispatchListener: Send + Sync {
    /// A call is starting. Returns an opaque id correlating the
    /// completion notification.
    fn on_start(&self, route: &Route) -> u64;

    /// The call produced a result and a `Success` frame was written.
    fn on_succeed(&self, call_id: u64, route: &Route, result: &Value);

    /// The call failed and an error frame was written.
    fn on_fail(&self, call_id: u64, route: &Route, reason: &str);
}

/// Lock-free call counters.
///
/// All counters use atomic operations with `Ordering::Relaxed`: metrics
/// are eventually consistent and extremely cheap to collect. The call id
/// handed out by `on_start` is the start counter value, so ids are unique
/// for the process lifetime.
#[derive(Debug, Default)]
pub struct MetricsListener {
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl MetricsListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total calls started.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Total calls that produced a `Success` frame.
    #[must_use]
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Total calls that produced an error frame.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl DispatchListener for MetricsListener {
    fn on_start(&self, _route: &Route) -> u64 {
        self.started.fetch_add(1, Ordering::Relaxed)
    }

    fn on_succeed(&self, _call_id: u64, _route: &Route, _result: &Value) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fail(&self, _call_id: u64, _route: &Route, _reason: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}
