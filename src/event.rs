//! Emitted events and the stoppable wait-group token that rides along with them.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::entities::{Endpoints, Service};
use crate::ids::ServiceID;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    UpdateService,
    DeleteService,
}

/// One correlated change, as handed to downstream datapath consumers.
///
/// `service` and `endpoints` are logically immutable snapshots as of the
/// moment of emission; they're `Arc`-wrapped so consumers can hold onto them
/// past the critical section without cloning the underlying maps.
#[derive(Clone, Debug)]
pub struct ServiceEvent {
    pub action: Action,
    pub id: ServiceID,
    pub service: Arc<Service>,
    pub old_service: Option<Arc<Service>>,
    pub endpoints: Arc<Endpoints>,
    pub swg: StoppableWaitGroup,
}

/// A reference-countable, single-stop completion handle.
///
/// The cache calls [`add`](Self::add) exactly once, before sending an event
/// that carries this token. Consumers call [`done`](Self::done) once they've
/// finished acting on that event. Once [`stop`](Self::stop) has been called no
/// further `add`s are honored, so `wait` is guaranteed to eventually resolve.
#[derive(Clone, Debug)]
pub struct StoppableWaitGroup {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    count: AtomicI64,
    stopped: AtomicBool,
    notify: Notify,
}

impl Default for StoppableWaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl StoppableWaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    /// Registers one outstanding unit of work. A no-op once `stop` has been
    /// called, so producers naturally stop incrementing after shutdown begins.
    pub fn add(&self) {
        if self.inner.stopped.load(Ordering::Acquire) {
            return;
        }
        self.inner.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Balances one prior `add`.
    pub fn done(&self) {
        let prev = self.inner.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "done() called more times than add()");
        if prev <= 1 {
            self.inner.notify.notify_waiters();
        }
    }

    /// Marks the token as stopped. Idempotent.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Outstanding unit count; test/debug helper.
    pub fn count(&self) -> i64 {
        self.inner.count.load(Ordering::Acquire)
    }

    /// Waits until the token is stopped and all outstanding work has drained.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    fn is_done(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire) && self.inner.count.load(Ordering::Acquire) <= 0
    }
}
