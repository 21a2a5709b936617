//! Observation handle for one in-flight request.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use crate::transport::TransportCall;

// One-way transitions out of `IN_FLIGHT`. Cancellation and completion race
// for the single terminal slot; whichever lands first wins, so the two
// terminal states are mutually exclusive.
const IN_FLIGHT: u8 = 0;
const CANCELLED: u8 = 1;
const COMPLETED: u8 = 2;

/// Opaque token for a dispatched request, 1:1 with its descriptor.
///
/// Cheap to clone; all clones observe the same operation. Does not own the
/// completion callback.
///
/// Cancellation policy: a cancel that lands before classification begins
/// suppresses the callback entirely. Suppression is best-effort; a cancel
/// racing with delivery may still let the callback run, but the handle then
/// reports `is_cancelled()` and never `is_finished()`. A cancel after the
/// request has finished is a no-op.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    state: AtomicU8,
    call: Mutex<Option<Arc<dyn TransportCall>>>,
}

impl RequestHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(HandleInner {
                state: AtomicU8::new(IN_FLIGHT),
                call: Mutex::new(None),
            }),
        }
    }

    /// True once the completion callback has returned.
    pub fn is_finished(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == COMPLETED
    }

    /// True once cancellation has been requested and won over completion.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Request a best-effort abort of the in-flight call.
    pub fn cancel(&self) {
        if self
            .inner
            .state
            .compare_exchange(IN_FLIGHT, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Ok(call) = self.inner.call.lock() {
            if let Some(call) = call.as_ref() {
                call.cancel();
            }
        }
    }

    pub(crate) fn attach_call(&self, call: Arc<dyn TransportCall>) {
        if let Ok(mut slot) = self.inner.call.lock() {
            // Completion may already have fired; the slot is still useful
            // only while the call is in flight.
            *slot = Some(call);
        }
    }

    pub(crate) fn mark_completed(&self) {
        // Loses against an earlier cancel; the handle then stays cancelled.
        let _ = self.inner.state.compare_exchange(
            IN_FLIGHT,
            COMPLETED,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn same_request(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("finished", &self.is_finished())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
