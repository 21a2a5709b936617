//! Session: one shared transport plus the execution contexts, producing
//! targets bound to both.

use std::sync::{Arc, Mutex};

use log::warn;
use url::Url;

use crate::error::TargetError;
use crate::handle::RequestHandle;
use crate::queue::Queues;
use crate::target::Target;
use crate::transport::{Transport, UreqTransport};

/// Shared state behind every target of one session.
pub(crate) struct SessionInner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) queues: Arc<Queues>,
    inflight: Mutex<Vec<RequestHandle>>,
}

impl SessionInner {
    pub(crate) fn track(&self, handle: RequestHandle) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.retain(is_in_flight);
            inflight.push(handle);
        }
    }

    /// Drop `settled` and anything else that has finished or been cancelled.
    ///
    /// Called from the delivery path right after a callback returns, so a
    /// session that goes quiet does not retain its last batch of handles.
    pub(crate) fn untrack(&self, settled: &RequestHandle) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.retain(|tracked| !tracked.same_request(settled) && is_in_flight(tracked));
        }
    }
}

fn is_in_flight(handle: &RequestHandle) -> bool {
    !handle.is_finished() && !handle.is_cancelled()
}

/// Entry point of the pipeline.
///
/// All targets created from one session share its transport (connection
/// pool, TLS configuration) and its execution contexts, so every callback
/// of the session lands on the same delivery thread.
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Default transport (`ureq`) and freshly built contexts.
    pub fn new() -> Self {
        Self::with_transport(Arc::new(UreqTransport::new()), Queues::new())
    }

    /// Fully injected construction; no hidden process-wide state.
    pub fn with_transport(transport: Arc<dyn Transport>, queues: Queues) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                transport,
                queues: Arc::new(queues),
                inflight: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a target for `url`.
    ///
    /// The URL must be absolute with an http or https scheme; anything else
    /// is a contract violation by the caller and is rejected here, before
    /// any dispatch machinery is touched.
    pub fn target(&self, url: &str) -> Result<Target, TargetError> {
        let parsed = Url::parse(url).map_err(|source| TargetError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(TargetError::UnsupportedScheme {
                    url: url.to_string(),
                    scheme: scheme.to_string(),
                })
            }
        }
        Ok(Target::new(parsed, Arc::clone(&self.inner)))
    }

    /// Tear the transport down and cancel everything still in flight.
    ///
    /// Fatal for those requests: per the cancellation policy their callbacks
    /// are suppressed, and later submissions fail with a communication
    /// error.
    pub fn invalidate(&self) {
        warn!("invalidating session, cancelling in-flight requests");
        self.inner.transport.invalidate();
        if let Ok(mut inflight) = self.inner.inflight.lock() {
            for handle in inflight.drain(..) {
                if !handle.is_finished() {
                    handle.cancel();
                }
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
