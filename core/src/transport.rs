//! The transport boundary: submit a frozen request, get one raw outcome.
//!
//! # Design
//! The pipeline never talks HTTP itself. It hands a `RequestDescriptor` to a
//! `Transport` and receives exactly one `RawOutcome` through a completion
//! closure, on whatever context the transport completes on. Classification
//! and all further hand-offs happen in the dispatcher, so transports stay
//! trivially swappable — the tests script them freely.
//!
//! `UreqTransport` is the default implementation. It runs each blocking
//! round-trip on its own spawned thread, which doubles as the transport's
//! completion context. Redirects are not followed and non-2xx statuses are
//! returned as data; status interpretation belongs to the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use log::debug;

use crate::request::RequestDescriptor;

/// The transport's answer for one submitted request.
#[derive(Debug)]
pub enum RawOutcome {
    /// An HTTP response was received.
    Response {
        status: u16,
        headers: Vec<(String, String)>,
        body: Vec<u8>,
    },

    /// The exchange could not be completed. Detail may be absent.
    TransportFailure { detail: Option<String> },

    /// Something was received, but it was not an HTTP response.
    Unrecognized { detail: String },
}

/// Invoked exactly once with the raw outcome of a submitted request.
pub type Completion = Box<dyn FnOnce(RawOutcome) + Send + 'static>;

/// An HTTP transport capable of one-shot request submission.
pub trait Transport: Send + Sync {
    /// Submit `request`; `on_complete` fires exactly once, unless the
    /// returned call is cancelled first.
    fn submit(&self, request: &RequestDescriptor, on_complete: Completion)
        -> Arc<dyn TransportCall>;

    /// Tear the transport down. Later submissions must fail immediately.
    fn invalidate(&self) {}
}

/// Cancellation surface of one in-flight transport call.
pub trait TransportCall: Send + Sync {
    /// Best-effort abort. After this, the completion must not fire.
    fn cancel(&self);
}

/// Default transport backed by a shared `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    invalidated: AtomicBool,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .build();
        Self::with_agent(config.new_agent())
    }

    /// Use a caller-configured agent (connection pool, TLS, timeouts).
    ///
    /// The agent should be configured with `http_status_as_error(false)`;
    /// otherwise non-2xx responses surface as communication errors instead
    /// of classified statuses.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            invalidated: AtomicBool::new(false),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct UreqCall {
    cancelled: AtomicBool,
}

impl TransportCall for UreqCall {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl Transport for UreqTransport {
    fn submit(
        &self,
        request: &RequestDescriptor,
        on_complete: Completion,
    ) -> Arc<dyn TransportCall> {
        let call = Arc::new(UreqCall {
            cancelled: AtomicBool::new(false),
        });
        if self.invalidated.load(Ordering::Acquire) {
            on_complete(RawOutcome::TransportFailure {
                detail: Some("transport invalidated".to_string()),
            });
            return call;
        }
        let agent = self.agent.clone();
        let request = request.clone();
        let flight = Arc::clone(&call);
        thread::spawn(move || {
            let outcome = round_trip(&agent, &request);
            if flight.cancelled.load(Ordering::Acquire) {
                debug!(
                    "{} {} cancelled, dropping transport outcome",
                    request.method().as_str(),
                    request.url()
                );
                return;
            }
            on_complete(outcome);
        });
        call
    }

    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }
}

fn round_trip(agent: &ureq::Agent, request: &RequestDescriptor) -> RawOutcome {
    let mut builder = ureq::http::Request::builder()
        .method(request.method().as_str())
        .uri(request.url().as_str());
    for (name, value) in request.headers() {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let body = request.body().map(<[u8]>::to_vec).unwrap_or_default();
    let wire_request = match builder.body(body) {
        Ok(wire_request) => wire_request,
        Err(err) => {
            return RawOutcome::TransportFailure {
                detail: Some(err.to_string()),
            }
        }
    };

    let mut response = match agent.run(wire_request) {
        Ok(response) => response,
        Err(err) => {
            return RawOutcome::TransportFailure {
                detail: Some(err.to_string()),
            }
        }
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect();
    match response.body_mut().read_to_vec() {
        Ok(body) => RawOutcome::Response {
            status,
            headers,
            body,
        },
        Err(err) => RawOutcome::TransportFailure {
            detail: Some(err.to_string()),
        },
    }
}
