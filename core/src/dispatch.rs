//! Submission, classification, parsing hand-off and callback delivery.
//!
//! # Design
//! One dispatched request moves through Submitted → AwaitingTransport →
//! Classifying → (Parsing) → Completed, each stage strictly after the
//! previous one:
//!
//! - classification happens on the transport's completion context and maps
//!   the raw outcome to exactly one `Outcome` variant, keyed on
//!   `status / 100`;
//! - a non-empty 2xx body is parsed on the worker queue; an empty one skips
//!   parsing and reports an absent parsed value;
//! - every outcome, success or failure, is handed to the delivery queue, so
//!   callbacks always observe the same fixed thread regardless of which
//!   path produced the result.
//!
//! A cancellation observed when the transport completes suppresses the
//! callback; once classification has begun the request runs to delivery.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, trace};

use crate::handle::RequestHandle;
use crate::outcome::{Outcome, Response};
use crate::parser::{ParseFailure, Parser};
use crate::queue::Queues;
use crate::request::RequestDescriptor;
use crate::transport::{Completion, RawOutcome, Transport};

pub(crate) type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

/// Submit `descriptor` and drive it to exactly one callback invocation,
/// reported through `handle`.
pub(crate) fn dispatch<T: Send + 'static>(
    transport: &Arc<dyn Transport>,
    queues: &Arc<Queues>,
    handle: &RequestHandle,
    descriptor: RequestDescriptor,
    parser: Parser<T>,
    callback: Callback<T>,
) {
    debug!(
        "dispatching {} {}",
        descriptor.method().as_str(),
        descriptor.url()
    );

    let completion_handle = handle.clone();
    let completion_queues = Arc::clone(queues);
    let on_complete: Completion = Box::new(move |raw| {
        if completion_handle.is_cancelled() {
            debug!("request cancelled, suppressing callback");
            return;
        }
        classify_and_deliver(raw, completion_queues, completion_handle, parser, callback);
    });

    let call = transport.submit(&descriptor, on_complete);
    handle.attach_call(call);
}

fn classify_and_deliver<T: Send + 'static>(
    raw: RawOutcome,
    queues: Arc<Queues>,
    handle: RequestHandle,
    parser: Parser<T>,
    callback: Callback<T>,
) {
    match raw {
        RawOutcome::TransportFailure { detail } => {
            deliver(&queues, handle, callback, Outcome::CommunicationError(detail));
        }
        RawOutcome::Unrecognized { detail } => {
            deliver(&queues, handle, callback, Outcome::UnsupportedResponse(detail));
        }
        RawOutcome::Response {
            status,
            headers,
            body,
        } => match status / 100 {
            2 if body.is_empty() => {
                let response = Response::new(None, body, status, headers);
                deliver(&queues, handle, callback, Outcome::Success(response));
            }
            2 => {
                let worker_queues = Arc::clone(&queues);
                queues.worker().submit(move || {
                    let outcome = match run_parser(parser, &body) {
                        Ok(value) => {
                            Outcome::Success(Response::new(Some(value), body, status, headers))
                        }
                        Err(failure) => Outcome::ParseError(failure),
                    };
                    deliver(&worker_queues, handle, callback, outcome);
                });
            }
            4 => deliver(
                &queues,
                handle,
                callback,
                Outcome::ClientError { status, headers },
            ),
            5 => deliver(
                &queues,
                handle,
                callback,
                Outcome::ServerError { status, headers },
            ),
            _ => deliver(
                &queues,
                handle,
                callback,
                Outcome::UnsupportedStatusCode { status, headers },
            ),
        },
    }
}

/// Run the parser, converting panics into ordinary parse failures so a
/// misbehaving parser cannot take down a worker thread.
fn run_parser<T>(parser: Parser<T>, body: &[u8]) -> Result<T, ParseFailure> {
    match catch_unwind(AssertUnwindSafe(move || parser(body))) {
        Ok(result) => result,
        Err(_) => Err(ParseFailure::new("parser panicked")),
    }
}

fn deliver<T: Send + 'static>(
    queues: &Queues,
    handle: RequestHandle,
    callback: Callback<T>,
    outcome: Outcome<T>,
) {
    trace!("delivering {}", outcome.kind());
    queues.delivery().submit(move || {
        callback(outcome);
        handle.mark_completed();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::request::Method;
    use crate::transport::TransportCall;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    struct NoopCall;

    impl TransportCall for NoopCall {
        fn cancel(&self) {}
    }

    /// Completes synchronously on the submitting thread with a scripted outcome.
    struct ScriptedTransport {
        raw: Mutex<Option<RawOutcome>>,
    }

    impl ScriptedTransport {
        fn with(raw: RawOutcome) -> Arc<dyn Transport> {
            Arc::new(Self {
                raw: Mutex::new(Some(raw)),
            })
        }
    }

    impl Transport for ScriptedTransport {
        fn submit(
            &self,
            _request: &RequestDescriptor,
            on_complete: Completion,
        ) -> Arc<dyn TransportCall> {
            let raw = self
                .raw
                .lock()
                .unwrap()
                .take()
                .expect("scripted transport submitted twice");
            on_complete(raw);
            Arc::new(NoopCall)
        }
    }

    /// Holds the completion until the test triggers it.
    #[derive(Default)]
    struct ManualTransport {
        pending: Mutex<Option<Completion>>,
    }

    impl ManualTransport {
        fn complete(&self, raw: RawOutcome) {
            if let Some(on_complete) = self.pending.lock().unwrap().take() {
                on_complete(raw);
            }
        }
    }

    impl Transport for ManualTransport {
        fn submit(
            &self,
            _request: &RequestDescriptor,
            on_complete: Completion,
        ) -> Arc<dyn TransportCall> {
            *self.pending.lock().unwrap() = Some(on_complete);
            Arc::new(NoopCall)
        }
    }

    fn descriptor() -> RequestDescriptor {
        RequestDescriptor::new(
            url::Url::parse("http://localhost/get").unwrap(),
            Method::Get,
            HashMap::new(),
            None,
        )
    }

    fn response(status: u16, body: &[u8]) -> RawOutcome {
        RawOutcome::Response {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.to_vec(),
        }
    }

    /// Dispatch against a scripted outcome and wait for the delivered result.
    fn run(raw: RawOutcome) -> Outcome<String> {
        let transport = ScriptedTransport::with(raw);
        let queues = Arc::new(Queues::with_workers(1));
        let (tx, rx) = mpsc::channel();
        dispatch(
            &transport,
            &queues,
            &RequestHandle::new(),
            descriptor(),
            parser::text(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.recv_timeout(Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn status_2xx_with_body_parses_to_success() {
        let outcome = run(response(200, b"hello"));
        let response = outcome.success().unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.parsed().map(String::as_str), Some("hello"));
        assert_eq!(response.raw(), b"hello");
    }

    #[test]
    fn status_2xx_with_empty_body_skips_parser() {
        let transport = ScriptedTransport::with(response(204, b""));
        let queues = Arc::new(Queues::with_workers(1));
        let invocations = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&invocations);
        let counting: Parser<String> = Box::new(move |bytes| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(String::from_utf8_lossy(bytes).to_string())
        });
        let (tx, rx) = mpsc::channel();
        dispatch(
            &transport,
            &queues,
            &RequestHandle::new(),
            descriptor(),
            counting,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let response = outcome.success().unwrap();
        assert!(response.parsed().is_none());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn status_4xx_classifies_as_client_error() {
        let outcome = run(response(404, b"missing"));
        assert!(matches!(
            outcome,
            Outcome::ClientError { status: 404, .. }
        ));
    }

    #[test]
    fn status_5xx_classifies_as_server_error() {
        let outcome = run(response(503, b""));
        assert!(matches!(
            outcome,
            Outcome::ServerError { status: 503, .. }
        ));
    }

    #[test]
    fn status_1xx_and_3xx_are_unsupported() {
        assert!(matches!(
            run(response(100, b"")),
            Outcome::UnsupportedStatusCode { status: 100, .. }
        ));
        assert!(matches!(
            run(response(304, b"")),
            Outcome::UnsupportedStatusCode { status: 304, .. }
        ));
    }

    #[test]
    fn out_of_range_status_is_unsupported() {
        assert!(matches!(
            run(response(600, b"")),
            Outcome::UnsupportedStatusCode { status: 600, .. }
        ));
    }

    #[test]
    fn transport_failure_maps_to_communication_error() {
        let outcome = run(RawOutcome::TransportFailure { detail: None });
        assert!(matches!(outcome, Outcome::CommunicationError(None)));

        let outcome = run(RawOutcome::TransportFailure {
            detail: Some("connection refused".to_string()),
        });
        assert!(matches!(outcome, Outcome::CommunicationError(Some(_))));
    }

    #[test]
    fn unrecognized_response_maps_to_unsupported_response() {
        let outcome = run(RawOutcome::Unrecognized {
            detail: "not http".to_string(),
        });
        assert!(matches!(outcome, Outcome::UnsupportedResponse(detail) if detail == "not http"));
    }

    #[test]
    fn failing_parser_yields_parse_error() {
        let transport = ScriptedTransport::with(response(200, b"body"));
        let queues = Arc::new(Queues::with_workers(1));
        let failing: Parser<String> = Box::new(|_| Err(ParseFailure::new("nope")));
        let (tx, rx) = mpsc::channel();
        dispatch(
            &transport,
            &queues,
            &RequestHandle::new(),
            descriptor(),
            failing,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(
            outcome,
            Outcome::ParseError(failure) if failure.message() == "nope"
        ));
    }

    #[test]
    fn panicking_parser_yields_parse_error() {
        let transport = ScriptedTransport::with(response(200, b"body"));
        let queues = Arc::new(Queues::with_workers(1));
        let panicking: Parser<String> = Box::new(|_| panic!("boom"));
        let (tx, rx) = mpsc::channel();
        dispatch(
            &transport,
            &queues,
            &RequestHandle::new(),
            descriptor(),
            panicking,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(outcome, Outcome::ParseError(_)));
    }

    #[test]
    fn all_outcome_paths_deliver_on_the_same_thread() {
        let queues = Arc::new(Queues::with_workers(1));
        let (tx, rx) = mpsc::channel::<ThreadId>();
        let outcomes = [
            response(200, b"body"),
            response(200, b""),
            response(404, b""),
            RawOutcome::TransportFailure { detail: None },
        ];
        for raw in outcomes {
            let transport = ScriptedTransport::with(raw);
            let tx = tx.clone();
            dispatch::<String>(
                &transport,
                &queues,
                &RequestHandle::new(),
                descriptor(),
                parser::text(),
                Box::new(move |_| {
                    let _ = tx.send(thread::current().id());
                }),
            );
        }
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        for _ in 0..3 {
            assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), first);
        }
        assert_ne!(first, thread::current().id());
    }

    #[test]
    fn parsing_runs_off_the_delivery_thread() {
        let transport = ScriptedTransport::with(response(200, b"body"));
        let queues = Arc::new(Queues::with_workers(1));
        let (parser_tx, parser_rx) = mpsc::channel::<ThreadId>();
        let (callback_tx, callback_rx) = mpsc::channel::<ThreadId>();
        let recording: Parser<String> = Box::new(move |bytes| {
            let _ = parser_tx.send(thread::current().id());
            Ok(String::from_utf8_lossy(bytes).to_string())
        });
        dispatch(
            &transport,
            &queues,
            &RequestHandle::new(),
            descriptor(),
            recording,
            Box::new(move |_| {
                let _ = callback_tx.send(thread::current().id());
            }),
        );
        let parser_thread = parser_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let callback_thread = callback_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_ne!(parser_thread, callback_thread);
    }

    #[test]
    fn handle_finishes_after_callback_returns() {
        let transport = ScriptedTransport::with(response(200, b"body"));
        let queues = Arc::new(Queues::with_workers(1));
        let (tx, rx) = mpsc::channel();
        let handle = RequestHandle::new();
        dispatch(
            &transport,
            &queues,
            &handle,
            descriptor(),
            parser::text(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() {
            assert!(std::time::Instant::now() < deadline, "handle never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn cancel_before_completion_suppresses_callback() {
        let transport = Arc::new(ManualTransport::default());
        let abstract_transport: Arc<dyn Transport> = transport.clone();
        let queues = Arc::new(Queues::with_workers(1));
        let (tx, rx) = mpsc::channel();
        let handle = RequestHandle::new();
        dispatch(
            &abstract_transport,
            &queues,
            &handle,
            descriptor(),
            parser::text(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        handle.cancel();
        transport.complete(response(200, b"late"));
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(handle.is_cancelled());
        assert!(!handle.is_finished());
    }

    #[test]
    fn cancel_after_delivery_changes_nothing() {
        let transport = ScriptedTransport::with(response(200, b"body"));
        let queues = Arc::new(Queues::with_workers(1));
        let (tx, rx) = mpsc::channel();
        let handle = RequestHandle::new();
        dispatch(
            &transport,
            &queues,
            &handle,
            descriptor(),
            parser::text(),
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(outcome.is_success());
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() {
            assert!(std::time::Instant::now() < deadline, "handle never finished");
            thread::sleep(Duration::from_millis(5));
        }
        handle.cancel();
        // The request already ran to completion; only one callback fired
        // and the finished handle never flips to cancelled.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(handle.is_finished());
        assert!(!handle.is_cancelled());
    }
}
