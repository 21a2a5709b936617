//! Asynchronous HTTP request builder and response-dispatch pipeline.
//!
//! # Overview
//! A `Session` produces fluent `Target` builders bound to one shared
//! transport. A terminal call (`get`, `post`, ...) freezes the builder state
//! into an immutable request descriptor, submits it off the caller's thread
//! and returns a `RequestHandle` immediately; the one outcome of the
//! exchange arrives later as an `Outcome` passed to the supplied callback.
//!
//! # Design
//! - Outcomes form a closed taxonomy: `Success`, `CommunicationError`,
//!   `UnsupportedResponse`, `ParseError`, `ClientError`, `ServerError`,
//!   `UnsupportedStatusCode`. Exactly one is delivered per terminal call.
//! - Body parsing runs on a worker context; every callback runs on one
//!   fixed delivery thread, for success and failure alike.
//! - The transport is a trait (`Transport`); a `ureq`-backed default is
//!   provided and tests script their own.
//! - Malformed URLs are rejected when the target is built, not reported
//!   through the outcome taxonomy.
//!
//! ```no_run
//! use flow_core::{Outcome, Session};
//!
//! let session = Session::new();
//! let target = session
//!     .target("http://httpbin.org/get")?
//!     .parameter("page", "1");
//! let handle = target.get(|outcome| {
//!     if let Outcome::Success(response) = outcome {
//!         println!("status {}", response.status());
//!     }
//! });
//! # drop(handle);
//! # Ok::<(), flow_core::TargetError>(())
//! ```

mod dispatch;
mod error;
mod handle;
mod outcome;
pub mod parser;
mod queue;
mod request;
mod session;
mod target;
pub mod transport;

pub use error::TargetError;
pub use handle::RequestHandle;
pub use outcome::{Outcome, Response};
pub use parser::{ParseFailure, Parser};
pub use queue::Queues;
pub use request::{Method, RequestDescriptor};
pub use session::Session;
pub use target::Target;
pub use transport::{RawOutcome, Transport, TransportCall, UreqTransport};
