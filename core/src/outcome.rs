//! The closed outcome model delivered to completion callbacks.
//!
//! # Design
//! Exactly one `Outcome` is produced per dispatched request. Keeping the
//! taxonomy a single enum preserves exhaustive matching at the call site:
//! adding a new failure class is a compile-time event for every caller.
//! 4xx/5xx/other status classes carry the status and response headers but
//! not the body; the success payload carries everything.

use crate::parser::ParseFailure;

/// Successful exchange: the parsed value plus the raw response data.
///
/// `parsed` is `None` when the response body was empty — the parser is never
/// run in that case.
#[derive(Debug)]
pub struct Response<T> {
    parsed: Option<T>,
    raw: Vec<u8>,
    status: u16,
    headers: Vec<(String, String)>,
}

impl<T> Response<T> {
    pub(crate) fn new(
        parsed: Option<T>,
        raw: Vec<u8>,
        status: u16,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            parsed,
            raw,
            status,
            headers,
        }
    }

    pub fn parsed(&self) -> Option<&T> {
        self.parsed.as_ref()
    }

    pub fn into_parsed(self) -> Option<T> {
        self.parsed
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The one outcome of a dispatched request.
#[derive(Debug)]
pub enum Outcome<T> {
    /// 2xx response; body parsed unless it was empty.
    Success(Response<T>),
    /// The transport could not complete the exchange. Detail may be absent.
    CommunicationError(Option<String>),
    /// Something came back, but it was not recognizable as an HTTP response.
    UnsupportedResponse(String),
    /// 2xx response whose body the parser rejected.
    ParseError(ParseFailure),
    /// 4xx response.
    ClientError {
        status: u16,
        headers: Vec<(String, String)>,
    },
    /// 5xx response.
    ServerError {
        status: u16,
        headers: Vec<(String, String)>,
    },
    /// 1xx, 3xx or out-of-range status.
    UnsupportedStatusCode {
        status: u16,
        headers: Vec<(String, String)>,
    },
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn success(self) -> Option<Response<T>> {
        match self {
            Outcome::Success(response) => Some(response),
            _ => None,
        }
    }

    /// Short label for logging.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::CommunicationError(_) => "communication error",
            Outcome::UnsupportedResponse(_) => "unsupported response",
            Outcome::ParseError(_) => "parse error",
            Outcome::ClientError { .. } => "client error",
            Outcome::ServerError { .. } => "server error",
            Outcome::UnsupportedStatusCode { .. } => "unsupported status code",
        }
    }
}
