//! Body parsers: pure conversions from raw response bytes to typed values.
//!
//! # Design
//! A parser runs exactly once per dispatched request, on the worker queue,
//! and never sees an empty body (the dispatcher short-circuits those). A
//! parser reports failure through `ParseFailure` rather than panicking; the
//! dispatcher additionally catches panics so a misbehaving parser still
//! surfaces as a `ParseError` instead of taking down a worker thread.

use std::fmt;

use serde::de::DeserializeOwned;

/// Why a parser could not convert the body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    message: String,
}

impl ParseFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse failed: {}", self.message)
    }
}

impl std::error::Error for ParseFailure {}

/// A one-shot conversion from raw body bytes to a typed value.
pub type Parser<T> = Box<dyn FnOnce(&[u8]) -> Result<T, ParseFailure> + Send + 'static>;

/// Strict UTF-8 text parser. Fails on invalid byte sequences.
pub fn text() -> Parser<String> {
    Box::new(|bytes| {
        String::from_utf8(bytes.to_vec())
            .map_err(|err| ParseFailure::new(format!("body is not valid UTF-8: {err}")))
    })
}

/// Generic structured-value parser producing a `serde_json::Value`.
pub fn json() -> Parser<serde_json::Value> {
    Box::new(|bytes| {
        serde_json::from_slice(bytes)
            .map_err(|err| ParseFailure::new(format!("body is not valid JSON: {err}")))
    })
}

/// Typed JSON parser deserializing straight into `T`.
pub fn json_as<T>() -> Parser<T>
where
    T: DeserializeOwned + Send + 'static,
{
    Box::new(|bytes| {
        serde_json::from_slice(bytes)
            .map_err(|err| ParseFailure::new(format!("body does not match expected shape: {err}")))
    })
}
