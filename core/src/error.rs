//! Construction-time errors.
//!
//! # Design
//! A malformed target URL is a contract violation by the calling code, not a
//! runtime condition of the network, so it is rejected up front at
//! `Session::target` with a dedicated error instead of surfacing later
//! through the outcome taxonomy.

use std::fmt;

/// Why a `Target` could not be constructed.
#[derive(Debug)]
pub enum TargetError {
    /// The string was not a syntactically valid absolute URL.
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    /// The URL parsed but its scheme is not one the transport can speak.
    UnsupportedScheme { url: String, scheme: String },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::InvalidUrl { url, source } => {
                write!(f, "invalid target URL {url:?}: {source}")
            }
            TargetError::UnsupportedScheme { url, scheme } => {
                write!(f, "unsupported scheme {scheme:?} in target URL {url:?}")
            }
        }
    }
}

impl std::error::Error for TargetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TargetError::InvalidUrl { source, .. } => Some(source),
            TargetError::UnsupportedScheme { .. } => None,
        }
    }
}
