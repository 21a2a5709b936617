//! Frozen request descriptors handed to the transport.
//!
//! # Design
//! A `RequestDescriptor` is built exactly once, when a terminal builder
//! method fires, and is never mutated afterwards. Query parameters are
//! already appended to the URL at that point, so transports see a single
//! ready-to-send URL rather than builder state.

use std::collections::HashMap;

use url::Url;

/// The closed set of supported HTTP methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

/// One HTTP request, frozen and ready for submission.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    url: Url,
    method: Method,
    headers: HashMap<String, String>,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub(crate) fn new(
        url: Url,
        method: Method,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
    ) -> Self {
        Self {
            url,
            method,
            headers,
            body,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}
