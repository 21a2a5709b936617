//! Fluent request builder bound to a session.
//!
//! # Design
//! Mutators move `self` and hand back the updated value, so builder state is
//! never aliased. Terminal methods borrow the builder, freeze its current
//! state into a `RequestDescriptor` and dispatch it — one bound `Target` can
//! issue several independent requests, each capturing the state in effect at
//! its own terminal call.
//!
//! Headers live in a map (later writes for a name win); query parameters are
//! an append-only ordered list, so duplicate names survive into the query
//! string as separate entries.

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::dispatch;
use crate::handle::RequestHandle;
use crate::outcome::Outcome;
use crate::parser::{self, Parser};
use crate::request::{Method, RequestDescriptor};
use crate::session::SessionInner;

pub struct Target {
    url: Url,
    headers: HashMap<String, String>,
    parameters: Vec<(String, String)>,
    session: Arc<SessionInner>,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl Target {
    pub(crate) fn new(url: Url, session: Arc<SessionInner>) -> Self {
        Self {
            url,
            headers: HashMap::new(),
            parameters: Vec::new(),
            session,
        }
    }

    /// Set a header; a later call with the same name overwrites.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in entries {
            self.headers.insert(name.into(), value.into());
        }
        self
    }

    /// Append a query parameter; duplicate names are preserved as separate
    /// entries, in insertion order.
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn parameters<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in entries {
            self.parameters.push((name.into(), value.into()));
        }
        self
    }

    /// GET with the default structured parser.
    pub fn get<F>(&self, callback: F) -> RequestHandle
    where
        F: FnOnce(Outcome<serde_json::Value>) + Send + 'static,
    {
        self.get_with(parser::json(), callback)
    }

    /// GET with a custom parser.
    pub fn get_with<T, F>(&self, parser: Parser<T>, callback: F) -> RequestHandle
    where
        T: Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.dispatch(Method::Get, None, parser, callback)
    }

    /// POST with the default text parser.
    pub fn post<F>(&self, body: Option<Vec<u8>>, callback: F) -> RequestHandle
    where
        F: FnOnce(Outcome<String>) + Send + 'static,
    {
        self.post_with(body, parser::text(), callback)
    }

    /// POST with a custom parser.
    pub fn post_with<T, F>(&self, body: Option<Vec<u8>>, parser: Parser<T>, callback: F) -> RequestHandle
    where
        T: Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.dispatch(Method::Post, body, parser, callback)
    }

    /// PUT with the default text parser.
    pub fn put<F>(&self, body: Option<Vec<u8>>, callback: F) -> RequestHandle
    where
        F: FnOnce(Outcome<String>) + Send + 'static,
    {
        self.put_with(body, parser::text(), callback)
    }

    /// PUT with a custom parser.
    pub fn put_with<T, F>(&self, body: Option<Vec<u8>>, parser: Parser<T>, callback: F) -> RequestHandle
    where
        T: Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.dispatch(Method::Put, body, parser, callback)
    }

    /// DELETE with the default text parser.
    pub fn delete<F>(&self, callback: F) -> RequestHandle
    where
        F: FnOnce(Outcome<String>) + Send + 'static,
    {
        self.delete_with(parser::text(), callback)
    }

    /// DELETE with a custom parser.
    pub fn delete_with<T, F>(&self, parser: Parser<T>, callback: F) -> RequestHandle
    where
        T: Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.dispatch(Method::Delete, None, parser, callback)
    }

    /// Freeze the current builder state into a descriptor.
    fn descriptor(&self, method: Method, body: Option<Vec<u8>>) -> RequestDescriptor {
        let mut url = self.url.clone();
        if !self.parameters.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.parameters {
                pairs.append_pair(name, value);
            }
        }
        RequestDescriptor::new(url, method, self.headers.clone(), body)
    }

    fn dispatch<T, F>(
        &self,
        method: Method,
        body: Option<Vec<u8>>,
        parser: Parser<T>,
        callback: F,
    ) -> RequestHandle
    where
        T: Send + 'static,
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let descriptor = self.descriptor(method, body);
        let handle = RequestHandle::new();
        self.session.track(handle.clone());

        // Untrack once the callback has run, so an idle session does not
        // retain settled handles until its next submission.
        let session = Arc::downgrade(&self.session);
        let settled = handle.clone();
        dispatch::dispatch(
            &self.session.transport,
            &self.session.queues,
            &handle,
            descriptor,
            parser,
            Box::new(move |outcome| {
                callback(outcome);
                if let Some(session) = session.upgrade() {
                    session.untrack(&settled);
                }
            }),
        );
        handle
    }
}
