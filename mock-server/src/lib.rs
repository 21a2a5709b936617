//! httpbin-style echo server used by the core integration tests.
//!
//! # Design
//! Every echo endpoint reflects the request back as JSON: query parameters
//! under `args` (multi-valued, as arrays), request headers under `headers`,
//! the raw body under `data` and, when the body parses as a url-encoded
//! form, its fields under `form`. `/status/{code}` responds with the given
//! status and an empty body so the core's status classification can be
//! exercised without a real upstream.

use std::collections::BTreeMap;

use axum::{
    extract::Path,
    http::{header::HOST, HeaderMap, StatusCode, Uri},
    routing::{delete, get, post, put},
    Json, Router,
};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo_get))
        .route("/post", post(echo_body))
        .route("/put", put(echo_body))
        .route("/delete", delete(echo_body))
        .route("/status/{code}", get(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo_get(headers: HeaderMap, uri: Uri) -> Json<Value> {
    Json(json!({
        "args": args_map(uri.query()),
        "headers": headers_map(&headers),
        "url": full_url(&headers, &uri),
    }))
}

async fn echo_body(headers: HeaderMap, uri: Uri, body: Bytes) -> Json<Value> {
    let form = if is_form_content(&headers) {
        form_map(&body)
    } else {
        BTreeMap::new()
    };
    Json(json!({
        "args": args_map(uri.query()),
        "data": String::from_utf8_lossy(&body),
        "form": form,
        "headers": headers_map(&headers),
        "url": full_url(&headers, &uri),
    }))
}

fn is_form_content(headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Query string as a name -> [values] map, preserving duplicate names.
fn args_map(query: Option<&str>) -> BTreeMap<String, Vec<String>> {
    let pairs: Vec<(String, String)> = query
        .and_then(|q| serde_urlencoded::from_str(q).ok())
        .unwrap_or_default();
    let mut args: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        args.entry(name).or_default().push(value);
    }
    args
}

/// Body as url-encoded form fields, last value winning per name.
fn form_map(body: &[u8]) -> BTreeMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).unwrap_or_default();
    pairs.into_iter().collect()
}

fn headers_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).to_string(),
            )
        })
        .collect()
}

fn full_url(headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{host}{uri}")
}
