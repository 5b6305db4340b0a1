//! Activity log recorder.
//!
//! Runs after principal resolution. Requests with an identifiable caller
//! (a principal's email, or the raw bearer value when it resolved to no one)
//! are appended to the activity log once the handler has answered. Failing
//! to write the entry is logged and never changes the response.

use axum::{
    body::{Body, BodyDataStream, Bytes},
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use entities::Activity;
use futures_util::{StreamExt, stream};
use inventory_store::InventoryStore;
use serde_json::{Map, Value, json};
use url::form_urlencoded;

use crate::middleware::{BearerCredential, Principal};
use crate::state::SharedState;

/// Placeholder written over sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Middleware that appends an [`Activity`] for each identified request.
pub async fn record_activity<S: InventoryStore + 'static>(
    State(state): State<SharedState<S>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(actor) = actor_of(&request) else {
        return next.run(request).await;
    };

    let action = format!("{} {}", request.method(), request.uri().path());
    let query = query_details(request.uri().query());
    let (request, body) = capture_body(request, state.config.max_body_bytes).await;

    let response = next.run(request).await;

    let details = json!({
        "body": body,
        "query": query,
        "status": response.status().as_u16(),
    });
    if let Err(e) = state
        .store
        .append_activity(Activity::new(actor, action.as_str(), details))
        .await
    {
        tracing::warn!(error = %e, action = %action, "Failed to record activity");
    }

    response
}

fn actor_of(request: &Request) -> Option<String> {
    let extensions = request.extensions();
    if let Some(principal) = extensions.get::<Principal>() {
        return Some(principal.user.email.clone());
    }
    extensions
        .get::<BearerCredential>()
        .map(|BearerCredential(token)| token.clone())
}

/// Buffers up to `limit` bytes of the body so it can be both logged and
/// handed to the handler.
///
/// Bodies that turn out larger than `limit`, or that fail mid-stream, are
/// passed on unchanged (already-read chunks first) and logged as omitted.
async fn capture_body(request: Request, limit: usize) -> (Request, Value) {
    let declared = request
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return (request, omitted(declared, limit));
    }

    let (parts, body) = request.into_parts();
    let mut rest = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut read = 0usize;

    while let Some(chunk) = rest.next().await {
        match chunk {
            Ok(chunk) => {
                read += chunk.len();
                chunks.push(chunk);
                if read > limit {
                    let body = replay(chunks, None, rest);
                    return (Request::from_parts(parts, body), omitted(declared, limit));
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Request body failed while capturing");
                let body = replay(chunks, Some(e), rest);
                return (Request::from_parts(parts, body), omitted(declared, limit));
            }
        }
    }

    let bytes: Bytes = chunks.concat().into();
    let captured = body_details(&bytes);
    (Request::from_parts(parts, Body::from(bytes)), captured)
}

/// Rebuilds a body from the chunks already read, an optional error and the
/// unread remainder.
fn replay(chunks: Vec<Bytes>, error: Option<axum::Error>, rest: BodyDataStream) -> Body {
    let head = stream::iter(chunks.into_iter().map(Ok).chain(error.map(Err)));
    Body::from_stream(head.chain(rest))
}

fn omitted(declared: Option<usize>, limit: usize) -> Value {
    json!({ "omitted": true, "declared_bytes": declared, "limit_bytes": limit })
}

fn body_details(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice::<Value>(bytes) {
        Ok(mut value) => {
            redact(&mut value);
            value
        }
        Err(_) => json!({ "unparsed_bytes": bytes.len() }),
    }
}

fn query_details(query: Option<&str>) -> Value {
    let Some(query) = query else {
        return Value::Object(Map::new());
    };
    let mut pairs: Map<String, Value> = form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
        .collect();
    for (key, value) in pairs.iter_mut() {
        if is_sensitive(key) {
            *value = Value::String(REDACTED.to_string());
        }
    }
    Value::Object(pairs)
}

fn is_sensitive(key: &str) -> bool {
    key.to_ascii_lowercase().contains("password")
}

/// Replaces every password-like field, at any depth, with [`REDACTED`].
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if is_sensitive(key) {
                    *field = Value::String(REDACTED.to_string());
                } else {
                    redact(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}
