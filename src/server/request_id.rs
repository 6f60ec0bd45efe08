//! Per-request correlation ids.
//!
//! Every request runs inside a task-local scope holding its id, so errors
//! built anywhere below the handler report the same id the client sees in
//! `X-Request-ID`.

use std::future::Future;

use axum::extract::Request;
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static REQUEST_ID: Uuid;
}

/// The id of the request being served, or a fresh one outside a request.
pub fn current() -> Uuid {
    REQUEST_ID.try_with(|id| *id).unwrap_or_else(|_| Uuid::new_v4())
}

/// Run `fut` under the current request's id. Used for spawned tasks,
/// which do not inherit task-locals.
pub fn scoped<F: Future>(fut: F) -> impl Future<Output = F::Output> {
    REQUEST_ID.scope(current(), fut)
}

pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    let span = info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let mut response = REQUEST_ID
        .scope(id, next.run(request).instrument(span))
        .await;

    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }
    response
}
