use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::error::{AppError, ErrorBody};
use crate::extractors::context::RequestContext;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied request id that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 64;

/// Attach a request id and a cancellation token to every request, and stamp
/// the id into error bodies on the way out.
///
/// The token is a child of the server's shutdown token and is cancelled when
/// the request future is dropped, which happens when the client goes away.
pub async fn request_context(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    req.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
        cancel,
    });

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let response = next.run(req).instrument(span).await;
    stamp_request_id(response, &request_id)
}

fn stamp_request_id(response: Response, request_id: &str) -> Response {
    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    let Some(mut error) = parts.extensions.remove::<ErrorBody>() else {
        return Response::from_parts(parts, body);
    };
    error.request_id = request_id.to_owned();
    match serde_json::to_vec(&error) {
        Ok(bytes) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!("Failed to encode error body: {e}");
            Response::from_parts(parts, body)
        }
    }
}

/// Fallback for unmatched routes and methods.
pub async fn unknown_route() -> Response {
    AppError::UnknownRoute.into_response()
}
