use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-request identity and cancellation, installed by the request-context
/// middleware.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub cancel: CancellationToken,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(ctx.clone());
        }
        // Routers built without the middleware still get a usable context.
        let ctx = RequestContext {
            request_id: Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
        };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}
