//! Router assembly.

mod internal;

use crate::dispatch::dispatch;
use crate::identity::CorrelationId;
use crate::middleware::CorsLayer;
use crate::state::GatewayState;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::map_response_with_state,
    response::Response,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the gateway router.
///
/// `/internal/*` is answered locally; every other request goes through the
/// dispatcher. Both carry a correlation id.
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new(
        state.cors.clone(),
        state.propagator.correlation_header().clone(),
    );

    Router::new()
        .nest(
            "/internal",
            internal::router().layer(map_response_with_state(state.clone(), tag_correlation)),
        )
        .fallback(gateway_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn gateway_handler(State(state): State<Arc<GatewayState>>, request: Request<Body>) -> Response {
    dispatch(state, request).await
}

async fn tag_correlation(State(state): State<Arc<GatewayState>>, mut response: Response) -> Response {
    state
        .propagator
        .attach_correlation(response.headers_mut(), &CorrelationId::generate());
    response
}
