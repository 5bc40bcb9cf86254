//! The dispatch pipeline.
//!
//! `RECEIVED -> CLASSIFIED -> RATE_CHECKED -> (AUTH_CHECKED) -> PROPAGATED
//! -> FORWARDED -> RESPONDED`. Each phase takes the request context by value
//! and either hands it on or ends the request with a [`GatewayError`].

use super::context::{DispatchState, RequestContext};
use crate::error::{GatewayError, GatewayResult};
use crate::identity::{bearer_token, CorrelationId, VerifyError};
use crate::proxy::ForwardRequest;
use crate::rate_limit::{RateSubject, Verdict};
use crate::routing::RouteRule;
use crate::state::GatewayState;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Request},
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, error, warn};
use turnstile_common_http::strip_hop_by_hop;

const UNKNOWN_CLIENT: &str = "unknown";

/// Run one request through the gateway.
///
/// Always returns a response; failures are rendered as the error envelope.
/// The correlation id is set on every response.
pub async fn dispatch(state: Arc<GatewayState>, request: Request<Body>) -> Response {
    let correlation_id = CorrelationId::generate();
    let ctx = receive(&state, request, correlation_id.clone());

    let result = match tokio::time::timeout(state.request_timeout, run(&state, ctx)).await {
        Ok(result) => result,
        Err(_) => {
            error!(
                correlation_id = %correlation_id,
                budget = ?state.request_timeout,
                state = %DispatchState::FailedTimeout,
                "Request exceeded its overall budget"
            );
            Err(GatewayError::DeadlineExceeded(state.request_timeout))
        }
    };

    let mut response = match result {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    state
        .propagator
        .attach_correlation(response.headers_mut(), &correlation_id);
    response
}

async fn run<'a>(state: &'a GatewayState, ctx: RequestContext<'a>) -> GatewayResult<Response> {
    let (rule, ctx) = classify(state, ctx)?;
    let ctx = rate_check(state, rule, ctx)?;
    let ctx = authenticate(state, rule, ctx).await?;
    let ctx = propagate(state, ctx)?;
    forward(state, rule, ctx).await
}

/// RECEIVED: strip hop-by-hop and trusted headers before anything looks at
/// the request. Names listed in `Connection` go now, so they can never
/// remove headers the gateway sets later.
fn receive<'a>(
    state: &GatewayState,
    request: Request<Body>,
    correlation_id: CorrelationId,
) -> RequestContext<'a> {
    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    state.propagator.sanitize(&mut headers);

    let forwarded = if state.trust_forwarded_for {
        first_forwarded_for(&headers)
    } else {
        None
    };
    let client_ip = forwarded.or_else(|| peer_ip.clone());

    RequestContext {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers,
        body,
        client_key: client_ip.clone().unwrap_or_else(|| UNKNOWN_CLIENT.to_string()),
        client_ip,
        peer_ip,
        correlation_id,
        rule: None,
        identity: None,
        state: DispatchState::Received,
    }
}

fn first_forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse::<IpAddr>()
        .ok()
        .map(|ip| ip.to_string())
}

/// CLASSIFIED
fn classify<'a>(
    state: &'a GatewayState,
    mut ctx: RequestContext<'a>,
) -> GatewayResult<(&'a RouteRule, RequestContext<'a>)> {
    match state.routes.classify(&ctx.method, &ctx.path) {
        Ok(rule) => {
            ctx.rule = Some(rule);
            Ok((rule, ctx.advance(DispatchState::Classified)))
        }
        Err(_) => Err(fail(state, &ctx, GatewayError::NotFound)),
    }
}

/// RATE_CHECKED: global tiers plus the rule's own.
fn rate_check<'a>(
    state: &GatewayState,
    rule: &RouteRule,
    ctx: RequestContext<'a>,
) -> GatewayResult<RequestContext<'a>> {
    let tiers = applicable_tiers(state, rule);
    if tiers.is_empty() {
        return Ok(ctx.advance(DispatchState::RateChecked));
    }

    let subject = RateSubject {
        client: &ctx.client_key,
        route: &rule.name,
        class: rule.class,
    };

    match state.limiter.admit_request(&tiers, &subject, 1.0) {
        Ok(Verdict::Admitted) => Ok(ctx.advance(DispatchState::RateChecked)),
        Ok(Verdict::Rejected { tier, retry_after }) => {
            Err(fail(state, &ctx, GatewayError::RateLimited { tier, retry_after }))
        }
        Err(e) => Err(fail(state, &ctx, GatewayError::Internal(e.into()))),
    }
}

/// AUTH_CHECKED: protected routes only.
async fn authenticate<'a>(
    state: &GatewayState,
    rule: &RouteRule,
    mut ctx: RequestContext<'a>,
) -> GatewayResult<RequestContext<'a>> {
    if !rule.is_protected() {
        return Ok(ctx);
    }

    let token = match bearer_token(&ctx.headers) {
        Ok(token) => token.to_string(),
        Err(err) => return Err(fail(state, &ctx, err)),
    };

    let outcome = tokio::time::timeout(state.verifier_timeout, state.verifier.verify(&token)).await;
    let identity = match outcome {
        Ok(Ok(identity)) => identity,
        Ok(Err(VerifyError::Rejected(reason))) => {
            return Err(fail(state, &ctx, GatewayError::Unauthenticated(reason)));
        }
        Ok(Err(VerifyError::Timeout)) | Err(_) => {
            let err = GatewayError::AuthServiceUnavailable {
                policy: state.outage_status,
                detail: "504: verifier timed out".to_string(),
            };
            return Err(fail(state, &ctx, err));
        }
        Ok(Err(VerifyError::Unavailable(detail))) => {
            let err = GatewayError::AuthServiceUnavailable {
                policy: state.outage_status,
                detail: format!("502: {}", detail),
            };
            return Err(fail(state, &ctx, err));
        }
    };

    if !rule.permits_role(&identity.role) {
        let err = GatewayError::Forbidden {
            route: rule.name.clone(),
            role: identity.role.clone(),
        };
        return Err(fail(state, &ctx, err));
    }

    ctx.identity = Some(identity);
    Ok(ctx.advance(DispatchState::AuthChecked))
}

/// PROPAGATED
fn propagate<'a>(state: &GatewayState, mut ctx: RequestContext<'a>) -> GatewayResult<RequestContext<'a>> {
    let attached = match &ctx.identity {
        Some(identity) => state
            .propagator
            .attach(&mut ctx.headers, identity, &ctx.correlation_id),
        None => {
            state
                .propagator
                .attach_correlation(&mut ctx.headers, &ctx.correlation_id);
            Ok(())
        }
    };

    match attached {
        Ok(()) => Ok(ctx.advance(DispatchState::Propagated)),
        Err(err) => Err(fail(state, &ctx, err)),
    }
}

/// FORWARDED -> RESPONDED
async fn forward(state: &GatewayState, rule: &RouteRule, mut ctx: RequestContext<'_>) -> GatewayResult<Response> {
    let request = ForwardRequest {
        method: ctx.method.clone(),
        path: ctx.path.clone(),
        query: ctx.query.take(),
        headers: std::mem::take(&mut ctx.headers),
        body: std::mem::replace(&mut ctx.body, Body::empty()),
        client_ip: ctx.client_ip.clone(),
        peer_ip: ctx.peer_ip.clone(),
    };

    match state.forwarder.forward(rule, request).await {
        Ok(response) => {
            let ctx = ctx.advance(DispatchState::Forwarded);
            debug!(
                correlation_id = %ctx.correlation_id,
                route = %rule.name,
                backend = %rule.backend,
                status = response.status().as_u16(),
                state = %DispatchState::Responded,
                "Request forwarded"
            );
            Ok(response)
        }
        Err(err) => Err(fail(state, &ctx, err.into())),
    }
}

fn applicable_tiers(state: &GatewayState, rule: &RouteRule) -> Vec<String> {
    state
        .global_tiers
        .iter()
        .chain(rule.tiers.iter())
        .cloned()
        .collect()
}

/// Log a failure with the request's context and hand the error back.
fn fail(state: &GatewayState, ctx: &RequestContext<'_>, err: GatewayError) -> GatewayError {
    let terminal = DispatchState::for_error(&err);
    let route = ctx.route_name();
    let tiers = ctx
        .rule
        .map(|rule| applicable_tiers(state, rule).join(","))
        .unwrap_or_default();

    match &err {
        GatewayError::NotFound => debug!(
            correlation_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %ctx.path,
            state = %terminal,
            "No route matched"
        ),
        GatewayError::RateLimited { tier, retry_after } => warn!(
            correlation_id = %ctx.correlation_id,
            route,
            tiers = %tiers,
            tier = %tier,
            client = %ctx.client_key,
            retry_after = ?retry_after,
            state = %terminal,
            "Request rate limited"
        ),
        GatewayError::Unauthenticated(_) | GatewayError::Forbidden { .. } => warn!(
            correlation_id = %ctx.correlation_id,
            route,
            error = %err,
            state = %terminal,
            "Request rejected"
        ),
        GatewayError::AuthServiceUnavailable { .. } => error!(
            correlation_id = %ctx.correlation_id,
            route,
            tiers = %tiers,
            upstream = state.verifier.name(),
            error = %err,
            state = %terminal,
            "Auth path failure"
        ),
        GatewayError::UpstreamUnavailable { upstream, .. } | GatewayError::UpstreamTimeout { upstream } => error!(
            correlation_id = %ctx.correlation_id,
            route,
            tiers = %tiers,
            upstream = %upstream,
            error = %err,
            state = %terminal,
            "Upstream failure"
        ),
        GatewayError::DeadlineExceeded(_) | GatewayError::Internal(_) => error!(
            correlation_id = %ctx.correlation_id,
            route,
            error = ?err,
            state = %terminal,
            "Request failed"
        ),
    }

    err
}
