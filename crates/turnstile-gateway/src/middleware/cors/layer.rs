//! CORS middleware layer.

use super::policy::CorsPolicy;
use crate::identity::CorrelationId;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode},
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// CORS middleware layer.
#[derive(Clone)]
pub struct CorsLayer {
    policy: Arc<CorsPolicy>,
    correlation_header: HeaderName,
}

impl CorsLayer {
    pub fn new(policy: CorsPolicy, correlation_header: HeaderName) -> Self {
        Self {
            policy: Arc::new(policy),
            correlation_header,
        }
    }
}

impl<S> Layer<S> for CorsLayer {
    type Service = CorsMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsMiddleware {
            inner,
            policy: self.policy.clone(),
            correlation_header: self.correlation_header.clone(),
        }
    }
}

#[derive(Clone)]
pub struct CorsMiddleware<S> {
    inner: S,
    policy: Arc<CorsPolicy>,
    correlation_header: HeaderName,
}

impl<S> Service<Request<Body>> for CorsMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let policy = self.policy.clone();
        let correlation_header = self.correlation_header.clone();

        // Take the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .filter(|origin| origin.to_str().is_ok_and(|o| policy.is_origin_allowed(o)))
                .cloned();

            let origin = match origin {
                Some(origin) if policy.applies_to(req.uri().path()) => origin,
                _ => return inner.call(req).await,
            };

            if req.method() == Method::OPTIONS {
                let correlation_id = CorrelationId::generate();
                debug!(
                    path = %req.uri().path(),
                    correlation_id = %correlation_id,
                    "Answered CORS preflight"
                );
                return Ok(preflight(&policy, &origin, &correlation_header, &correlation_id));
            }

            let mut response = inner.call(req).await?;
            add_cors_headers(response.headers_mut(), &policy, &origin);
            Ok(response)
        })
    }
}

fn preflight(
    policy: &CorsPolicy,
    origin: &HeaderValue,
    correlation_header: &HeaderName,
    correlation_id: &CorrelationId,
) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    add_cors_headers(headers, policy, origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, policy.allow_methods.clone());
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, policy.allow_headers.clone());
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, policy.max_age.clone());
    if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
        headers.insert(correlation_header.clone(), value);
    }

    response
}

fn add_cors_headers(headers: &mut HeaderMap, policy: &CorsPolicy, origin: &HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, policy.allow_origin_value(origin));
    headers.append(header::VARY, HeaderValue::from_static("Origin"));

    if policy.allow_credentials {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    if let Some(exposed) = &policy.expose_headers {
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, exposed.clone());
    }
}
