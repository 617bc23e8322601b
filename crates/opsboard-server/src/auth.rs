use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Authentication configuration for the hub and the REST API.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Bearer token required on every protected route. None = auth disabled.
    pub bearer_token: Option<String>,
}

/// Token presented by the caller, from the `Authorization: Bearer` header or,
/// for browser WebSocket clients that cannot set headers, the
/// `access_token` query parameter.
fn provided_token<'a>(headers: &'a HeaderMap, query: Option<&'a str>) -> Option<&'a str> {
    let from_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    from_header.or_else(|| {
        query?
            .split('&')
            .find_map(|pair| pair.strip_prefix("access_token="))
    })
}

/// Axum middleware that validates bearer token authentication.
/// If no token is configured, all requests are allowed through.
pub async fn bearer_auth_middleware(
    headers: HeaderMap,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    if let Some(ref expected) = auth_config.bearer_token {
        match provided_token(&headers, request.uri().query()) {
            Some(token) if token == expected => {},
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    }

    Ok(next.run(request).await)
}
