//! Forwarding of authenticated requests to upstream services.

use std::time::Duration;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{
        DefaultBodyLimit, FromRequest, Request, State,
        rejection::{BytesRejection, FailedToBufferBody},
    },
    http::{HeaderMap, HeaderName, HeaderValue},
    response::Response,
    routing::any,
};
use tracing::debug;
use url::Url;

use crate::api::{ApiError, ResultExt};
use crate::auth::AuthenticatedIdentity;

/// Verified subject, set on every forwarded request.
pub const IDENTITY_HEADER: &str = "x-authenticated-identity";
/// Verified role claim, set when the token carries one.
pub const ROLE_HEADER: &str = "x-authenticated-role";

/// Largest request body buffered for forwarding.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the HTTP client shared by every proxied route.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub upstream: Url,
}

/// Router forwarding `prefix` and everything beneath it to the upstream.
pub fn router(prefix: &str, state: ProxyState) -> Router {
    let nested = format!("{}/{{*rest}}", prefix.trim_end_matches('/'));
    Router::new()
        .route(prefix, any(forward))
        .route(&nested, any(forward))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn forward(
    State(state): State<ProxyState>,
    auth: AuthenticatedIdentity,
    request: Request,
) -> Result<Response, ApiError> {
    let method = request.method().clone();
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = upstream_url(&state.upstream, path_and_query);

    let headers = request_headers(request.headers(), &auth)?;
    let body = read_body(request).await?;

    debug!(identity = %auth.identity, method = %method, target = %target, "Forwarding request");

    let upstream_response = state
        .client
        .request(method, target.as_str())
        .headers(headers)
        .body(body)
        .send()
        .await
        .upstream_err("Failed to reach upstream")?;

    let status = upstream_response.status();
    let headers = response_headers(upstream_response.headers());
    let body = upstream_response
        .bytes()
        .await
        .upstream_err("Failed to read upstream response")?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Buffer the request body. Only the size limit is a 413; any other read
/// failure, such as the client going away, is a 400.
async fn read_body(request: Request) -> Result<Bytes, ApiError> {
    Bytes::from_request(request, &()).await.map_err(|rejection| match rejection {
        BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
            ApiError::payload_too_large("Request body too large")
        }
        other => {
            debug!(error = %other, "Failed to read request body");
            ApiError::bad_request("Failed to read request body")
        }
    })
}

/// Join the upstream base with the original path and query.
fn upstream_url(upstream: &Url, path_and_query: &str) -> String {
    format!("{}{}", upstream.as_str().trim_end_matches('/'), path_and_query)
}

/// Connection-scoped headers are never relayed in either direction.
fn is_relayed(name: &HeaderName) -> bool {
    !matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
            | "host"
            | "content-length"
    )
}

/// Copy client headers, replacing any identity headers with the verified ones.
fn request_headers(
    incoming: &HeaderMap,
    auth: &AuthenticatedIdentity,
) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 2);

    for (name, value) in incoming {
        if is_relayed(name)
            && name.as_str() != IDENTITY_HEADER
            && name.as_str() != ROLE_HEADER
        {
            headers.append(name.clone(), value.clone());
        }
    }

    let identity = HeaderValue::from_str(&auth.identity)
        .map_err(|_| ApiError::bad_request("Identity cannot be sent as a header"))?;
    headers.insert(HeaderName::from_static(IDENTITY_HEADER), identity);

    if let Some(role) = &auth.role {
        let role = HeaderValue::from_str(role)
            .map_err(|_| ApiError::bad_request("Role cannot be sent as a header"))?;
        headers.insert(HeaderName::from_static(ROLE_HEADER), role);
    }

    Ok(headers)
}

fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if is_relayed(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}
