//! axum routes of the identity endpoints.
//!
//! ```text
//! GET  /sso/oauth2/authorize
//! GET  /sso/oauth2/scopes
//! POST /sso/oauth2/scopes
//! POST /sso/oauth2/access_token
//! GET  /sso/oauth2/user
//! POST /sso/login
//! POST /sso/logout
//! POST /sso/password
//! ```

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{OriginalUri, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode, Uri};
use pluglet_framework::{Reply, SecurityRequest};
use url::form_urlencoded;

use crate::service::{Endpoint, SecurityService};

/// Header naming the tenant a request belongs to.
pub const TENANT_HEADER: &str = "x-tenant-code";

const FORM_LIMIT: usize = 64 * 1024;

pub fn router(service: Arc<SecurityService>) -> Router {
    let oauth = Router::new()
        .route("/authorize", get(authorize))
        .route("/scopes", get(consent_info).post(consent))
        .route("/access_token", post(access_token))
        .route("/user", get(user));

    Router::new()
        .nest("/sso/oauth2", oauth)
        .route("/sso/login", post(login))
        .route("/sso/logout", post(logout))
        .route("/sso/password", post(change_password))
        .with_state(service)
}

type Service = State<Arc<SecurityService>>;

async fn authorize(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::Authorize, uri, request).await
}

async fn consent_info(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::ConsentInfo, uri, request).await
}

async fn consent(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::Consent, uri, request).await
}

async fn access_token(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::AccessToken, uri, request).await
}

async fn user(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::User, uri, request).await
}

async fn login(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::Login, uri, request).await
}

async fn logout(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::Logout, uri, request).await
}

async fn change_password(
    State(service): Service,
    OriginalUri(uri): OriginalUri,
    request: Request,
) -> Response {
    dispatch(&service, Endpoint::ChangePassword, uri, request).await
}

/// Turns the HTTP request into a [`SecurityRequest`] and runs it.
///
/// `uri` is the URI before nesting stripped its prefix; the full URL is
/// rebuilt from it and the configured external base URL.
async fn dispatch(
    service: &SecurityService,
    endpoint: Endpoint,
    uri: Uri,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let settings = service.settings();

    let tenant = parts
        .headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(&settings.default_tenant)
        .to_owned();

    let mut params: Vec<(String, String)> = uri
        .query()
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    if is_form(&parts.headers) {
        match to_bytes(body, FORM_LIMIT).await {
            Ok(bytes) => params.extend(form_urlencoded::parse(&bytes).into_owned()),
            Err(e) => return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response(),
        }
    }

    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let request = SecurityRequest {
        method: parts.method,
        url: format!("{}{path}", settings.base_url()),
        headers: parts.headers,
        params,
    };
    reply_response(service.handle(endpoint, &tenant, request).await)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

pub fn reply_response(reply: Reply) -> Response {
    let mut response = Response::new(Body::from(reply.body));
    *response.status_mut() = reply.status;
    *response.headers_mut() = reply.headers;
    response
}
