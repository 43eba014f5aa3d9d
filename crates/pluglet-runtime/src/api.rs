//! HTTP surface of the plugin domains.
//!
//! ```text
//! GET  /api/plugins/{domain}               live records of the tenant
//! GET  /api/plugins/{domain}/types         registered plugin types
//! GET  /api/plugins/{domain}/types/{code}  control table of one type
//! POST /api/logs                           collect a batch of log records
//! POST /api/multicast/{id}                 publish a standard message
//! POST /api/multicast/{id}/custom          publish a channel-specific body
//! ANY  /gateway/{*path}                    run the gateway filters
//! ```
//!
//! The tenant comes from the `X-Tenant-Code` header, else the default tenant.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Json, Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode};
use serde_json::{Value, json};
use tower::service_fn;
use tower::util::BoxCloneSyncService;
use tracing::{Instrument, error, info_span, warn};

use pluglet_core::{BoxError, Payload, PluginDomain};
use pluglet_framework::{
    GatewayExchange, GatewayRequest, LogCollector, LogRecord, Multicast, MulticastError, Reply,
    StandardBody, Terminal, filter_request,
};
use pluglet_security::TENANT_HEADER;
use pluglet_security::routes::reply_response;

use crate::pipelines::Pipelines;

/// Shared state of the domain endpoints.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub pipelines: Pipelines,
    pub collector: LogCollector,
    pub multicast: Multicast,
    pub default_tenant: String,
}

impl ApiState {
    fn tenant(&self, headers: &HeaderMap) -> String {
        headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.default_tenant)
            .to_owned()
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/plugins/{domain}", get(loaded_plugins))
        .route("/api/plugins/{domain}/types", get(plugin_types))
        .route("/api/plugins/{domain}/types/{code}", get(describe_type))
        .route("/api/logs", post(collect_logs))
        .route("/api/multicast/{id}", post(publish_standard))
        .route("/api/multicast/{id}/custom", post(publish_custom))
        .route("/gateway/{*path}", any(gateway))
        .with_state(state)
}

type Api = State<Arc<ApiState>>;

async fn loaded_plugins(
    State(state): Api,
    Path(domain): Path<PluginDomain>,
    headers: HeaderMap,
) -> Response {
    let tenant = state.tenant(&headers);
    let records = state.pipelines.get(domain).loaded(&tenant);
    Json(json!({ "tenant": tenant, "domain": domain, "plugins": records })).into_response()
}

async fn plugin_types(State(state): Api, Path(domain): Path<PluginDomain>) -> Response {
    Json(state.pipelines.get(domain).types()).into_response()
}

async fn describe_type(
    State(state): Api,
    Path((domain, code)): Path<(PluginDomain, String)>,
) -> Response {
    match state.pipelines.get(domain).describe(&code) {
        Some(Ok(fields)) => Json(fields).into_response(),
        Some(Err(e)) => {
            error!(
                domain = %domain,
                plugin = %code,
                error = %e,
                "Plugin type has an invalid schema"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        None => (StatusCode::NOT_FOUND, format!("unknown {domain} type '{code}'")).into_response(),
    }
}

async fn collect_logs(
    State(state): Api,
    headers: HeaderMap,
    Json(records): Json<Vec<LogRecord>>,
) -> Response {
    let tenant = state.tenant(&headers);
    let report = state
        .collector
        .collect(&tenant, records)
        .instrument(info_span!("collect", tenant = %tenant))
        .await;
    Json(json!({
        "accepted": report.accepted,
        "rejected": report.rejected,
        "failed": report.failed,
    }))
    .into_response()
}

async fn publish_standard(
    State(state): Api,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<StandardBody>,
) -> Response {
    let tenant = state.tenant(&headers);
    multicast_response(state.multicast.publish_standard(&tenant, &id, body).await)
}

async fn publish_custom(
    State(state): Api,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let tenant = state.tenant(&headers);
    multicast_response(state.multicast.publish(&tenant, &id, Payload::new(body)).await)
}

fn multicast_response(result: Result<(), MulticastError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ MulticastError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string()).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Multicast delivery failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Runs the tenant's filters over the request. There is no upstream
/// transport; the terminal answers with the request as it would be
/// forwarded.
async fn gateway(State(state): Api, request: Request) -> Response {
    let (parts, _body) = request.into_parts();
    let tenant = state.tenant(&parts.headers);

    let mut forwarded = GatewayRequest::new(parts.method, parts.uri.path());
    forwarded.query = parts.uri.query().map(str::to_owned);
    forwarded.content_length = parts
        .headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    forwarded.remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    forwarded.headers = parts.headers;

    let exchange = Arc::new(GatewayExchange::new(tenant.as_str(), forwarded));
    let span = info_span!("gateway", tenant = %tenant);
    let result = filter_request(&state.pipelines.filters, Arc::clone(&exchange), echo_upstream())
        .instrument(span)
        .await;

    match result {
        Ok(()) => match exchange.reply() {
            Some(reply) => reply_response(reply),
            None => {
                reply_response(Reply::text(StatusCode::BAD_GATEWAY, "no response from upstream"))
            }
        },
        Err(e) => {
            error!(tenant = %tenant, error = %e, "Gateway filter chain failed");
            reply_response(Reply::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn echo_upstream() -> Terminal<GatewayExchange> {
    BoxCloneSyncService::new(service_fn(|exchange: Arc<GatewayExchange>| {
        let forwarded = {
            let request = exchange.request();
            let headers: serde_json::Map<String, Value> = request
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.to_string(), Value::from(value.to_str().ok()?)))
                })
                .collect();
            json!({
                "method": request.method.as_str(),
                "path": request.path,
                "query": request.query,
                "headers": headers,
            })
        };
        exchange.respond(Reply::json(StatusCode::OK, &forwarded));
        std::future::ready(Ok::<_, BoxError>(()))
    }))
}
