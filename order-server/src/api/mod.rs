//! API 路由模块
//!
//! - [`health`] - 健康检查
//! - [`webhooks`] - 支付服务商 webhook 入口
//! - [`orders`] - 订单事件写入、回放与审计

pub mod health;
pub mod orders;
pub mod webhooks;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub use crate::utils::{AppResponse, AppResult};

/// Provider events are small; anything larger is not a webhook
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// All routes, no middleware
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(webhooks::router())
        .merge(orders::router())
}

/// Routes plus tower-http middleware; used by the server and by tests
pub fn build_app() -> Router<ServerState> {
    let request_id = HeaderName::from_static("x-request-id");
    build_router()
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
}
