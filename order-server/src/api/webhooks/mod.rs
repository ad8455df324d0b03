//! Webhook 路由
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /webhooks/stripe | POST | Stripe 事件（签名已在上游校验） |
//!
//! 请求体解析失败返回 400；解析成功后入队，队列不可用时同步处理。

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use shared::payment::ProviderEvent;

use crate::core::ServerState;
use crate::jobs::DispatchMode;
use crate::utils::{AppResponse, AppResult, ok};

pub fn router() -> Router<ServerState> {
    Router::new().route("/webhooks/stripe", post(stripe))
}

pub async fn stripe(
    State(state): State<ServerState>,
    body: Bytes,
) -> AppResult<Json<AppResponse<DispatchMode>>> {
    let event = ProviderEvent::from_stripe_body(&body)?;
    tracing::debug!(
        provider_event_id = %event.provider_event_id,
        provider_event_type = %event.provider_event_type,
        "Stripe webhook received"
    );
    let mode = state.dispatcher.dispatch(event).await?;
    Ok(ok(mode))
}
