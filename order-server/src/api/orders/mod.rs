//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /orders | POST | 开单 |
//! | /orders/{id} | GET | 当前投影快照 |
//! | /orders/{id}/events | POST | 写入事件并投影 |
//! | /orders/{id}/replay | GET | 纯函数回放事件日志 |
//! | /orders/{id}/audit | GET | 回放结果与投影对比 |
//!
//! The live aggregate is never written here directly; every change is an
//! event that the projector applies.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::open))
        .route("/{id}", get(handler::snapshot))
        .route("/{id}/events", post(handler::emit))
        .route("/{id}/replay", get(handler::replay))
        .route("/{id}/audit", get(handler::audit))
}
