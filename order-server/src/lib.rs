//! Order Server - 订单事件溯源核心
//!
//! # 架构概述
//!
//! - **订单事件** (`orders`): 按订单递增、无间隙的事件日志，纯函数回放，游标投影
//! - **支付** (`payments`): webhook 入账（幂等账本）与分账结算
//! - **推送** (`broadcast`): 投影提交后推送订单快照
//! - **后台任务** (`jobs`): webhook 队列，失败时同步回退
//! - **HTTP API** (`api`): webhook 入口、事件写入、回放与审计
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、后台任务、服务器
//! ├── api/           # HTTP 路由和处理器
//! ├── db/            # SQLite 连接池、迁移、仓储函数
//! ├── orders/        # 事件存储、回放、投影
//! ├── payments/      # 账本、webhook 入账、结算
//! ├── broadcast/     # 实时推送
//! ├── jobs/          # 异步任务
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod broadcast;
pub mod core;
pub mod db;
pub mod jobs;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export 公共类型
pub use broadcast::{Broadcaster, LiveOrderHub};
pub use core::{Config, Server, ServerState};
pub use jobs::{JobEnqueuer, WebhookDispatcher};
pub use orders::{EventStore, OrdersManager, Projector, reduce};
pub use payments::{Ledger, WebhookIngestor};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env` and initialize logging from the resulting config
pub fn setup_environment() -> Config {
    // 开发环境下从 .env 加载，文件不存在时忽略
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );
    config
}
