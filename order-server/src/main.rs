use order_server::{Server, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境 (dotenv, 日志) 与配置
    let config = setup_environment();
    tracing::info!(
        database = %config.database_path,
        port = config.http_port,
        "Order server starting..."
    );

    // 2. 启动 HTTP 服务器 (含后台任务)
    if let Err(e) = Server::new(config).run().await {
        tracing::error!(error = %e, "Server error");
        return Err(e);
    }

    Ok(())
}
