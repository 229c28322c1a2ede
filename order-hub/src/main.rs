use order_hub::{Config, ServerState, init_logger_with_file, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 环境变量 (.env 可选)
    dotenvy::dotenv().ok();

    // 2. 加载配置
    let config = Config::from_env();
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());

    tracing::info!(environment = %config.environment, "Order Hub starting...");
    if config.live_access_token.is_none() {
        if config.is_production() {
            anyhow::bail!("LIVE_ACCESS_TOKEN must be set in production");
        }
        tracing::warn!("LIVE_ACCESS_TOKEN not set, live channel accepts any token");
    }

    // 3. 初始化服务器状态
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = ServerState::new(config);

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down...");
        shutdown.cancel();
    });

    // 4. 启动 HTTP 服务器
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await?;

    tracing::info!("Order Hub stopped");
    Ok(())
}
