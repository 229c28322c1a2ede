//! Order Hub - 订单后台
//!
//! Serves the order REST API and the realtime live channel the dashboard
//! subscribes to.
//!
//! ```text
//! order-hub/src/
//! ├── core/          # 配置、状态
//! ├── api/           # HTTP 路由、live WebSocket
//! ├── orders/        # 订单仓库、状态机
//! ├── live/          # 实时事件分发
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod core;
pub mod live;
pub mod orders;
pub mod utils;

pub use core::{Config, ServerState};
pub use live::LiveHub;
pub use orders::{OrderRepository, OrderService};
pub use utils::logger::{init_logger, init_logger_with_file};
pub use utils::{AppError, AppResult};

use tokio::net::TcpListener;

/// Serve on `listener` until `state.shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = api::build_app(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Order Hub listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
