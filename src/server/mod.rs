mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::upstream::{EndpointHealth, MirrorClient, PrimaryClient};

pub use routes::build_router;

/// 路由共享状态，随服务进程存活
pub struct AppState {
    pub config: Config,
    pub health: Arc<EndpointHealth>,
    pub mirror: MirrorClient,
    pub primary: PrimaryClient,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Self> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let health = Arc::new(EndpointHealth::new(
            Duration::from_millis(config.endpoint_cooldown_ms),
            config.max_consecutive_failures,
        ));
        let mirror = MirrorClient::new(config.mirrors.clone(), Arc::clone(&health), timeout)?;
        let primary = PrimaryClient::new(config.primary.clone(), timeout)?;

        Ok(Self {
            config,
            health,
            mirror,
            primary,
        })
    }
}

/// 启动HTTP服务，Ctrl-C优雅退出
pub async fn serve(state: AppState) -> Result<()> {
    let listen = state.config.listen.clone();
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("音乐代理服务已启动: http://{}/api/music", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("收到终止信号，正在退出");
}
