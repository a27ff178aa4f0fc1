use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use music_proxy_rs::config::Config;
use music_proxy_rs::server::{self, AppState};

/// 音乐元数据代理服务
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// 配置文件路径，缺省时使用XDG配置目录
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 覆盖配置中的监听地址
    #[arg(short, long)]
    listen: Option<String>,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(args.config)?;
    if let Some(listen) = args.listen {
        config.listen = listen;
    }

    let state = AppState::from_config(config)?;
    server::serve(state).await
}
