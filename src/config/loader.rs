use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::upstream::{ENDPOINT_COOLDOWN_MS, MAX_CONSECUTIVE_FAILURES, REQUEST_TIMEOUT_MS};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// HTTP监听地址
    pub listen: String,

    /// 未指定source参数时的默认平台
    pub default_source: String,

    /// hot动作的默认搜索关键词
    pub default_keyword: String,

    /// 单次上游请求超时（毫秒）
    pub request_timeout_ms: u64,

    /// 端点冷却时长（毫秒）
    pub endpoint_cooldown_ms: u64,

    /// 连续失败多少次进入冷却
    pub max_consecutive_failures: u32,

    /// 旧版镜像列表，按优先级排列
    pub mirrors: Vec<String>,

    /// 主提供方配置，不配置则只使用镜像
    pub primary: Option<PrimaryConfig>,
}

/// 主提供方（凭据制）配置
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PrimaryConfig {
    /// API基础地址
    pub base_url: String,

    /// 静态API密钥，置空则禁用主提供方
    pub api_key: String,

    /// 是否将搜索也走主提供方（methods协议，默认关闭）
    #[serde(default)]
    pub enable_search: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: "127.0.0.1:8920".to_string(),
            default_source: "netease".to_string(),
            default_keyword: "Lo-Fi".to_string(),
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            endpoint_cooldown_ms: ENDPOINT_COOLDOWN_MS,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
            mirrors: vec![
                "https://api.tunefree.fun/api/".to_string(),
                "https://music-dl.sayqz.com/api/".to_string(),
            ],
            primary: Some(PrimaryConfig {
                base_url: "https://tunehub.sayqz.com/api".to_string(),
                api_key: String::new(),
                enable_search: false,
            }),
        }
    }
}

impl Config {
    /// 加载配置，支持从指定路径或默认路径加载
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let pkg_name = env!("CARGO_PKG_NAME");
        let config_path = path.unwrap_or_else(|| {
            dirs::config_dir()
                .map(|p| p.join(pkg_name).join("config.toml"))
                .unwrap_or_else(|| PathBuf::from(format!("{}-config.toml", pkg_name)))
        });

        debug!("尝试从 {:?} 加载配置文件", config_path);

        if !config_path.exists() {
            debug!("配置文件 {:?} 不存在，将创建默认配置", config_path);
            let default_config = Config::default();
            let toml = toml::to_string_pretty(&default_config)?;

            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(&config_path, toml)?;
            info!("已创建默认配置文件: {:?}", config_path);
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = match toml::from_str(&content) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("解析配置文件 {:?} 失败: {}，将加载默认配置", config_path, e);
                Config::default()
            }
        };

        debug!("已成功加载配置文件");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_source, "netease");
        assert_eq!(config.max_consecutive_failures, 1);
        assert_eq!(config.endpoint_cooldown_ms, 120_000);
        assert_eq!(config.mirrors.len(), 2);
        assert!(config.primary.is_some());
    }

    #[test]
    fn test_enable_search_defaults_off() {
        let toml = r#"
listen = "127.0.0.1:9000"
default_source = "netease"
default_keyword = "Lo-Fi"
request_timeout_ms = 3500
endpoint_cooldown_ms = 120000
max_consecutive_failures = 1
mirrors = ["https://m.example/api/"]

[primary]
base_url = "https://p.example/api"
api_key = "k"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let primary = config.primary.unwrap();
        assert!(!primary.enable_search);
        assert_eq!(primary.api_key, "k");
    }
}
