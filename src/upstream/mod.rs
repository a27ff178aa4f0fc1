pub mod health;
pub mod mirror;
pub mod normalize;
pub mod primary;

use serde::Serialize;

pub use health::EndpointHealth;
pub use mirror::MirrorClient;
pub use primary::PrimaryClient;

/// 上游请求统一超时（毫秒）
pub const REQUEST_TIMEOUT_MS: u64 = 3500;

/// 端点冷却时长（毫秒），一次熔断跳过该端点两分钟
pub const ENDPOINT_COOLDOWN_MS: u64 = 120_000;

/// 连续失败多少次后进入冷却
pub const MAX_CONSECUTIVE_FAILURES: u32 = 1;

/// 镜像站会拒绝非浏览器UA，统一伪装
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 归一化后的歌曲
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Song {
    /// 歌曲ID（上游各自的主键，字符串化）
    pub id: String,
    /// 歌曲名
    pub name: String,
    /// 艺术家，多位时以", "连接
    pub artist: String,
    /// 专辑
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// 封面图URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pic: Option<String>,
    /// 来源平台
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 可播放URL，按需延迟解析
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 歌词URL或原始歌词文本提示
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lrc: Option<String>,
}

/// 表示单行歌词
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LyricLine {
    /// 时间（秒）
    pub time: f64,
    /// 歌词文本
    pub text: String,
}
