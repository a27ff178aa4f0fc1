use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::normalize::normalize_songs;
use super::{Song, USER_AGENT};
use crate::config::PrimaryConfig;

/// 主提供方解析结果
#[derive(Debug, Clone, Default)]
pub struct ParsedMedia {
    pub url: Option<String>,
    pub pic: Option<String>,
    pub lrc: Option<String>,
}

/// 主提供方客户端（凭据制，methods协议）
///
/// 解析接口消耗远端积分，因此只用于URL解析；搜索接口虽然保留，
/// 但因网络不稳定默认不启用，见配置项enable_search。
/// 未配置凭据时客户端处于惰性状态，所有调用直接返回None。
pub struct PrimaryClient {
    client: reqwest::Client,
    endpoint: Option<PrimaryConfig>,
    timeout: Duration,
}

impl PrimaryClient {
    pub fn new(endpoint: Option<PrimaryConfig>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        // 空密钥等同于未配置
        let endpoint = endpoint.filter(|ep| !ep.api_key.is_empty());
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    /// 请求的平台映射为主提供方的内部平台码，不支持的平台返回None
    pub fn platform_code(source: &str) -> Option<&'static str> {
        match source {
            "netease" => Some("netease"),
            "qq" => Some("qq"),
            "kuwo" => Some("kuwo"),
            _ => None,
        }
    }

    /// 是否启用了搜索路径
    pub fn search_enabled(&self) -> bool {
        self.endpoint
            .as_ref()
            .is_some_and(|ep| ep.enable_search)
    }

    /// 通过parse接口解析高质量播放URL，单次尝试，失败由调用方回退
    pub async fn parse_url(&self, source: &str, id: &str, quality: &str) -> Option<ParsedMedia> {
        let endpoint = self.endpoint.as_ref()?;
        let platform = Self::platform_code(source)?;

        let url = format!("{}/v1/parse", endpoint.base_url);
        let body = json!({
            "platform": platform,
            "ids": id,
            "quality": quality,
        });

        let resp = match self
            .client
            .post(&url)
            .header("X-API-Key", &endpoint.api_key)
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("主提供方parse请求失败: {}", e);
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            warn!("主提供方parse接口错误: HTTP {}", status);
            return None;
        }

        let data: Value = resp.json().await.ok()?;
        parse_media_payload(&data)
    }

    /// 两步式method发现搜索：先取方法描述模板，再按模板发起真正的搜索请求
    ///
    /// 保留的次级路径，默认不接入search动作。
    pub async fn search(
        &self,
        source: &str,
        keyword: &str,
        page: u32,
        page_size: u32,
    ) -> Vec<Song> {
        let Some(endpoint) = self.endpoint.as_ref() else {
            return Vec::new();
        };
        let Some(platform) = Self::platform_code(source) else {
            debug!("主提供方不支持平台 {}，跳过搜索", source);
            return Vec::new();
        };

        // 第一步：获取搜索方法描述
        let method_url = format!("{}/v1/methods/{}/search", endpoint.base_url, platform);
        let resp = match self
            .client
            .get(&method_url)
            .header("X-API-Key", &endpoint.api_key)
            .header("User-Agent", USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("主提供方methods接口错误: HTTP {}", resp.status());
                return Vec::new();
            }
            Err(e) => {
                warn!("主提供方methods请求失败: {}", e);
                return Vec::new();
            }
        };

        let method_config: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("主提供方方法描述解析失败: {}", e);
                return Vec::new();
            }
        };
        let Some(descriptor) = method_config.get("data") else {
            warn!("主提供方方法描述缺少data字段");
            return Vec::new();
        };

        // 第二步：按描述模板发起搜索请求
        let Some(url_template) = descriptor.get("url").and_then(Value::as_str) else {
            return Vec::new();
        };
        // URL模板中的keyword需要编码，params中的保持原样
        let search_url = fill_template(url_template, keyword, page, page_size, true);

        let mut params: Vec<(String, String)> = Vec::new();
        if let Some(map) = descriptor.get("params").and_then(Value::as_object) {
            for (key, value) in map {
                let raw = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                params.push((key.clone(), fill_template(&raw, keyword, page, page_size, false)));
            }
        }

        let method = descriptor
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let mut request = match method {
            "POST" => self.client.post(&search_url),
            _ => self.client.get(&search_url),
        };
        request = request.header("User-Agent", USER_AGENT).query(&params);
        if let Some(headers) = descriptor.get("headers").and_then(Value::as_object) {
            for (key, value) in headers {
                if let Some(v) = value.as_str() {
                    request = request.header(key.as_str(), v);
                }
            }
        }

        let resp = match request.timeout(self.timeout).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("主提供方搜索请求错误: HTTP {}", resp.status());
                return Vec::new();
            }
            Err(e) => {
                warn!("主提供方搜索请求失败: {}", e);
                return Vec::new();
            }
        };

        match resp.json::<Value>().await {
            Ok(payload) => normalize_songs(&payload, source),
            Err(e) => {
                warn!("主提供方搜索响应解析失败: {}", e);
                Vec::new()
            }
        }
    }
}

/// 替换方法描述中的 {{keyword}} / {{page}} / {{pageSize}} 占位符
fn fill_template(
    template: &str,
    keyword: &str,
    page: u32,
    page_size: u32,
    encode_keyword: bool,
) -> String {
    let keyword = if encode_keyword {
        urlencoding::encode(keyword).into_owned()
    } else {
        keyword.to_string()
    };
    template
        .replace("{{keyword}}", &keyword)
        .replace("{{page}}", &page.to_string())
        .replace("{{pageSize}}", &page_size.to_string())
}

/// 解析parse接口响应：code==200且data非空时取第一条的URL/封面/歌词
fn parse_media_payload(data: &Value) -> Option<ParsedMedia> {
    if data.get("code").and_then(Value::as_i64) != Some(200) {
        return None;
    }
    let first = data.get("data").and_then(Value::as_array)?.first()?;

    let pick = |aliases: &[&str]| -> Option<String> {
        aliases
            .iter()
            .find_map(|key| first.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(ParsedMedia {
        url: pick(&["url", "playUrl"]),
        pic: pick(&["pic", "cover", "picUrl"]),
        lrc: pick(&["lrc", "lyric"]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_platform_code() {
        assert_eq!(PrimaryClient::platform_code("netease"), Some("netease"));
        assert_eq!(PrimaryClient::platform_code("qq"), Some("qq"));
        assert_eq!(PrimaryClient::platform_code("kuwo"), Some("kuwo"));
        assert_eq!(PrimaryClient::platform_code("bilibili"), None);
        assert_eq!(PrimaryClient::platform_code("all"), None);
    }

    #[test]
    fn test_fill_template() {
        let url = fill_template(
            "https://u.example/search?w={{keyword}}&p={{page}}&n={{pageSize}}",
            "稻香 周杰伦",
            2,
            30,
            true,
        );
        assert_eq!(
            url,
            "https://u.example/search?w=%E7%A8%BB%E9%A6%99%20%E5%91%A8%E6%9D%B0%E4%BC%A6&p=2&n=30"
        );

        // params中的占位符不做URL编码
        assert_eq!(
            fill_template("{{keyword}}/{{page}}", "a b", 1, 30, false),
            "a b/1"
        );
    }

    #[test]
    fn test_parse_media_payload() {
        let payload = json!({
            "code": 200,
            "data": [{"url": "http://u/1.mp3", "cover": "http://p/1.jpg", "lyric": "http://l/1.lrc"}]
        });
        let media = parse_media_payload(&payload).unwrap();
        assert_eq!(media.url.as_deref(), Some("http://u/1.mp3"));
        assert_eq!(media.pic.as_deref(), Some("http://p/1.jpg"));
        assert_eq!(media.lrc.as_deref(), Some("http://l/1.lrc"));

        // 非200或空结果集一律视为失败
        assert!(parse_media_payload(&json!({"code": 500, "data": []})).is_none());
        assert!(parse_media_payload(&json!({"code": 200, "data": []})).is_none());
        assert!(parse_media_payload(&json!({"code": 200})).is_none());
    }

    #[tokio::test]
    async fn test_inert_without_credentials() {
        let client = PrimaryClient::new(None, Duration::from_millis(100)).unwrap();
        assert!(client.parse_url("netease", "1", "320k").await.is_none());
        assert!(client.search("netease", "test", 1, 30).await.is_empty());
        assert!(!client.search_enabled());
    }

    #[tokio::test]
    async fn test_unsupported_platform_short_circuits() {
        let config = PrimaryConfig {
            base_url: "http://primary.invalid/api".to_string(),
            api_key: "key".to_string(),
            enable_search: false,
        };
        let client = PrimaryClient::new(Some(config), Duration::from_millis(100)).unwrap();
        // 平台不支持时不发起网络请求，直接返回None
        assert!(client.parse_url("bilibili", "1", "320k").await.is_none());
    }
}
