use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::redirect::Policy;
use reqwest::{header, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{EndpointHealth, LyricLine, USER_AGENT};
use crate::utils::LrcParser;

/// 媒体解析类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Url,
    Pic,
}

impl MediaKind {
    fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Url => "url",
            MediaKind::Pic => "pic",
        }
    }
}

/// 旧版镜像客户端
///
/// 按固定优先级逐个尝试镜像，跳过冷却中的端点，拿到可用结果即返回。
/// 单次尝试的任何网络错误只记为该镜像的失败，不会向调用方传播。
pub struct MirrorClient {
    mirrors: Vec<String>,
    health: Arc<EndpointHealth>,
    client: reqwest::Client,
    /// 禁用重定向的客户端，用于从Location头提取媒体直链
    no_redirect: reqwest::Client,
    timeout: Duration,
}

impl MirrorClient {
    pub fn new(mirrors: Vec<String>, health: Arc<EndpointHealth>, timeout: Duration) -> Result<Self> {
        let headers = default_headers();
        let client = reqwest::Client::builder()
            .default_headers(headers.clone())
            .build()?;
        let no_redirect = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            mirrors,
            health,
            client,
            no_redirect,
            timeout,
        })
    }

    /// 搜索歌曲，返回第一个镜像给出的原始JSON载荷
    pub async fn search(
        &self,
        keyword: &str,
        source: &str,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Option<Value> {
        let mut params: Vec<(&str, String)> = Vec::new();
        // source=all 时走聚合搜索，不带source参数
        if source == "all" {
            params.push(("type", "aggregateSearch".to_string()));
        } else {
            params.push(("type", "search".to_string()));
            params.push(("source", source.to_string()));
        }
        params.push(("keyword", keyword.to_string()));
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(page) = page {
            params.push(("page", page.to_string()));
        }

        for base_url in &self.mirrors {
            if self.health.is_cooling_down(base_url) {
                debug!("跳过冷却中的镜像: {}", base_url);
                continue;
            }

            let resp = match self
                .client
                .get(base_url)
                .query(&params)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    self.health.record_failure(base_url, &e.to_string());
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                if is_upstream_fault(status) {
                    self.health
                        .record_failure(base_url, &format!("status={}", status.as_u16()));
                }
                continue;
            }

            if !is_json_response(&resp) {
                self.health.record_failure(base_url, "invalid-content-type");
                continue;
            }

            match resp.json::<Value>().await {
                Ok(payload) => {
                    self.health.record_success(base_url);
                    return Some(payload);
                }
                Err(e) => {
                    self.health.record_failure(base_url, &e.to_string());
                    continue;
                }
            }
        }

        None
    }

    /// 解析媒体直链（播放URL或封面图）
    ///
    /// 镜像通常以302跳转给出直链；部分镜像返回JSON包裹的URL；
    /// 还有镜像直接回源媒体流，此时请求URL本身就是直链。
    pub async fn resolve_media_url(
        &self,
        kind: MediaKind,
        source: &str,
        id: &str,
        bitrate: Option<&str>,
    ) -> Option<String> {
        let mut params: Vec<(&str, String)> = vec![
            ("source", source.to_string()),
            ("type", kind.as_str().to_string()),
            ("id", id.to_string()),
        ];
        if let Some(br) = bitrate {
            params.push(("br", br.to_string()));
        }

        for base_url in &self.mirrors {
            if self.health.is_cooling_down(base_url) {
                debug!("跳过冷却中的镜像: {}", base_url);
                continue;
            }

            let target = match Url::parse_with_params(base_url, &params) {
                Ok(url) => url,
                Err(e) => {
                    warn!("无效的镜像URL {}: {}", base_url, e);
                    continue;
                }
            };

            let resp = match self
                .no_redirect
                .get(target.clone())
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    self.health.record_failure(base_url, &e.to_string());
                    continue;
                }
            };

            // 无论状态码，Location头即直链
            if let Some(location) = header_str(&resp, header::LOCATION) {
                self.health.record_success(base_url);
                return Some(location);
            }

            let status = resp.status();
            if status.is_success() {
                if is_json_response(&resp) {
                    if let Ok(data) = resp.json::<Value>().await {
                        if let Some(direct) = extract_direct_url(&data) {
                            self.health.record_success(base_url);
                            return Some(direct);
                        }
                    }
                    // JSON里没有URL，换下一个镜像
                    continue;
                }
                // 镜像自己在回源媒体流，请求URL即直链
                self.health.record_success(base_url);
                return Some(target.to_string());
            }

            if is_upstream_fault(status) {
                self.health
                    .record_failure(base_url, &format!("status={}", status.as_u16()));
            }
        }

        None
    }

    /// 获取歌词并解析为按时间排序的歌词行
    ///
    /// 提供了歌词提示URL时先直接取该URL，成功即返回；
    /// 否则按type=lrc逐镜像查询。全部失败返回空列表。
    pub async fn fetch_lyrics(
        &self,
        source: &str,
        id: &str,
        hinted_url: Option<&str>,
    ) -> Vec<LyricLine> {
        if let Some(hinted) = hinted_url {
            if let Some(text) = self.fetch_lyric_text(hinted).await {
                if let Ok(lines) = LrcParser::parse(&text) {
                    return lines;
                }
            }
        }

        let params: Vec<(&str, String)> = vec![
            ("source", source.to_string()),
            ("type", "lrc".to_string()),
            ("id", id.to_string()),
        ];

        for base_url in &self.mirrors {
            if self.health.is_cooling_down(base_url) {
                debug!("跳过冷却中的镜像: {}", base_url);
                continue;
            }

            let resp = match self
                .client
                .get(base_url)
                .query(&params)
                .timeout(self.timeout)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    self.health.record_failure(base_url, &e.to_string());
                    continue;
                }
            };

            let status = resp.status();
            if !status.is_success() {
                if is_upstream_fault(status) {
                    self.health
                        .record_failure(base_url, &format!("status={}", status.as_u16()));
                }
                continue;
            }

            let is_json = is_json_response(&resp);
            let text = match resp.text().await {
                Ok(text) if !text.is_empty() => text,
                _ => continue,
            };

            let raw = unwrap_lyric_payload(&text, is_json).unwrap_or(text);
            self.health.record_success(base_url);
            match LrcParser::parse(&raw) {
                Ok(lines) => return lines,
                Err(e) => {
                    debug!("歌词解析失败: {}", e);
                    continue;
                }
            }
        }

        Vec::new()
    }

    /// 抓取一个歌词URL的文本内容，JSON包裹的歌词会被解开
    async fn fetch_lyric_text(&self, target: &str) -> Option<String> {
        let resp = match self.client.get(target).timeout(self.timeout).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(_) => return None,
            Err(e) => {
                debug!("歌词提示URL抓取失败: {}", e);
                return None;
            }
        };

        let is_json = is_json_response(&resp);
        let text = resp.text().await.ok().filter(|t| !t.is_empty())?;
        Some(unwrap_lyric_payload(&text, is_json).unwrap_or(text))
    }
}

/// 镜像要求浏览器形态的请求头
fn default_headers() -> header::HeaderMap {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(USER_AGENT),
    );
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        header::HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers
}

/// 5xx与429视为上游故障，计入健康跟踪
fn is_upstream_fault(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn is_json_response(resp: &reqwest::Response) -> bool {
    resp.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

fn header_str(resp: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// 从JSON包裹的媒体解析响应中取出URL字符串: url / data.url / data
fn extract_direct_url(data: &Value) -> Option<String> {
    let direct = data
        .get("url")
        .or_else(|| data.pointer("/data/url"))
        .or_else(|| data.get("data"))?;
    match direct {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// 部分镜像把歌词包在JSON里: data.lrc / lrc / data
fn unwrap_lyric_payload(text: &str, is_json: bool) -> Option<String> {
    if !is_json && !text.trim_start().starts_with('{') {
        return None;
    }
    let json: Value = serde_json::from_str(text).ok()?;
    let raw = json
        .pointer("/data/lrc")
        .or_else(|| json.get("lrc"))
        .or_else(|| json.get("data"))?;
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_direct_url() {
        assert_eq!(
            extract_direct_url(&json!({"url": "http://a/1.mp3"})).as_deref(),
            Some("http://a/1.mp3")
        );
        assert_eq!(
            extract_direct_url(&json!({"data": {"url": "http://b/2.mp3"}})).as_deref(),
            Some("http://b/2.mp3")
        );
        assert_eq!(
            extract_direct_url(&json!({"data": "http://c/3.mp3"})).as_deref(),
            Some("http://c/3.mp3")
        );
        assert!(extract_direct_url(&json!({"data": {"code": 1}})).is_none());
        assert!(extract_direct_url(&json!({"url": ""})).is_none());
    }

    #[test]
    fn test_unwrap_lyric_payload() {
        let wrapped = r#"{"data":{"lrc":"[00:01.00]hi"}}"#;
        assert_eq!(
            unwrap_lyric_payload(wrapped, true).as_deref(),
            Some("[00:01.00]hi")
        );

        // content-type不对但内容像JSON，同样解包
        let wrapped = r#"{"lrc":"[00:01.00]hi"}"#;
        assert_eq!(
            unwrap_lyric_payload(wrapped, false).as_deref(),
            Some("[00:01.00]hi")
        );

        // 纯文本歌词原样返回None，由调用方使用原始文本
        assert!(unwrap_lyric_payload("[00:01.00]hi", false).is_none());
    }

    #[test]
    fn test_upstream_fault_classification() {
        assert!(is_upstream_fault(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_upstream_fault(StatusCode::BAD_GATEWAY));
        assert!(is_upstream_fault(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_upstream_fault(StatusCode::NOT_FOUND));
        assert!(!is_upstream_fault(StatusCode::OK));
    }

    #[tokio::test]
    async fn test_all_mirrors_cooling_returns_none() {
        let health = Arc::new(EndpointHealth::default());
        let mirrors = vec!["http://mirror-a.invalid/api/".to_string()];
        health.record_failure(&mirrors[0], "seed");

        let client =
            MirrorClient::new(mirrors, health, Duration::from_millis(100)).unwrap();
        // 唯一镜像处于冷却，不应发起任何请求
        assert!(client.search("test", "netease", None, None).await.is_none());
        assert!(client
            .resolve_media_url(MediaKind::Url, "netease", "1", None)
            .await
            .is_none());
        assert!(client.fetch_lyrics("netease", "1", None).await.is_empty());
    }
}
