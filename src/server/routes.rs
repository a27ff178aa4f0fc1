use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use super::AppState;
use crate::upstream::mirror::MediaKind;
use crate::upstream::normalize::normalize_songs;

/// 默认播放质量
const DEFAULT_QUALITY: &str = "320k";
/// hot动作的默认返回条数
const HOT_LIMIT: u32 = 50;

const CACHE_DEFAULT: &str = "public, max-age=120";
const CACHE_SHORT: &str = "public, max-age=300";
const CACHE_LONG: &str = "public, max-age=600";
const CACHE_NONE: &str = "no-store";

/// 调用方可见的失败；上游故障不会以500形式泄露
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing {0}")]
    MissingParameter(&'static str),
    #[error("Unsupported action")]
    UnsupportedAction,
    #[error("Media not found")]
    MediaNotFound,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameter(_) | ApiError::UnsupportedAction => StatusCode::BAD_REQUEST,
            ApiError::MediaNotFound => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiReply {
            status: self.status(),
            cache: CACHE_DEFAULT,
            body: json!({ "error": self.to_string() }),
        }
        .into_response()
    }
}

/// 带缓存指令的JSON响应
#[derive(Debug)]
pub struct ApiReply {
    status: StatusCode,
    cache: &'static str,
    body: Value,
}

impl ApiReply {
    fn ok(body: Value, cache: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            cache,
            body,
        }
    }
}

impl IntoResponse for ApiReply {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CACHE_CONTROL, self.cache)],
            Json(self.body),
        )
            .into_response()
    }
}

/// 从query与body归并后的请求参数
#[derive(Debug, Default, Clone)]
pub struct RequestParams {
    pub action: String,
    pub source: String,
    pub id: Option<String>,
    pub keyword: Option<String>,
    pub limit: Option<u32>,
    pub page: Option<u32>,
    pub bitrate: Option<String>,
    /// 调用方已持有的直链，命中时直接回传不走上游
    pub direct_url: Option<String>,
    /// 歌词提示URL（lrc/lyric/lyricUrl）
    pub lyric_hint: Option<String>,
}

/// 归并GET query与POST body，body优先；非字符串的数字值会被字符串化
pub fn resolve_params(
    query: &HashMap<String, String>,
    body: &Value,
    default_source: &str,
) -> RequestParams {
    let q = |key: &str| query.get(key).cloned().filter(|s| !s.is_empty());
    let b = |key: &str| match body.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let action = q("action")
        .or_else(|| q("type"))
        .or_else(|| b("action"))
        .unwrap_or_default()
        .to_lowercase();
    let source = b("source")
        .or_else(|| q("source"))
        .unwrap_or_else(|| default_source.to_string())
        .to_lowercase();

    let parse_u32 = |v: Option<String>| v.and_then(|s| s.parse::<u32>().ok());

    RequestParams {
        action,
        source,
        id: b("id").or_else(|| q("id")),
        keyword: b("keyword").or_else(|| q("keyword")),
        limit: parse_u32(b("limit").or_else(|| q("limit"))),
        page: parse_u32(b("page").or_else(|| q("page"))),
        bitrate: b("br")
            .or_else(|| b("quality"))
            .or_else(|| q("br"))
            .or_else(|| q("quality")),
        direct_url: b("url"),
        lyric_hint: b("lrc").or_else(|| b("lyric")).or_else(|| b("lyricUrl")),
    }
}

/// 动作分发
pub async fn dispatch(state: &AppState, params: RequestParams) -> Result<ApiReply, ApiError> {
    match params.action.as_str() {
        "search" => {
            let keyword = params
                .keyword
                .as_deref()
                .ok_or(ApiError::MissingParameter("keyword"))?;
            Ok(handle_search(state, keyword, &params.source, params.limit, params.page).await)
        }
        "hot" => {
            let keyword = params
                .keyword
                .clone()
                .unwrap_or_else(|| state.config.default_keyword.clone());
            let limit = params.limit.or(Some(HOT_LIMIT));
            Ok(handle_search(state, &keyword, &params.source, limit, params.page).await)
        }
        "url" => {
            let id = params
                .id
                .as_deref()
                .ok_or(ApiError::MissingParameter("id"))?;

            // 调用方已带直链时原样返回，不发起任何上游请求
            if let Some(direct) = params.direct_url {
                return Ok(ApiReply::ok(json!({ "url": direct }), CACHE_LONG));
            }

            // 先走主提供方拿高质量直链，失败再回退镜像
            let quality = params.bitrate.as_deref().unwrap_or(DEFAULT_QUALITY);
            if let Some(media) = state.primary.parse_url(&params.source, id, quality).await {
                if let Some(url) = media.url {
                    info!("主提供方解析成功: {} ({})", id, params.source);
                    return Ok(ApiReply::ok(json!({ "url": url }), CACHE_SHORT));
                }
            }
            debug!("主提供方解析失败，回退镜像: {}", id);

            let resolved = state
                .mirror
                .resolve_media_url(MediaKind::Url, &params.source, id, params.bitrate.as_deref())
                .await
                .ok_or(ApiError::MediaNotFound)?;
            Ok(ApiReply::ok(json!({ "url": resolved }), CACHE_SHORT))
        }
        "pic" => {
            let id = params
                .id
                .as_deref()
                .ok_or(ApiError::MissingParameter("id"))?;
            let resolved = state
                .mirror
                .resolve_media_url(MediaKind::Pic, &params.source, id, params.bitrate.as_deref())
                .await
                .ok_or(ApiError::MediaNotFound)?;
            Ok(ApiReply::ok(json!({ "url": resolved }), CACHE_SHORT))
        }
        "lyrics" | "lrc" => {
            let id = params
                .id
                .as_deref()
                .ok_or(ApiError::MissingParameter("id"))?;
            let lines = state
                .mirror
                .fetch_lyrics(&params.source, id, params.lyric_hint.as_deref())
                .await;
            Ok(ApiReply::ok(json!({ "lyrics": lines }), CACHE_LONG))
        }
        _ => Err(ApiError::UnsupportedAction),
    }
}

/// 搜索/热门共用：镜像搜索并归一化
///
/// 上游全灭时故意返回200与空列表，避免前端播放器因5xx崩掉界面。
async fn handle_search(
    state: &AppState,
    keyword: &str,
    source: &str,
    limit: Option<u32>,
    page: Option<u32>,
) -> ApiReply {
    // 次级路径：显式开启后先尝试主提供方的methods搜索
    if state.primary.search_enabled() {
        let songs = state
            .primary
            .search(source, keyword, page.unwrap_or(1), limit.unwrap_or(30))
            .await;
        if !songs.is_empty() {
            return ApiReply::ok(json!({ "songs": songs }), CACHE_SHORT);
        }
        debug!("主提供方搜索无结果，回退镜像");
    }

    let Some(payload) = state.mirror.search(keyword, source, limit, page).await else {
        return ApiReply::ok(
            json!({ "songs": [], "error": "Upstream unavailable" }),
            CACHE_NONE,
        );
    };

    let songs = normalize_songs(&payload, source);
    ApiReply::ok(json!({ "songs": songs }), CACHE_SHORT)
}

async fn music_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<ApiReply, ApiError> {
    let params = resolve_params(&query, &Value::Null, &state.config.default_source);
    dispatch(&state, params).await
}

async fn music_post(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ApiReply, ApiError> {
    // 无效或缺失的body容忍为空对象
    let body: Value = serde_json::from_slice(&body).unwrap_or_else(|_| json!({}));
    let params = resolve_params(&query, &body, &state.config.default_source);
    dispatch(&state, params).await
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/music", get(music_get).post(music_post))
        .with_state(state)
}
