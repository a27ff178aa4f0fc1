use serde_json::Value;

use super::Song;

/// 歌曲列表可能藏身的容器路径，按优先级探测，取第一个非空数组
const LIST_PATHS: [&[&str]; 6] = [
    &["data", "results"],
    &["data", "songs"],
    &["data"],
    &["songs"],
    &["results"],
    &[],
];

/// 将任意上游返回的载荷归一化为统一的歌曲模型
///
/// 各镜像/平台的字段命名五花八门（songmid、rid、picUrl、playurl……），
/// 这里按固定的别名优先级逐一提取；缺少id或name的条目直接丢弃。
pub fn normalize_songs(payload: &Value, fallback_source: &str) -> Vec<Song> {
    let Some(items) = locate_song_list(payload) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = string_field(item, &["id", "songmid", "mid", "songId", "rid"])?;
            let name = string_field(item, &["name", "title", "song", "songname"])?;

            let artist = item
                .get("artist")
                .or_else(|| item.get("artists"))
                .or_else(|| item.get("singer"))
                .or_else(|| item.get("singers"))
                .or_else(|| item.get("artistname"))
                .map(join_artist)
                .unwrap_or_default();

            let source = string_field(item, &["platform", "source"])
                .or_else(|| Some(fallback_source.to_string()));

            Some(Song {
                id,
                name,
                artist,
                album: string_field(item, &["album", "albumname", "albumName"]),
                pic: string_field(
                    item,
                    &["pic", "cover", "picUrl", "picurl", "albumPic", "coverUrl"],
                ),
                source,
                url: string_field(
                    item,
                    &["url", "playUrl", "play_url", "playurl", "playUrl320"],
                ),
                lrc: string_field(item, &["lrc", "lyric", "lyrics", "lrcUrl", "lyricUrl"]),
            })
        })
        .collect()
}

/// 按候选路径查找歌曲数组
fn locate_song_list(payload: &Value) -> Option<&Vec<Value>> {
    for path in LIST_PATHS {
        let mut node = payload;
        let mut found = true;
        for key in path {
            match node.get(key) {
                Some(next) => node = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if !found {
            continue;
        }
        if let Some(arr) = node.as_array() {
            if !arr.is_empty() {
                return Some(arr);
            }
        }
    }
    None
}

/// 从条目中按别名优先级取出非空字符串字段；数字会被字符串化
fn string_field(item: &Value, aliases: &[&str]) -> Option<String> {
    for key in aliases {
        match item.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}

/// 艺术家字段可能是字符串或数组，数组以", "连接
fn join_artist(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                // 某些平台返回 [{name: "..."}, ...]
                Value::Object(_) => v.get("name").and_then(Value::as_str).map(str::to_string),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_same_songs_regardless_of_wrapper() {
        let entry = json!({"id": "42", "name": "Song", "artist": "A"});
        let shapes = [
            json!([entry]),
            json!({"songs": [entry]}),
            json!({"results": [entry]}),
            json!({"data": [entry]}),
            json!({"data": {"results": [entry]}}),
            json!({"data": {"songs": [entry]}}),
        ];

        for payload in &shapes {
            let songs = normalize_songs(payload, "netease");
            assert_eq!(songs.len(), 1, "payload: {}", payload);
            assert_eq!(songs[0].id, "42");
            assert_eq!(songs[0].name, "Song");
        }
    }

    #[test]
    fn test_missing_id_or_name_dropped() {
        let songs = normalize_songs(&json!([{"id": "", "name": "x"}]), "netease");
        assert!(songs.is_empty());

        let songs = normalize_songs(&json!([{"id": "1", "name": ""}]), "netease");
        assert!(songs.is_empty());

        let songs = normalize_songs(&json!([{"name": "x"}]), "netease");
        assert!(songs.is_empty());
    }

    #[test]
    fn test_field_aliases() {
        let payload = json!([{
            "songmid": 1001,
            "title": "标题",
            "singers": ["甲", "乙"],
            "albumname": "专辑",
            "picUrl": "http://p/1.jpg",
            "playurl": "http://u/1.mp3",
            "lyricUrl": "http://l/1.lrc"
        }]);

        let songs = normalize_songs(&payload, "qq");
        assert_eq!(songs.len(), 1);
        let song = &songs[0];
        assert_eq!(song.id, "1001");
        assert_eq!(song.name, "标题");
        assert_eq!(song.artist, "甲, 乙");
        assert_eq!(song.album.as_deref(), Some("专辑"));
        assert_eq!(song.pic.as_deref(), Some("http://p/1.jpg"));
        assert_eq!(song.url.as_deref(), Some("http://u/1.mp3"));
        assert_eq!(song.lrc.as_deref(), Some("http://l/1.lrc"));
    }

    #[test]
    fn test_fallback_source_applied() {
        let songs = normalize_songs(&json!([{"id": "1", "name": "a"}]), "kuwo");
        assert_eq!(songs[0].source.as_deref(), Some("kuwo"));

        let songs =
            normalize_songs(&json!([{"id": "1", "name": "a", "platform": "qq"}]), "kuwo");
        assert_eq!(songs[0].source.as_deref(), Some("qq"));
    }

    #[test]
    fn test_artist_object_array() {
        let payload = json!([{"id": "1", "name": "a", "artists": [{"name": "甲"}, {"name": "乙"}]}]);
        let songs = normalize_songs(&payload, "netease");
        assert_eq!(songs[0].artist, "甲, 乙");
    }

    #[test]
    fn test_non_list_payload_yields_nothing() {
        assert!(normalize_songs(&json!({"code": 500}), "netease").is_empty());
        assert!(normalize_songs(&json!("oops"), "netease").is_empty());
    }
}
