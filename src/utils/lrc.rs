use anyhow::Result;
use regex::Regex;

use crate::upstream::LyricLine;

/// LRC歌词解析器，用于解析常见的LRC格式歌词
pub struct LrcParser;

impl LrcParser {
    /// 解析LRC格式的歌词，返回按时间升序排列的歌词行
    pub fn parse(content: &str) -> Result<Vec<LyricLine>> {
        let mut lines = Vec::new();

        // 匹配时间标签: [mm:ss.xx] 或 [mm:ss]
        let time_regex = Regex::new(r"\[(\d{2}):(\d{2})\.?(\d{0,3})]")?;

        // 匹配元数据: [ar:艺术家]
        let meta_regex = Regex::new(r"\[([a-zA-Z]+):(.+?)]")?;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            // 跳过元数据行
            if meta_regex.is_match(line) {
                continue;
            }

            // 提取时间标签和对应的歌词文本
            let mut timestamps = Vec::new();
            let mut max_tag_end = 0;

            for cap in time_regex.captures_iter(line) {
                let mins = cap[1].parse::<u64>()?;
                let secs = cap[2].parse::<u64>()?;
                let millis = if cap.get(3).map_or("", |m| m.as_str()).is_empty() {
                    0
                } else {
                    // 处理毫秒，需要进行补齐
                    let ms_str = &cap[3];
                    if ms_str.len() == 1 {
                        ms_str.parse::<u64>()? * 100
                    } else if ms_str.len() == 2 {
                        ms_str.parse::<u64>()? * 10
                    } else {
                        ms_str.parse::<u64>()?
                    }
                };

                let total_millis = mins * 60 * 1000 + secs * 1000 + millis;
                timestamps.push(total_millis as f64 / 1000.0);

                let tag_end = cap.get(0).unwrap().end();
                max_tag_end = max_tag_end.max(tag_end);
            }

            // 如果找到了时间标签，提取歌词文本；一行多个时间标签则展开为多行
            if !timestamps.is_empty() {
                let text = line[max_tag_end..].trim().to_string();
                if !text.is_empty() {
                    for time in timestamps {
                        lines.push(LyricLine {
                            time,
                            text: text.clone(),
                        });
                    }
                }
            }
        }

        // 按时间排序
        lines.sort_by(|a, b| a.time.total_cmp(&b.time));

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lrc_parser() {
        let lrc_content = r#"[ar:周杰伦]
[ti:稻香]
[al:魔杰座]
[by:Lyrics by JimChou]
[00:00.00]周杰伦 - 稻香
[00:03.33]词：周杰伦
[00:05.76]曲：周杰伦
[00:09.86]对这个世界如果你有太多的抱怨
[00:13.96]跌倒了就不敢继续往前走
[00:18.10]为什么人要这么的脆弱 堕落"#;

        let lines = LrcParser::parse(lrc_content).unwrap();

        // 元数据行不产生歌词
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0].time, 0.0);
        assert_eq!(lines[0].text, "周杰伦 - 稻香");

        // 验证排序
        for i in 1..lines.len() {
            assert!(lines[i].time > lines[i - 1].time);
        }
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let lines = LrcParser::parse("[00:01.50]Hello\n[00:00.00]World").unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].time, 0.0);
        assert_eq!(lines[0].text, "World");
        assert_eq!(lines[1].time, 1.5);
        assert_eq!(lines[1].text, "Hello");
    }

    #[test]
    fn test_multiple_timestamps_expand() {
        let lines = LrcParser::parse("[00:00.00][00:05.00]Chorus").unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].time, 0.0);
        assert_eq!(lines[1].time, 5.0);
        assert!(lines.iter().all(|l| l.text == "Chorus"));
    }

    #[test]
    fn test_short_fraction_padded() {
        // [mm:ss.x] 和 [mm:ss] 两种写法
        let lines = LrcParser::parse("[00:10.5]A\n[00:20]B").unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].time, 10.5);
        assert_eq!(lines[1].time, 20.0);
    }

    #[test]
    fn test_empty_text_dropped() {
        let lines = LrcParser::parse("[00:01.00]\n[00:02.00]   \n[00:03.00]ok").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "ok");
    }
}
