//! XML / HTML 文本清理工具
//!
//! 正则实现，只处理检索结果和全文页面里常见的标记

use regex::{Captures, Regex};

/// 去掉所有标签，标签位置替换为空格
pub fn strip_tags(markup: &str) -> Result<String, regex::Error> {
    let re = Regex::new(r"(?s)<[^>]*>")?;
    Ok(re.replace_all(markup, " ").into_owned())
}

/// 解码常见的命名实体和数字实体
pub fn decode_entities(text: &str) -> Result<String, regex::Error> {
    let re = Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);")?;
    let decoded = re.replace_all(text, |caps: &Captures| {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
            }
            _ if entity.starts_with('#') => entity[1..].parse().ok().and_then(char::from_u32),
            _ => None,
        };
        match decoded {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });
    Ok(decoded.into_owned())
}

/// 连续空白压缩为单个空格并去掉首尾空白
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 标记 → 纯文本
pub fn to_plain_text(markup: &str) -> Result<String, regex::Error> {
    let stripped = strip_tags(markup)?;
    let decoded = decode_entities(&stripped)?;
    Ok(collapse_whitespace(&decoded))
}
