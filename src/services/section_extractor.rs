//! 章节提取服务 - 业务能力层
//!
//! 把全文 HTML 切成有序的 (标题, 内容) 章节。失败只记日志并返回 `None`。

use regex::Regex;
use tracing::warn;

use crate::models::Section;
use crate::utils::markup;

/// 全文章节提取能力
pub trait SectionExtractor: Send + Sync {
    /// 全部章节，按文中顺序
    fn extract_sections(&self, html: &str) -> Option<Vec<Section>>;

    /// 方法学相关章节
    fn extract_methods(&self, html: &str) -> Option<Vec<Section>> {
        filter_sections(self.extract_sections(html)?, |title| {
            title.contains("method")
        })
    }

    /// 数据可用性声明
    fn extract_data_availability(&self, html: &str) -> Option<Vec<Section>> {
        filter_sections(self.extract_sections(html)?, |title| {
            (title.contains("data") || title.contains("code"))
                && (title.contains("availab") || title.contains("access"))
        })
    }
}

fn filter_sections(sections: Vec<Section>, keep: impl Fn(&str) -> bool) -> Option<Vec<Section>> {
    let matched: Vec<Section> = sections
        .into_iter()
        .filter(|sec| keep(&sec.title.to_lowercase()))
        .collect();
    (!matched.is_empty()).then_some(matched)
}

/// 基于正则的 HTML 章节提取
///
/// `<h2>` 作为章节边界；`<script>` / `<style>` / `<nav>` 等页面元素先被剔除。
#[derive(Debug, Clone, Default)]
pub struct HtmlSectionExtractor;

impl HtmlSectionExtractor {
    pub fn new() -> Self {
        Self
    }

    fn try_extract(&self, html: &str) -> Result<Vec<Section>, regex::Error> {
        let noise_re = Regex::new(r"(?is)<(script|style|nav|header|footer|noscript)\b[^>]*>.*?</(script|style|nav|header|footer|noscript)>")?;
        let cleaned = noise_re.replace_all(html, " ");

        let heading_re = Regex::new(r"(?is)<h2\b[^>]*>(.*?)</h2>")?;
        let headings: Vec<_> = heading_re.captures_iter(&cleaned).collect();

        let mut sections = Vec::with_capacity(headings.len());
        for (i, cap) in headings.iter().enumerate() {
            let (Some(whole), Some(title)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let content_end = headings
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(cleaned.len());

            let title = markup::to_plain_text(title.as_str())?;
            let content = markup::to_plain_text(&cleaned[whole.end()..content_end])?;
            if title.is_empty() && content.is_empty() {
                continue;
            }
            sections.push(Section::new(title, content));
        }

        Ok(sections)
    }
}

impl SectionExtractor for HtmlSectionExtractor {
    fn extract_sections(&self, html: &str) -> Option<Vec<Section>> {
        match self.try_extract(html) {
            Ok(sections) if !sections.is_empty() => Some(sections),
            Ok(_) => None,
            Err(e) => {
                warn!("提取章节失败: {}", e);
                None
            }
        }
    }
}
