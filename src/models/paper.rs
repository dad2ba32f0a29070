//! 文献数据模型

use serde::{Deserialize, Serialize};

/// 文献元数据：标题、摘要、是否预印本
///
/// 未命中时为 `(None, None, false)`。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub is_preprint: bool,
}

impl PaperMetadata {
    pub fn new(
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        is_preprint: bool,
    ) -> Self {
        Self {
            title: Some(title.into()),
            abstract_text: Some(abstract_text.into()),
            is_preprint,
        }
    }

    /// 标题或摘要至少有一个
    pub fn is_found(&self) -> bool {
        self.title.is_some() || self.abstract_text.is_some()
    }

    /// 标题和摘要都非空
    pub fn is_complete(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.title) && present(&self.abstract_text)
    }
}

/// 全文中的一个章节
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// 按提取顺序拼接全文：每节 `title\ncontent`，节之间换行
pub fn full_text(sections: &[Section]) -> String {
    sections
        .iter()
        .map(|sec| format!("{}\n{}", sec.title.trim(), sec.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
