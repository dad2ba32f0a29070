//! 单篇文献的筛选状态
//!
//! 每篇文献新建一份，得出结论后丢弃

use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{ScopeConfig, NO_INSTRUCTIONS};
use crate::workflow::observer::StepObserver;

/// 阶段可写的判断字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionField {
    Relevant,
    Original,
}

impl Display for DecisionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionField::Relevant => write!(f, "relevant"),
            DecisionField::Original => write!(f, "original"),
        }
    }
}

/// 筛选状态
///
/// `relevant` / `original` 是三态：未设置 / true / false。
/// 两个判断字段只能经由 [`ScreeningState::set_decision`] 写入。
#[derive(Clone, Default)]
pub struct ScreeningState {
    pub pmid: String,
    /// 研究目标描述
    pub research_goal: String,
    pub title: Option<String>,
    pub abstract_text: Option<String>,
    /// 全文纯文本
    pub content: Option<String>,
    pub relevant_instructions: String,
    pub original_instructions: String,
    relevant: Option<bool>,
    original: Option<bool>,
    observer: Option<Arc<dyn StepObserver>>,
}

impl ScreeningState {
    pub fn new(pmid: impl Into<String>, research_goal: impl Into<String>) -> Self {
        Self {
            pmid: pmid.into(),
            research_goal: research_goal.into(),
            relevant_instructions: NO_INSTRUCTIONS.to_string(),
            original_instructions: NO_INSTRUCTIONS.to_string(),
            ..Default::default()
        }
    }

    /// 研究目标与两个阶段的附加指令取自研究范围
    pub fn for_scope(pmid: impl Into<String>, scope: &ScopeConfig) -> Self {
        Self {
            relevant_instructions: scope.relevant_instructions().to_string(),
            original_instructions: scope.original_instructions().to_string(),
            ..Self::new(pmid, scope.descriptor())
        }
    }

    pub fn with_document(
        mut self,
        title: impl Into<String>,
        abstract_text: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.title = Some(title.into());
        self.abstract_text = Some(abstract_text.into());
        self.content = Some(content.into());
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn observer(&self) -> Option<&Arc<dyn StepObserver>> {
        self.observer.as_ref()
    }

    pub fn relevant(&self) -> Option<bool> {
        self.relevant
    }

    pub fn original(&self) -> Option<bool> {
        self.original
    }

    pub fn decision(&self, field: DecisionField) -> Option<bool> {
        match field {
            DecisionField::Relevant => self.relevant,
            DecisionField::Original => self.original,
        }
    }

    pub(crate) fn set_decision(&mut self, field: DecisionField, value: bool) {
        match field {
            DecisionField::Relevant => self.relevant = Some(value),
            DecisionField::Original => self.original = Some(value),
        }
    }

    /// 最终结论：两个字段都为 true，未设置按 false 处理
    pub fn accepted(&self) -> bool {
        self.relevant == Some(true) && self.original == Some(true)
    }

    pub fn require_title(&self, stage: &str) -> AppResult<&str> {
        require(stage, "title", self.title.as_deref())
    }

    pub fn require_abstract(&self, stage: &str) -> AppResult<&str> {
        require(stage, "abstract", self.abstract_text.as_deref())
    }

    pub fn require_content(&self, stage: &str) -> AppResult<&str> {
        require(stage, "content", self.content.as_deref())
    }
}

fn require<'a>(stage: &str, field: &str, value: Option<&'a str>) -> AppResult<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::missing_state_field(stage, field))
}

impl Debug for ScreeningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreeningState")
            .field("pmid", &self.pmid)
            .field("research_goal", &self.research_goal)
            .field("title", &self.title)
            .field("has_abstract", &self.abstract_text.is_some())
            .field("content_len", &self.content.as_ref().map(String::len))
            .field("relevant", &self.relevant)
            .field("original", &self.original)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BusinessError;

    #[test]
    fn test_accepted_truth_table() {
        let cases = [
            (None, None, false),
            (Some(true), None, false),
            (None, Some(true), false),
            (Some(true), Some(false), false),
            (Some(false), Some(true), false),
            (Some(true), Some(true), true),
        ];
        for (relevant, original, expected) in cases {
            let mut state = ScreeningState::new("1", "goal");
            if let Some(v) = relevant {
                state.set_decision(DecisionField::Relevant, v);
            }
            if let Some(v) = original {
                state.set_decision(DecisionField::Original, v);
            }
            assert_eq!(state.accepted(), expected, "{:?}/{:?}", relevant, original);
        }
    }

    #[test]
    fn test_missing_field_is_reported() {
        let state = ScreeningState::new("1", "goal");
        let err = state.require_abstract("Identify Relevance Step").unwrap_err();
        match err {
            AppError::Business(BusinessError::MissingStateField { stage, field }) => {
                assert_eq!(stage, "Identify Relevance Step");
                assert_eq!(field, "abstract");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scope_defaults() {
        let scope = ScopeConfig::new("alzheimer AND scRNA-seq");
        let state = ScreeningState::for_scope("7", &scope);
        assert_eq!(state.research_goal, "alzheimer AND scRNA-seq");
        assert_eq!(state.relevant_instructions, NO_INSTRUCTIONS);
        assert_eq!(state.original_instructions, NO_INSTRUCTIONS);
        assert_eq!(state.relevant(), None);
        assert_eq!(state.original(), None);
    }
}
