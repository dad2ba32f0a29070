//! 分类阶段
//!
//! 每个阶段读取状态中的必需字段，渲染提示词，调用分类器，
//! 返回自己那个字段的判断。写回状态由筛选图完成。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppResult;
use crate::models::{ClassifierRequest, DecisionSchema, TokenUsage};
use crate::services::Classifier;
use crate::workflow::screening_state::{DecisionField, ScreeningState};

/// 一个阶段的产出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub decision: bool,
    pub rationale: Option<String>,
    pub usage: TokenUsage,
}

/// 分类阶段
#[async_trait]
pub trait ScreeningStage: Send + Sync {
    /// 日志与事件中的阶段名
    fn name(&self) -> &'static str;

    /// 本阶段唯一可写的字段
    fn field(&self) -> DecisionField;

    async fn decide(&self, state: &ScreeningState) -> AppResult<StageOutcome>;
}

const SYSTEM_PROMPT: &str = "You are a meticulous biomedical literature curator. \
You read scientific papers and answer screening questions about them for a systematic data collection effort. \
Base every judgement strictly on the text you are given.";

pub const RELEVANCE_SCHEMA: DecisionSchema = DecisionSchema {
    name: "IdentifyRelevanceResult",
    decision_field: "relevant",
    description: "Whether the paper is relevant to the research goal.",
};

pub const ORIGINALITY_SCHEMA: DecisionSchema = DecisionSchema {
    name: "IdentifyOriginalDataResult",
    decision_field: "original_and_accessible",
    description: "Whether the paper reports original, previously unpublished data that is publicly accessible.",
};

async fn classify(
    classifier: &dyn Classifier,
    stage: &'static str,
    instruction_prompt: String,
    schema: DecisionSchema,
) -> AppResult<StageOutcome> {
    let request = ClassifierRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        instruction_prompt,
        schema,
    };
    let response = classifier.invoke(&request).await?;
    debug!("{} 判断: {}，{}", stage, response.result.decision, response.usage);

    Ok(StageOutcome {
        decision: response.result.decision,
        rationale: response.reasoning().map(str::to_string),
        usage: response.usage,
    })
}

/// 相关性阶段：标题 + 摘要是否与研究目标相关
pub struct RelevanceStage {
    classifier: Arc<dyn Classifier>,
}

impl RelevanceStage {
    pub const NAME: &'static str = "Identify Relevance Step";

    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    fn render(state: &ScreeningState, title: &str, abstract_text: &str) -> String {
        format!(
            "## Research goal\n{goal}\n\n\
             ## Additional instructions\n{instructions}\n\n\
             ## Paper\n### Title\n{title}\n\n### Abstract\n{abstract_text}\n\n\
             ## Question\n\
             Judging from the title and abstract only, is this paper relevant to the research goal? \
             Think through what the study investigates, which organism, tissue and assay it uses, \
             and whether it matches the research goal before you answer.",
            goal = state.research_goal,
            instructions = state.relevant_instructions,
        )
    }
}

#[async_trait]
impl ScreeningStage for RelevanceStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn field(&self) -> DecisionField {
        DecisionField::Relevant
    }

    async fn decide(&self, state: &ScreeningState) -> AppResult<StageOutcome> {
        let title = state.require_title(Self::NAME)?;
        let abstract_text = state.require_abstract(Self::NAME)?;
        let prompt = Self::render(state, title, abstract_text);
        classify(self.classifier.as_ref(), Self::NAME, prompt, RELEVANCE_SCHEMA).await
    }
}

/// 原创性阶段：全文是否产出了原创且可公开获取的数据
pub struct OriginalityStage {
    classifier: Arc<dyn Classifier>,
}

impl OriginalityStage {
    pub const NAME: &'static str = "Identify Original Data Step";

    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    fn render(state: &ScreeningState, title: &str, content: &str) -> String {
        format!(
            "## Research goal\n{goal}\n\n\
             ## Additional instructions\n{instructions}\n\n\
             ## Paper\n### Title\n{title}\n\n### Full text\n{content}\n\n\
             ## Question\n\
             Does this paper generate its own data for the research goal, rather than only re-analysing \
             previously published datasets, and is that data deposited somewhere publicly accessible \
             (for example an accession number in a public repository)? \
             Look at the methods and the data availability statement before you answer.",
            goal = state.research_goal,
            instructions = state.original_instructions,
        )
    }
}

#[async_trait]
impl ScreeningStage for OriginalityStage {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn field(&self) -> DecisionField {
        DecisionField::Original
    }

    async fn decide(&self, state: &ScreeningState) -> AppResult<StageOutcome> {
        let title = state.require_title(Self::NAME)?;
        let content = state.require_content(Self::NAME)?;
        let prompt = Self::render(state, title, content);
        classify(self.classifier.as_ref(), Self::NAME, prompt, ORIGINALITY_SCHEMA).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassifierResponse, DecisionResult};
    use std::sync::Mutex;

    /// 记录请求并返回固定判断
    struct Recorder {
        decision: bool,
        requests: Mutex<Vec<ClassifierRequest>>,
    }

    #[async_trait]
    impl Classifier for Recorder {
        async fn invoke(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(ClassifierResponse {
                result: DecisionResult {
                    rationale: Some("because".to_string()),
                    decision: self.decision,
                },
                raw: String::new(),
                usage: TokenUsage::new(30, 25, 5),
                rationale: None,
            })
        }
    }

    fn recorder(decision: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            decision,
            requests: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_relevance_reads_title_and_abstract() {
        let classifier = recorder(true);
        let stage = RelevanceStage::new(classifier.clone());
        let state = ScreeningState::new("1", "AD scRNA-seq").with_document("T-1", "A-1", "FULLTEXT");

        let outcome = stage.decide(&state).await.unwrap();

        assert!(outcome.decision);
        assert_eq!(outcome.rationale.as_deref(), Some("because"));
        assert_eq!(outcome.usage, TokenUsage::new(30, 25, 5));

        let requests = classifier.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].schema, RELEVANCE_SCHEMA);
        let prompt = &requests[0].instruction_prompt;
        assert!(prompt.contains("AD scRNA-seq") && prompt.contains("T-1") && prompt.contains("A-1"));
        assert!(prompt.contains("N/A"));
        assert!(!prompt.contains("FULLTEXT"));
    }

    #[tokio::test]
    async fn test_originality_reads_full_text() {
        let classifier = recorder(false);
        let stage = OriginalityStage::new(classifier.clone());
        let state = ScreeningState::new("1", "goal").with_document("T-1", "A-1", "FULLTEXT");

        let outcome = stage.decide(&state).await.unwrap();

        assert!(!outcome.decision);
        let requests = classifier.requests.lock().unwrap();
        assert_eq!(requests[0].schema, ORIGINALITY_SCHEMA);
        assert!(requests[0].instruction_prompt.contains("FULLTEXT"));
    }

    #[tokio::test]
    async fn test_missing_field_fails_before_classifier() {
        let classifier = recorder(true);
        let stage = OriginalityStage::new(classifier.clone());
        let mut state = ScreeningState::new("1", "goal");
        state.title = Some("T".to_string());

        let err = stage.decide(&state).await.unwrap_err();

        assert!(err.to_string().contains("content"));
        assert!(classifier.requests.lock().unwrap().is_empty());
    }
}
