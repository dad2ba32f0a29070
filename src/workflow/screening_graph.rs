//! 两阶段筛选状态机
//!
//! START → 门控阶段 →(true)→ 依赖阶段 → END
//!                  →(false / 未设置)→ END
//!
//! 编译一次，逐篇文献复用；每篇文献一份新的 [`ScreeningState`]。

use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ConfigError, ScreeningError};
use crate::models::TokenUsage;
use crate::services::Classifier;
use crate::workflow::observer::StepEvent;
use crate::workflow::screening_state::ScreeningState;
use crate::workflow::stages::{OriginalityStage, RelevanceStage, ScreeningStage};

/// 状态机节点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    Start,
    /// 先执行、决定是否继续的阶段
    Gate,
    /// 只有门控通过才执行的阶段
    Dependent,
    End,
}

/// 节点之间的边
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Always,
    Passed,
    Failed,
}

/// 转移表：(当前节点, 边) → 下一节点
const TRANSITIONS: &[(GraphNode, Edge, GraphNode)] = &[
    (GraphNode::Start, Edge::Always, GraphNode::Gate),
    (GraphNode::Gate, Edge::Passed, GraphNode::Dependent),
    (GraphNode::Gate, Edge::Failed, GraphNode::End),
    (GraphNode::Dependent, Edge::Always, GraphNode::End),
];

/// 查转移表；表外的组合直接结束
pub fn transition(node: GraphNode, edge: Edge) -> GraphNode {
    TRANSITIONS
        .iter()
        .find(|(from, via, _)| *from == node && *via == edge)
        .map(|(_, _, to)| *to)
        .unwrap_or(GraphNode::End)
}

/// 两个阶段的先后顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOrder {
    /// 相关性门控原创性
    #[default]
    RelevanceFirst,
    /// 原创性门控相关性
    OriginalityFirst,
}

impl FromStr for StageOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relevance_first" | "relevance" => Ok(StageOrder::RelevanceFirst),
            "originality_first" | "originality" => Ok(StageOrder::OriginalityFirst),
            _ => Err(ConfigError::EnvVarParseFailed {
                var_name: "SCREEN_STAGE_ORDER".to_string(),
                value: s.to_string(),
                expected_type: "relevance_first | originality_first".to_string(),
            }),
        }
    }
}

impl Display for StageOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOrder::RelevanceFirst => write!(f, "relevance_first"),
            StageOrder::OriginalityFirst => write!(f, "originality_first"),
        }
    }
}

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRun {
    /// 本篇文献所有阶段的 token 合计
    pub usage: TokenUsage,
    /// 依次经过的节点
    pub visited: Vec<GraphNode>,
}

/// 编译好的筛选图
pub struct ScreeningGraph {
    gate: Box<dyn ScreeningStage>,
    dependent: Box<dyn ScreeningStage>,
}

impl ScreeningGraph {
    /// 按阶段顺序组装两个分类阶段
    pub fn compile(order: StageOrder, classifier: Arc<dyn Classifier>) -> Self {
        let relevance = Box::new(RelevanceStage::new(classifier.clone()));
        let originality = Box::new(OriginalityStage::new(classifier));
        match order {
            StageOrder::RelevanceFirst => Self::from_stages(relevance, originality),
            StageOrder::OriginalityFirst => Self::from_stages(originality, relevance),
        }
    }

    pub fn from_stages(gate: Box<dyn ScreeningStage>, dependent: Box<dyn ScreeningStage>) -> Self {
        Self { gate, dependent }
    }

    pub fn gate(&self) -> &dyn ScreeningStage {
        self.gate.as_ref()
    }

    /// 从 START 运行到 END
    ///
    /// 阶段出错（字段缺失 / schema 不符）直接向上返回，本篇文献没有结论；
    /// 错误上带着此前阶段和失败阶段已消耗的用量。
    pub async fn run(&self, state: &mut ScreeningState) -> Result<GraphRun, ScreeningError> {
        let mut node = GraphNode::Start;
        let mut visited = vec![node];
        let mut usage = TokenUsage::default();

        while node != GraphNode::End {
            let edge = match node {
                GraphNode::Start => Edge::Always,
                GraphNode::Gate => {
                    self.run_stage(self.gate.as_ref(), state, &mut usage).await?;
                    // 未设置按 false 处理
                    if state.decision(self.gate.field()).unwrap_or(false) {
                        Edge::Passed
                    } else {
                        info!(
                            "{} 在 {} 未通过，跳过 {}",
                            state.pmid,
                            self.gate.name(),
                            self.dependent.name()
                        );
                        Edge::Failed
                    }
                }
                GraphNode::Dependent => {
                    self.run_stage(self.dependent.as_ref(), state, &mut usage).await?;
                    Edge::Always
                }
                GraphNode::End => break,
            };
            node = transition(node, edge);
            visited.push(node);
        }

        debug!("{} 状态机路径: {:?}", state.pmid, visited);
        Ok(GraphRun { usage, visited })
    }

    async fn run_stage(
        &self,
        stage: &dyn ScreeningStage,
        state: &mut ScreeningState,
        usage: &mut TokenUsage,
    ) -> Result<(), ScreeningError> {
        let outcome = stage
            .decide(state)
            .await
            .map_err(|e| ScreeningError::from(e).after(*usage))?;
        state.set_decision(stage.field(), outcome.decision);
        *usage += outcome.usage;

        if let Some(observer) = state.observer() {
            observer.on_step(&StepEvent {
                stage: stage.name(),
                pmid: state.pmid.clone(),
                decision: outcome.decision,
                rationale: outcome.rationale,
                usage: outcome.usage,
                overall_usage: *usage,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult, BusinessError, LlmError};
    use crate::models::{ClassifierRequest, ClassifierResponse, DecisionResult};
    use crate::workflow::observer::StepObserver;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按 schema 名称给出固定判断；未配置的 schema 返回 schema 错误
    struct ScriptedClassifier {
        relevant: Option<bool>,
        original: Option<bool>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedClassifier {
        fn new(relevant: Option<bool>, original: Option<bool>) -> Arc<Self> {
            Arc::new(Self {
                relevant,
                original,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn invoke(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse> {
            self.calls.lock().unwrap().push(request.schema.decision_field);
            let decision = match request.schema.decision_field {
                "relevant" => self.relevant,
                _ => self.original,
            };
            let decision = decision.ok_or_else(|| LlmError::SchemaViolation {
                schema: request.schema.name.to_string(),
                reason: "no boolean".to_string(),
                response: "garbled".to_string(),
                usage: TokenUsage::new(4, 4, 0),
            })?;
            Ok(ClassifierResponse {
                result: DecisionResult {
                    rationale: Some(format!("{} reasoning", request.schema.decision_field)),
                    decision,
                },
                raw: String::new(),
                usage: TokenUsage::new(10, 7, 3),
                rationale: None,
            })
        }
    }

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<StepEvent>>,
    }

    impl StepObserver for Collector {
        fn on_step(&self, event: &StepEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn state() -> ScreeningState {
        ScreeningState::new("100", "X").with_document("T", "A", "Intro\nbody")
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(transition(GraphNode::Start, Edge::Always), GraphNode::Gate);
        assert_eq!(transition(GraphNode::Gate, Edge::Passed), GraphNode::Dependent);
        assert_eq!(transition(GraphNode::Gate, Edge::Failed), GraphNode::End);
        assert_eq!(transition(GraphNode::Dependent, Edge::Always), GraphNode::End);
        assert_eq!(transition(GraphNode::Dependent, Edge::Failed), GraphNode::End);
    }

    #[test]
    fn test_stage_order_parse() {
        assert_eq!("relevance_first".parse::<StageOrder>().unwrap(), StageOrder::RelevanceFirst);
        assert_eq!(" Originality_First ".parse::<StageOrder>().unwrap(), StageOrder::OriginalityFirst);
        assert!("sideways".parse::<StageOrder>().is_err());
        assert_eq!(StageOrder::OriginalityFirst.to_string(), "originality_first");
    }

    #[tokio::test]
    async fn test_both_pass_visits_every_node() {
        let classifier = ScriptedClassifier::new(Some(true), Some(true));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());
        let collector = Arc::new(Collector::default());
        let mut state = state().with_observer(collector.clone());

        let run = graph.run(&mut state).await.unwrap();

        assert!(state.accepted());
        assert_eq!(
            run.visited,
            vec![GraphNode::Start, GraphNode::Gate, GraphNode::Dependent, GraphNode::End]
        );
        assert_eq!(run.usage, TokenUsage::new(20, 14, 6));
        assert_eq!(classifier.calls(), vec!["relevant", "original_and_accessible"]);

        let events = collector.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].stage, RelevanceStage::NAME);
        assert_eq!(events[0].overall_usage, TokenUsage::new(10, 7, 3));
        assert_eq!(events[1].stage, OriginalityStage::NAME);
        assert_eq!(events[1].usage, TokenUsage::new(10, 7, 3));
        assert_eq!(events[1].overall_usage, TokenUsage::new(20, 14, 6));
        assert_eq!(events[1].rationale.as_deref(), Some("original_and_accessible reasoning"));
    }

    #[tokio::test]
    async fn test_gate_false_short_circuits() {
        let classifier = ScriptedClassifier::new(Some(false), Some(true));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());
        let mut state = state();

        let run = graph.run(&mut state).await.unwrap();

        assert!(!state.accepted());
        assert_eq!(state.relevant(), Some(false));
        assert_eq!(state.original(), None);
        assert_eq!(run.visited, vec![GraphNode::Start, GraphNode::Gate, GraphNode::End]);
        assert_eq!(run.usage, TokenUsage::new(10, 7, 3));
        assert_eq!(classifier.calls(), vec!["relevant"]);
    }

    #[tokio::test]
    async fn test_originality_first_wiring() {
        let classifier = ScriptedClassifier::new(Some(true), Some(false));
        let graph = ScreeningGraph::compile(StageOrder::OriginalityFirst, classifier.clone());
        let mut state = state();

        graph.run(&mut state).await.unwrap();

        assert_eq!(graph.gate().name(), OriginalityStage::NAME);
        assert_eq!(state.original(), Some(false));
        assert_eq!(state.relevant(), None);
        assert_eq!(classifier.calls(), vec!["original_and_accessible"]);
    }

    #[tokio::test]
    async fn test_originality_first_passes_to_relevance() {
        let classifier = ScriptedClassifier::new(Some(true), Some(true));
        let graph = ScreeningGraph::compile(StageOrder::OriginalityFirst, classifier.clone());
        let mut state = state();

        let run = graph.run(&mut state).await.unwrap();

        assert_eq!(state.original(), Some(true));
        assert_eq!(state.relevant(), Some(true));
        assert!(state.accepted());
        assert_eq!(run.usage, TokenUsage::new(20, 14, 6));
        assert_eq!(classifier.calls(), vec!["original_and_accessible", "relevant"]);
    }

    #[tokio::test]
    async fn test_dependent_false_rejects() {
        let classifier = ScriptedClassifier::new(Some(true), Some(false));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier);
        let mut state = state();

        graph.run(&mut state).await.unwrap();

        assert_eq!(state.relevant(), Some(true));
        assert_eq!(state.original(), Some(false));
        assert!(!state.accepted());
    }

    #[tokio::test]
    async fn test_schema_violation_propagates() {
        let classifier = ScriptedClassifier::new(None, Some(true));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());
        let mut state = state();

        let err = graph.run(&mut state).await.unwrap_err();

        assert!(err.is_schema_violation());
        assert!(matches!(err.error, AppError::Llm(_)));
        assert_eq!(err.usage, TokenUsage::new(4, 4, 0));
        assert_eq!(state.relevant(), None);
        assert_eq!(classifier.calls(), vec!["relevant"]);
    }

    #[tokio::test]
    async fn test_dependent_failure_keeps_gate_usage() {
        let classifier = ScriptedClassifier::new(Some(true), None);
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());
        let mut state = state();

        let err = graph.run(&mut state).await.unwrap_err();

        assert!(err.is_schema_violation());
        assert_eq!(err.usage, TokenUsage::new(14, 11, 3));
        assert_eq!(state.relevant(), Some(true));
        assert_eq!(classifier.calls(), vec!["relevant", "original_and_accessible"]);
    }

    #[tokio::test]
    async fn test_missing_field_after_gate_keeps_gate_usage() {
        let classifier = ScriptedClassifier::new(Some(true), Some(true));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());
        let mut state = ScreeningState::new("100", "X").with_document("T", "A", "   ");

        let err = graph.run(&mut state).await.unwrap_err();

        assert!(matches!(
            err.error,
            AppError::Business(BusinessError::MissingStateField { .. })
        ));
        assert_eq!(err.usage, TokenUsage::new(10, 7, 3));
        assert_eq!(classifier.calls(), vec!["relevant"]);
    }

    #[tokio::test]
    async fn test_graph_is_reusable() {
        let classifier = ScriptedClassifier::new(Some(true), Some(true));
        let graph = ScreeningGraph::compile(StageOrder::RelevanceFirst, classifier.clone());

        for pmid in ["1", "2", "3"] {
            let mut state = ScreeningState::new(pmid, "X").with_document("T", "A", "C");
            assert!(graph.run(&mut state).await.unwrap().visited.len() == 4);
            assert!(state.accepted());
        }
        assert_eq!(classifier.calls().len(), 6);
    }
}
