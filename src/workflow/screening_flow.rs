//! 单篇文献筛选流程 - 流程层
//!
//! 核心职责：定义"一篇文献"的完整筛选流程
//!
//! 流程顺序：
//! 1. 元数据 → 缺标题/摘要或预印本直接拒绝（不调用 LLM）
//! 2. 全文 → 没有全文拒绝
//! 3. 章节提取 → 没有章节或正文为空拒绝
//! 4. 状态机（两个分类阶段）
//! 5. 结论写入结果日志

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::PaperSource;
use crate::error::{AppError, ScreeningError};
use crate::models::{full_text, ScopeConfig, TokenUsage};
use crate::services::{PaperRetriever, ResultWriter, SectionExtractor};
use crate::workflow::observer::StepObserver;
use crate::workflow::screening_graph::ScreeningGraph;
use crate::workflow::screening_state::ScreeningState;

/// 拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// 缺标题或摘要
    MissingMetadata,
    Preprint,
    NoFullText,
    NoSections,
    /// 阶段所需字段缺失
    MalformedState,
    /// 分类器判定不通过
    Declined,
}

impl Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::MissingMetadata => "缺少标题或摘要",
            RejectReason::Preprint => "预印本",
            RejectReason::NoFullText => "没有全文",
            RejectReason::NoSections => "全文未提取到章节",
            RejectReason::MalformedState => "筛选状态不完整",
            RejectReason::Declined => "分类未通过",
        };
        f.write_str(text)
    }
}

/// 筛选结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

/// 单篇文献的筛选报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreeningReport {
    pub verdict: Verdict,
    /// 本篇文献的 token 用量
    pub usage: TokenUsage,
}

impl ScreeningReport {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            verdict: Verdict::Rejected(reason),
            usage: TokenUsage::default(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

/// 单篇文献筛选流程
///
/// - 编排获取、过滤、提取、分类、记录
/// - 只依赖业务能力（services）和状态机
/// - 不关心文献从哪个检索结果来
pub struct ScreeningFlow<S> {
    retriever: PaperRetriever<S>,
    extractor: Box<dyn SectionExtractor>,
    graph: ScreeningGraph,
    result_folder: PathBuf,
    observer: Option<Arc<dyn StepObserver>>,
}

impl<S: PaperSource> ScreeningFlow<S> {
    pub fn new(
        retriever: PaperRetriever<S>,
        extractor: Box<dyn SectionExtractor>,
        graph: ScreeningGraph,
        result_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            retriever,
            extractor,
            graph,
            result_folder: result_folder.into(),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn retriever(&self) -> &PaperRetriever<S> {
        &self.retriever
    }

    /// 研究范围对应的结果日志
    pub fn result_writer(&self, scope_name: &str) -> ResultWriter {
        ResultWriter::for_scope(&self.result_folder, scope_name)
    }

    /// 筛选一篇文献
    ///
    /// 分类器输出不符合 schema 时返回错误，且不写结果日志；
    /// 错误上带着本篇文献已消耗的用量。
    pub async fn screen(
        &self,
        pmid: &str,
        scope_name: &str,
        scope: &ScopeConfig,
    ) -> Result<ScreeningReport, ScreeningError> {
        let report = self.evaluate(pmid, scope).await?;

        let accepted = report.is_accepted();
        if let Verdict::Rejected(reason) = report.verdict {
            info!("{} 未通过筛选: {}", pmid, reason);
        }
        if let Some(observer) = &self.observer {
            observer.on_outcome(pmid, accepted);
        }

        let writer = self.result_writer(scope_name);
        if let Err(e) = writer.write(pmid, &scope.query, accepted).await {
            error!("写入结果日志失败 ({}): {}", pmid, e);
        }

        Ok(report)
    }

    async fn evaluate(
        &self,
        pmid: &str,
        scope: &ScopeConfig,
    ) -> Result<ScreeningReport, ScreeningError> {
        // ========== 1. 元数据过滤 ==========
        let metadata = self.retriever.metadata(pmid).await;
        let (Some(title), Some(abstract_text)) = (
            metadata.title.as_deref().filter(|_| metadata.is_complete()),
            metadata.abstract_text.as_deref(),
        ) else {
            return Ok(ScreeningReport::rejected(RejectReason::MissingMetadata));
        };
        if metadata.is_preprint {
            return Ok(ScreeningReport::rejected(RejectReason::Preprint));
        }

        // ========== 2. 全文 ==========
        let Some(body) = self.retriever.body(pmid).await else {
            return Ok(ScreeningReport::rejected(RejectReason::NoFullText));
        };

        // ========== 3. 章节提取 ==========
        let content = self
            .extractor
            .extract_sections(&body)
            .map(|sections| full_text(&sections))
            .filter(|text| !text.trim().is_empty());
        let Some(content) = content else {
            warn!("{} 的全文没有可用章节", pmid);
            return Ok(ScreeningReport::rejected(RejectReason::NoSections));
        };

        // ========== 4. 状态机 ==========
        let mut state =
            ScreeningState::for_scope(pmid, scope).with_document(title, abstract_text, content);
        if let Some(observer) = &self.observer {
            state = state.with_observer(observer.clone());
        }

        let run = match self.graph.run(&mut state).await {
            Ok(run) => run,
            Err(ScreeningError {
                error: AppError::Business(e),
                usage,
            }) => {
                warn!("{} 筛选状态不完整: {}", pmid, e);
                return Ok(ScreeningReport {
                    verdict: Verdict::Rejected(RejectReason::MalformedState),
                    usage,
                });
            }
            Err(e) => return Err(e),
        };

        let verdict = if state.accepted() {
            Verdict::Accepted
        } else {
            Verdict::Rejected(RejectReason::Declined)
        };
        Ok(ScreeningReport {
            verdict,
            usage: run.usage,
        })
    }
}
