//! 批量筛选处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责按研究范围批量筛选文献和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：加载研究范围配置、创建客户端与服务、编译状态机
//! 2. **检索**：查询总数后逐页拉取 PMID
//! 3. **续跑**：跳过结果日志中已有结论的 PMID，已通过的沿用到本次结果
//! 4. **逐篇筛选**：一篇完全结束后才开始下一篇
//! 5. **全局统计**：汇总每个研究范围的结果和 token 用量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单篇文献的细节
//! - **容错**：单篇文献出错只计入失败，整批总会跑完
//! - **向下委托**：委托 ScreeningFlow 处理单篇文献

use anyhow::{Context, Result};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::pin::pin;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{PaperSource, PubMedClient, SearchBackend};
use crate::config::Config;
use crate::infrastructure::PaperCache;
use crate::models::{load_scope_catalog, ScopeCatalog, ScopeConfig, TokenUsage};
use crate::services::{
    Classifier, HtmlSectionExtractor, LlmService, PaperRetriever, ResultWriter, SearchService,
};
use crate::utils::logging::{self, LogObserver};
use crate::workflow::{ScreeningFlow, ScreeningGraph};

/// 一个研究范围的批量筛选结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 通过筛选的 PMID，按检索顺序；包含续跑沿用的结论
    pub accepted_ids: Vec<String>,
    pub rejected: usize,
    /// 续跑或重复而跳过
    pub skipped: usize,
    /// `accepted_ids` 中从结果日志沿用的个数（也计入 `skipped`）
    pub carried_over: usize,
    /// 出错、没有结论
    pub failed: usize,
    /// 包含失败文献在出错前消耗的用量
    pub usage: TokenUsage,
}

impl BatchReport {
    /// 有结论的文献数，含续跑沿用的通过结论
    pub fn screened(&self) -> usize {
        self.accepted_ids.len() + self.rejected
    }

    /// 合并另一个研究范围的结果
    pub fn absorb(&mut self, other: BatchReport) {
        self.accepted_ids.extend(other.accepted_ids);
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.carried_over += other.carried_over;
        self.failed += other.failed;
        self.usage += other.usage;
    }
}

/// 筛选一个研究范围下检索到的全部文献
///
/// `resume` 为 true 时跳过 `writer` 中已记录的 PMID，其中已通过的仍列入 `accepted_ids`
pub async fn run_scope<B, S>(
    search: &SearchService<B>,
    flow: &ScreeningFlow<S>,
    writer: &ResultWriter,
    scope_name: &str,
    scope: &ScopeConfig,
    resume: bool,
) -> BatchReport
where
    B: SearchBackend,
    S: PaperSource,
{
    let query = scope.search_query();
    let count = search.count(&query).await;
    logging::log_scope_start(scope_name, scope, count);

    let recorded: HashMap<String, bool> = if resume {
        let recorded = writer.recorded_verdicts().await;
        if !recorded.is_empty() {
            info!("⏭️ 结果日志中已有 {} 篇文献的结论，将跳过", recorded.len());
        }
        recorded
    } else {
        HashMap::new()
    };

    let mut report = BatchReport::default();
    let mut seen = HashSet::new();
    let mut pmids = pin!(search.pmids(&query, count));
    let mut position = 0u64;

    while let Some(pmid) = pmids.next().await {
        position += 1;
        if !seen.insert(pmid.clone()) {
            report.skipped += 1;
            continue;
        }
        if let Some(&accepted) = recorded.get(&pmid) {
            report.skipped += 1;
            if accepted {
                report.accepted_ids.push(pmid);
                report.carried_over += 1;
            }
            continue;
        }

        info!("📄 [{}/{}] PMID: {}", position, count, pmid);

        match flow.screen(&pmid, scope_name, scope).await {
            Ok(outcome) => {
                report.usage += outcome.usage;
                if outcome.is_accepted() {
                    info!("PMID {} is relevant to {}.", pmid, scope.query);
                    report.accepted_ids.push(pmid);
                } else {
                    info!("PMID {} is NOT relevant to {}.", pmid, scope.query);
                    report.rejected += 1;
                }
            }
            Err(e) => {
                error!("❌ PMID {} 筛选失败: {} ({})", pmid, e, e.usage);
                report.usage += e.usage;
                report.failed += 1;
            }
        }
    }

    logging::log_scope_complete(scope_name, &report.accepted_ids, report.screened());
    report
}

/// 应用主结构
pub struct App {
    config: Config,
    catalog: ScopeCatalog,
    search: SearchService<PubMedClient>,
    flow: ScreeningFlow<PubMedClient>,
    observer: Arc<LogObserver>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let catalog = load_scope_catalog(Path::new(&config.scope_config_path))
            .await
            .with_context(|| format!("加载研究范围配置失败: {}", config.scope_config_path))?;
        if catalog.is_empty() {
            warn!("⚠️ 研究范围配置 {} 中没有任何研究范围", config.scope_config_path);
        } else {
            info!("✓ 加载了 {} 个研究范围", catalog.len());
        }

        if let Some(scope) = &config.scope {
            catalog.get(scope)?;
        }

        // 检索与全文获取共用同一个节流器
        let pubmed = PubMedClient::new(&config)?;
        let search = SearchService::new(pubmed.clone());

        let retriever = PaperRetriever::new(pubmed, PaperCache::new(&config.data_folder));
        let classifier: Arc<dyn Classifier> = Arc::new(LlmService::new(&config));
        let graph = ScreeningGraph::compile(config.stage_order, classifier);

        let observer = Arc::new(LogObserver::new());
        let flow = ScreeningFlow::new(
            retriever,
            Box::new(HtmlSectionExtractor::new()),
            graph,
            &config.result_folder,
        )
        .with_observer(observer.clone());

        Ok(Self {
            config,
            catalog,
            search,
            flow,
            observer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<BatchReport> {
        let scope_names: Vec<String> = match &self.config.scope {
            Some(name) => vec![name.clone()],
            None => self.catalog.names(),
        };

        if scope_names.is_empty() {
            warn!("⚠️ 研究范围配置为空，程序结束");
            return Ok(BatchReport::default());
        }

        let mut total = BatchReport::default();
        for name in &scope_names {
            let scope = self.catalog.get(name)?;
            let writer = self.flow.result_writer(name);
            let report = run_scope(
                &self.search,
                &self.flow,
                &writer,
                name,
                scope,
                self.config.resume,
            )
            .await;
            total.absorb(report);
        }

        logging::print_final_stats(
            total.accepted_ids.len(),
            total.rejected,
            total.skipped,
            total.failed,
            &total.usage,
            &self.config.output_log_file,
        );
        // 差额来自出错文献的调用
        let decided = self.observer.overall();
        if decided != total.usage {
            info!("📊 其中已完成判断的阶段用量: {}", decided);
        }

        Ok(total)
    }
}
