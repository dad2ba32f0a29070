//! # Paper Screen
//!
//! 一个用于 PubMed 文献自动筛选的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `PaperCache` - SQLite 文献缓存，每次调用打开/关闭连接
//! - `RequestThrottle` - 全局 NCBI 请求节流
//! - `clients/` - `PubMedClient`（esearch / efetch / idconv / PMC 全文）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单篇文献
//! - `SearchService` - 查总数、分页取 PMID
//! - `PaperRetriever` - 缓存优先的元数据 / 全文获取
//! - `SectionExtractor` - 全文章节提取
//! - `LlmService` - 结构化判断能力（`Classifier`）
//! - `ResultWriter` - 写结果日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一篇文献"的完整筛选流程
//! - `ScreeningState` - 单篇文献的筛选状态
//! - `ScreeningGraph` - 两阶段状态机（门控阶段 → 依赖阶段）
//! - `ScreeningFlow` - 流程编排（元数据 → 全文 → 章节 → 状态机 → 结果）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 按研究范围批量筛选，续跑与统计
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult, ScreeningError};
pub use infrastructure::{PaperCache, RequestThrottle};
pub use models::{ScopeCatalog, ScopeConfig, TokenUsage};
pub use orchestrator::{run_scope, App, BatchReport};
pub use workflow::{ScreeningFlow, ScreeningGraph, ScreeningReport, ScreeningState, StageOrder, Verdict};
