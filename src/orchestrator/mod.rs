//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量筛选和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量筛选处理器
//! - 管理应用生命周期（初始化、运行）
//! - 加载研究范围配置（ScopeCatalog）
//! - 检索 PMID 并逐篇交给 ScreeningFlow
//! - 续跑时跳过已有结论的文献
//! - 输出每个研究范围和全局的统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一个研究范围的全部 PMID)
//!     ↓
//! workflow::ScreeningFlow (处理单篇文献)
//!     ↓
//! workflow::ScreeningGraph (两个分类阶段)
//!     ↓
//! services (能力层：search / retrieve / extract / llm / result)
//!     ↓
//! infrastructure + clients (缓存、节流、PubMed)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_processor 管批量，ScreeningFlow 管单篇
//! 2. **串行执行**：一篇文献完全结束后才开始下一篇
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体业务判断

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::{run_scope, App, BatchReport};
