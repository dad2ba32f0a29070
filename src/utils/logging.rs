//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{ScopeConfig, TokenUsage};
use crate::workflow::{StepEvent, StepObserver};

/// 初始化日志：同时输出到终端和日志文件
///
/// 级别由 `RUST_LOG` 控制，缺省 `info`
pub fn init(log_file_path: &str) -> Result<()> {
    init_log_file(log_file_path)?;

    let file = OpenOptions::new()
        .append(true)
        .open(log_file_path)
        .with_context(|| format!("无法打开日志文件: {}", log_file_path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stdout.and(Mutex::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("初始化日志失败: {}", e))?;

    Ok(())
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n文献筛选日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)
        .with_context(|| format!("无法写入日志文件: {}", log_file_path))?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 文献筛选模式");
    info!("🤖 模型: {} (两段式: {})", config.llm_model_name, config.llm_two_step);
    info!("🔀 阶段顺序: {}", config.stage_order);
    info!("📁 缓存目录: {}", config.data_folder);
    info!("📝 结果目录: {}", config.result_folder);
    info!("{}", "=".repeat(60));
}

/// 记录研究范围开始信息
///
/// # 参数
/// - `scope_name`: 研究范围名称
/// - `scope`: 研究范围配置
/// - `count`: 检索到的文献总数
pub fn log_scope_start(scope_name: &str, scope: &ScopeConfig, count: u64) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始筛选研究范围: {}", scope_name);
    info!("🔍 检索式: {}", truncate_text(&scope.query, 120));
    if scope.mindate.is_some() || scope.maxdate.is_some() {
        info!(
            "📅 日期范围: {} - {}",
            scope.mindate.as_deref().unwrap_or("*"),
            scope.maxdate.as_deref().unwrap_or("*")
        );
    }
    info!("📄 共找到 {} 篇文献", count);
    info!("{}", "=".repeat(60));
}

/// 记录研究范围完成信息
pub fn log_scope_complete(scope_name: &str, accepted: &[String], screened: usize) {
    info!("\n{}", "─".repeat(60));
    info!("✓ 研究范围 {} 完成: 通过 {}/{}", scope_name, accepted.len(), screened);
    info!("通过的 PMID: {:?}", accepted);
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `accepted`: 通过数量
/// - `rejected`: 拒绝数量
/// - `skipped`: 续跑跳过数量
/// - `failed`: 失败数量
/// - `usage`: 全部 token 用量
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(
    accepted: usize,
    rejected: usize,
    skipped: usize,
    failed: usize,
    usage: &TokenUsage,
    log_file_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 通过: {}", accepted);
    info!("🚫 拒绝: {}", rejected);
    info!("⏭️ 跳过: {}", skipped);
    info!("❌ 失败: {}", failed);
    info!("🧮 {}", usage);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

/// 把阶段事件写进日志，并累计整批的 token 用量
#[derive(Debug, Default)]
pub struct LogObserver {
    overall: Mutex<TokenUsage>,
}

impl LogObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 目前为止整批的 token 用量
    pub fn overall(&self) -> TokenUsage {
        self.overall.lock().map(|u| *u).unwrap_or_default()
    }
}

impl StepObserver for LogObserver {
    fn on_step(&self, event: &StepEvent) {
        let overall = match self.overall.lock() {
            Ok(mut total) => {
                *total += event.usage;
                *total
            }
            Err(_) => event.overall_usage,
        };

        info!("{}", "=".repeat(64));
        info!("{} (PMID {})", event.stage, event.pmid);
        info!("step {}", event.usage);
        info!("overall {}", overall);
        if let Some(rationale) = &event.rationale {
            info!("\n\n{}\n\n", rationale);
        }
        info!("判断: {}", event.decision);
    }

    fn on_outcome(&self, pmid: &str, accepted: bool) {
        if accepted {
            info!("✅ PMID {} 通过筛选", pmid);
        } else {
            info!("🚫 PMID {} 未通过筛选", pmid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("abc", 5), "abc");
        assert_eq!(truncate_text("阿尔茨海默病单细胞", 3), "阿尔茨...");
    }

    #[test]
    fn test_log_observer_accumulates() {
        let observer = LogObserver::new();
        let event = StepEvent {
            stage: "Identify Relevance Step",
            pmid: "1".to_string(),
            decision: true,
            rationale: None,
            usage: TokenUsage::new(10, 8, 2),
            overall_usage: TokenUsage::new(10, 8, 2),
        };
        observer.on_step(&event);
        observer.on_step(&event);
        assert_eq!(observer.overall(), TokenUsage::new(20, 16, 4));
    }
}
