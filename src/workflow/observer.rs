//! 阶段事件与观察者

use crate::models::TokenUsage;

/// 一个分类阶段完成后的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepEvent {
    /// 阶段名称
    pub stage: &'static str,
    pub pmid: String,
    /// 本阶段的判断
    pub decision: bool,
    pub rationale: Option<String>,
    /// 本阶段消耗的 token
    pub usage: TokenUsage,
    /// 本篇文献到目前为止消耗的 token
    pub overall_usage: TokenUsage,
}

/// 接收阶段事件与最终结论
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent);

    fn on_outcome(&self, _pmid: &str, _accepted: bool) {}
}
