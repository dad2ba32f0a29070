//! 研究范围（scope）配置

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{AppResult, ConfigError};
use crate::services::search_service::SearchQuery;

/// 指令缺省值
pub const NO_INSTRUCTIONS: &str = "N/A";

/// 单个研究范围：检索式、日期范围、两个阶段的附加指令
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScopeConfig {
    /// PubMed 检索式
    pub query: String,
    #[serde(default)]
    pub mindate: Option<String>,
    #[serde(default)]
    pub maxdate: Option<String>,
    /// 日期类型，缺省为出版日期 `pdat`
    #[serde(default)]
    pub datetype: Option<String>,
    /// 写进提示词的研究目标描述，缺省时使用检索式
    #[serde(default)]
    pub research_goal: Option<String>,
    #[serde(default)]
    pub identify_relevant_instructions: Option<String>,
    #[serde(default)]
    pub identify_original_instructions: Option<String>,
}

impl ScopeConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            mindate: None,
            maxdate: None,
            datetype: None,
            research_goal: None,
            identify_relevant_instructions: None,
            identify_original_instructions: None,
        }
    }

    /// 提示词中的研究目标
    pub fn descriptor(&self) -> &str {
        self.research_goal.as_deref().unwrap_or(&self.query)
    }

    pub fn relevant_instructions(&self) -> &str {
        self.identify_relevant_instructions
            .as_deref()
            .unwrap_or(NO_INSTRUCTIONS)
    }

    pub fn original_instructions(&self) -> &str {
        self.identify_original_instructions
            .as_deref()
            .unwrap_or(NO_INSTRUCTIONS)
    }

    /// 对应的检索请求
    pub fn search_query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(&self.query)
            .with_dates(self.mindate.clone(), self.maxdate.clone());
        if let Some(datetype) = &self.datetype {
            query = query.with_datetype(datetype);
        }
        query
    }
}

/// 全部研究范围，按名称排序
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ScopeCatalog {
    scopes: BTreeMap<String, ScopeConfig>,
}

impl ScopeCatalog {
    pub fn get(&self, name: &str) -> AppResult<&ScopeConfig> {
        self.scopes.get(name).ok_or_else(|| {
            ConfigError::ScopeNotFound {
                scope: name.to_string(),
            }
            .into()
        })
    }

    pub fn names(&self) -> Vec<String> {
        self.scopes.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
