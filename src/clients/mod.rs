pub mod pubmed_client;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::PaperMetadata;
use crate::services::search_service::SearchQuery;

pub use pubmed_client::PubMedClient;

/// 文献检索接口（esearch）
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// 检索结果总数
    async fn fetch_count(&self, query: &SearchQuery) -> AppResult<u64>;

    /// 一页 PMID，保持索引返回的顺序
    async fn fetch_page(&self, query: &SearchQuery, offset: u64, size: u64) -> AppResult<Vec<String>>;
}

/// 文献内容来源（efetch / 全文页面）
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// 标题、摘要、是否预印本
    async fn fetch_metadata(&self, pmid: &str) -> AppResult<PaperMetadata>;

    /// 全文 HTML；没有可用全文时为 `None`
    async fn fetch_body(&self, pmid: &str) -> AppResult<Option<String>>;
}
