//! 文献获取服务 - 业务能力层
//!
//! 先查缓存，未命中再请求数据源，然后尽力回写缓存

use tracing::{debug, warn};

use crate::clients::PaperSource;
use crate::infrastructure::PaperCache;
use crate::models::PaperMetadata;

/// 文献获取服务
///
/// 职责：
/// - 元数据 / 全文的读穿透缓存
/// - 缓存不可用时退化为"总是未命中"
/// - 数据源出错时返回未找到，不向上抛
pub struct PaperRetriever<S> {
    source: S,
    cache: PaperCache,
}

impl<S: PaperSource> PaperRetriever<S> {
    pub fn new(source: S, cache: PaperCache) -> Self {
        Self { source, cache }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> &PaperCache {
        &self.cache
    }

    /// 标题、摘要、是否预印本
    pub async fn metadata(&self, pmid: &str) -> PaperMetadata {
        let cached = self.cache.get_metadata(pmid);
        if cached.is_found() {
            debug!("元数据命中缓存 (PMID {})", pmid);
            return cached;
        }

        let fetched = match self.source.fetch_metadata(pmid).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("获取元数据失败 (PMID {}): {}", pmid, e);
                return PaperMetadata::default();
            }
        };

        if fetched.is_found() {
            self.cache.put_metadata(
                pmid,
                fetched.title.as_deref(),
                fetched.abstract_text.as_deref(),
                fetched.is_preprint,
            );
        }
        fetched
    }

    /// 全文 HTML；`None` 表示获取失败或没有全文
    pub async fn body(&self, pmid: &str) -> Option<String> {
        if let Some(body) = self.cache.get_body(pmid).filter(|b| !b.is_empty()) {
            debug!("全文命中缓存 (PMID {})", pmid);
            return Some(body);
        }

        let body = match self.source.fetch_body(pmid).await {
            Ok(Some(body)) if !body.is_empty() => body,
            Ok(_) => return None,
            Err(e) => {
                warn!("获取全文失败 (PMID {}): {}", pmid, e);
                return None;
            }
        };

        self.cache.put_body(pmid, &body);
        Some(body)
    }
}
