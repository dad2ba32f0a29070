//! 文献检索服务 - 业务能力层
//!
//! 只负责"查总数 / 分页取 PMID"能力，失败时降级为空结果而不是报错

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, error, info};

use crate::clients::SearchBackend;

/// 每页 PMID 数量
pub const PAGE_SIZE: u64 = 100;

/// 缺省日期类型：出版日期
pub const DEFAULT_DATETYPE: &str = "pdat";

/// 一次检索：检索式 + 可选日期范围 + 日期类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
    mindate: Option<String>,
    maxdate: Option<String>,
    datetype: String,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            mindate: None,
            maxdate: None,
            datetype: DEFAULT_DATETYPE.to_string(),
        }
    }

    pub fn with_dates(mut self, mindate: Option<String>, maxdate: Option<String>) -> Self {
        self.mindate = mindate;
        self.maxdate = maxdate;
        self
    }

    pub fn with_datetype(mut self, datetype: impl Into<String>) -> Self {
        self.datetype = datetype.into();
        self
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// 日期参数；只有给了至少一个日期边界时才带上 `datetype`
    pub fn date_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(mindate) = &self.mindate {
            params.push(("mindate", mindate.clone()));
        }
        if let Some(maxdate) = &self.maxdate {
            params.push(("maxdate", maxdate.clone()));
        }
        if !params.is_empty() {
            params.push(("datetype", self.datetype.clone()));
        }
        params
    }
}

/// 分页数：ceil(count / PAGE_SIZE)
pub fn page_count(count: u64) -> u64 {
    count.div_ceil(PAGE_SIZE)
}

/// 文献检索服务
///
/// 职责：
/// - 节流由后端负责（见 `PubMedClient`），这里按顺序逐页请求
/// - 查总数失败返回 0
/// - 某一页失败只丢掉这一页，后续页照常请求
pub struct SearchService<B> {
    backend: B,
}

impl<B: SearchBackend> SearchService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 检索结果总数，出错时为 0
    pub async fn count(&self, query: &SearchQuery) -> u64 {
        match self.backend.fetch_count(query).await {
            Ok(count) => {
                info!("检索式 {} 共找到 {} 篇文献", query.term(), count);
                count
            }
            Err(e) => {
                error!("查询检索总数失败 ({}): {}", query.term(), e);
                0
            }
        }
    }

    /// 按偏移量递增逐页取 PMID
    ///
    /// 惰性、有限、只能遍历一次；页内顺序与索引一致
    pub fn pmids<'a>(&'a self, query: &'a SearchQuery, count: u64) -> impl Stream<Item = String> + 'a {
        stream::iter(0..page_count(count))
            .then(move |page| self.fetch_page(query, page * PAGE_SIZE))
            .flat_map(stream::iter)
    }

    async fn fetch_page(&self, query: &SearchQuery, offset: u64) -> Vec<String> {
        match self.backend.fetch_page(query, offset, PAGE_SIZE).await {
            Ok(ids) => {
                debug!("第 {} 条起取到 {} 个 PMID", offset, ids.len());
                ids
            }
            Err(e) => {
                error!("获取 PMID 分页失败 (offset {}): {}", offset, e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按 offset 生成 id，可指定某个 offset 失败
    struct FakeIndex {
        count: AppResult<u64>,
        failing_offset: Option<u64>,
        offsets: Mutex<Vec<u64>>,
    }

    impl FakeIndex {
        fn new(count: u64, failing_offset: Option<u64>) -> Self {
            Self {
                count: Ok(count),
                failing_offset,
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchBackend for FakeIndex {
        async fn fetch_count(&self, _query: &SearchQuery) -> AppResult<u64> {
            match &self.count {
                Ok(c) => Ok(*c),
                Err(_) => Err(AppError::api_parse_failed(
                    "esearch",
                    std::io::Error::other("boom"),
                )),
            }
        }

        async fn fetch_page(&self, _query: &SearchQuery, offset: u64, size: u64) -> AppResult<Vec<String>> {
            self.offsets.lock().unwrap().push(offset);
            if self.failing_offset == Some(offset) {
                return Err(AppError::api_request_failed(
                    "esearch",
                    std::io::Error::other("timeout"),
                ));
            }
            let total = match &self.count {
                Ok(c) => *c,
                Err(_) => 0,
            };
            let end = (offset + size).min(total);
            Ok((offset..end).map(|i| format!("id{}", i)).collect())
        }
    }

    fn service(index: FakeIndex) -> SearchService<FakeIndex> {
        SearchService::new(index)
    }

    #[tokio::test]
    async fn test_pages_requested_in_offset_order() {
        let search = service(FakeIndex::new(250, None));
        let query = SearchQuery::new("X");

        let ids: Vec<String> = search.pmids(&query, 250).collect().await;

        assert_eq!(*search.backend().offsets.lock().unwrap(), vec![0, 100, 200]);
        assert_eq!(ids.len(), 250);
        assert_eq!(ids.first().map(String::as_str), Some("id0"));
        assert_eq!(ids.last().map(String::as_str), Some("id249"));
    }

    #[tokio::test]
    async fn test_failed_middle_page_is_skipped() {
        let search = service(FakeIndex::new(250, Some(100)));
        let query = SearchQuery::new("X");

        let ids: Vec<String> = search.pmids(&query, 250).collect().await;

        assert_eq!(*search.backend().offsets.lock().unwrap(), vec![0, 100, 200]);
        let expected: Vec<String> = (0..100).chain(200..250).map(|i| format!("id{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let search = service(FakeIndex::new(250, None));
        let query = SearchQuery::new("X");

        let first: Vec<String> = search.pmids(&query, 250).take(3).collect().await;

        assert_eq!(first, vec!["id0", "id1", "id2"]);
        assert_eq!(*search.backend().offsets.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_count_error_is_zero() {
        let index = FakeIndex {
            count: Err(AppError::api_parse_failed("esearch", std::io::Error::other("bad"))),
            failing_offset: None,
            offsets: Mutex::new(Vec::new()),
        };
        let search = service(index);
        let query = SearchQuery::new("X");

        assert_eq!(search.count(&query).await, 0);
        let ids: Vec<String> = search.pmids(&query, 0).collect().await;
        assert!(ids.is_empty());
    }

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(1), 1);
        assert_eq!(page_count(100), 1);
        assert_eq!(page_count(250), 3);
    }

    #[test]
    fn test_datetype_only_with_a_bound() {
        let open = SearchQuery::new("X");
        assert!(open.date_params().is_empty());

        let bounded = SearchQuery::new("X").with_dates(Some("2024/06/01".to_string()), None);
        assert_eq!(
            bounded.date_params(),
            vec![("mindate", "2024/06/01".to_string()), ("datetype", "pdat".to_string())]
        );

        let both = SearchQuery::new("X")
            .with_dates(Some("2024/06/01".to_string()), Some("2025/06/01".to_string()))
            .with_datetype("edat");
        assert_eq!(both.date_params().len(), 3);
        assert_eq!(both.date_params()[2], ("datetype", "edat".to_string()));
    }
}
