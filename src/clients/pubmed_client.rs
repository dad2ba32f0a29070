/// PubMed / PMC API 客户端
///
/// 封装 esearch、efetch、PMCID 转换和全文页面下载
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clients::{PaperSource, SearchBackend};
use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult};
use crate::infrastructure::RequestThrottle;
use crate::models::PaperMetadata;
use crate::services::search_service::SearchQuery;
use crate::utils::markup;

const USER_AGENT: &str = concat!("paper_screen/", env!("CARGO_PKG_VERSION"));
const TOOL_NAME: &str = "paper_screen";

/// PubMed 客户端
///
/// 内部 `reqwest::Client` 共享连接池，clone 开销很小；
/// 所有 clone 共用同一个节流器，每个请求都先取得许可
#[derive(Clone)]
pub struct PubMedClient {
    http: reqwest::Client,
    throttle: Arc<RequestThrottle>,
    base_url: String,
    pmc_base_url: String,
    idconv_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    /// 创建新的 PubMed 客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppError::api_request_failed("http client", e))?;

        Ok(Self {
            http,
            throttle: Arc::new(RequestThrottle::from_millis(config.pubmed_request_delay_ms)),
            base_url: config.pubmed_api_base_url.trim_end_matches('/').to_string(),
            pmc_base_url: config.pmc_base_url.trim_end_matches('/').to_string(),
            idconv_url: config.idconv_url.clone(),
            api_key: config.ncbi_api_key.clone(),
        })
    }

    pub fn throttle(&self) -> &RequestThrottle {
        &self.throttle
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url, name)
    }

    /// GET 请求并返回响应文本
    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> AppResult<String> {
        let mut params = params.to_vec();
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let _permit = self.throttle.acquire().await;
        debug!("GET {} {:?}", url, params);

        let response = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))
    }

    async fn esearch(&self, query: &SearchQuery, extra: &[(&str, String)]) -> AppResult<EsearchResult> {
        let url = self.endpoint("esearch.fcgi");
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.term().to_string()),
            ("retmode", "json".to_string()),
        ];
        params.extend(query.date_params());
        params.extend_from_slice(extra);

        let body = self.get_text(&url, &params).await?;
        parse_esearch(&url, &body)
    }

    /// PMID → PMCID
    async fn resolve_pmcid(&self, pmid: &str) -> AppResult<Option<String>> {
        let params = [
            ("ids", pmid.to_string()),
            ("format", "json".to_string()),
            ("tool", TOOL_NAME.to_string()),
        ];
        let body = self.get_text(&self.idconv_url, &params).await?;
        parse_idconv(&self.idconv_url, &body)
    }
}

#[async_trait]
impl SearchBackend for PubMedClient {
    async fn fetch_count(&self, query: &SearchQuery) -> AppResult<u64> {
        let result = self.esearch(query, &[("retmax", "0".to_string())]).await?;
        let count = result.count.ok_or_else(|| ApiError::MissingField {
            endpoint: "esearch".to_string(),
            field: "esearchresult.count".to_string(),
        })?;
        count
            .trim()
            .parse()
            .map_err(|e| AppError::api_parse_failed("esearch", e))
    }

    async fn fetch_page(&self, query: &SearchQuery, offset: u64, size: u64) -> AppResult<Vec<String>> {
        let extra = [("retmax", size.to_string()), ("retstart", offset.to_string())];
        let result = self.esearch(query, &extra).await?;
        result.idlist.ok_or_else(|| {
            ApiError::MissingField {
                endpoint: "esearch".to_string(),
                field: "esearchresult.idlist".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl PaperSource for PubMedClient {
    async fn fetch_metadata(&self, pmid: &str) -> AppResult<PaperMetadata> {
        let url = self.endpoint("efetch.fcgi");
        let params = [
            ("db", "pubmed".to_string()),
            ("id", pmid.to_string()),
            ("retmode", "xml".to_string()),
        ];
        let xml = self.get_text(&url, &params).await?;
        parse_pubmed_article(&xml).map_err(|e| AppError::api_parse_failed(url, e))
    }

    async fn fetch_body(&self, pmid: &str) -> AppResult<Option<String>> {
        let Some(pmcid) = self.resolve_pmcid(pmid).await? else {
            debug!("PMID {} 没有对应的 PMC 全文", pmid);
            return Ok(None);
        };

        let url = format!("{}/{}/", self.pmc_base_url, pmcid);
        let html = self.get_text(&url, &[]).await?;
        Ok(Some(html).filter(|h| !h.trim().is_empty()))
    }
}

// ========== 响应解析 ==========

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: Option<EsearchResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    count: Option<String>,
    idlist: Option<Vec<String>>,
}

fn parse_esearch(endpoint: &str, body: &str) -> AppResult<EsearchResult> {
    let response: EsearchResponse =
        serde_json::from_str(body).map_err(|e| AppError::api_parse_failed(endpoint, e))?;

    match response.esearchresult {
        Some(result) => Ok(result),
        None => Err(ApiError::MissingField {
            endpoint: endpoint.to_string(),
            field: format!(
                "esearchresult (error: {})",
                response.error.as_deref().unwrap_or("unknown error")
            ),
        }
        .into()),
    }
}

fn parse_idconv(endpoint: &str, body: &str) -> AppResult<Option<String>> {
    let value: JsonValue =
        serde_json::from_str(body).map_err(|e| AppError::api_parse_failed(endpoint, e))?;

    let pmcid = value
        .get("records")
        .and_then(|v| v.as_array())
        .and_then(|records| records.first())
        .and_then(|record| record.get("pmcid"))
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(pmcid)
}

/// 从 efetch XML 中解析第一篇文献的元数据
fn parse_pubmed_article(xml: &str) -> Result<PaperMetadata, regex::Error> {
    let article_re = Regex::new(r"(?s)<PubmedArticle>(.*?)</PubmedArticle>")?;
    let Some(article) = article_re.captures(xml).and_then(|c| c.get(1)) else {
        return Ok(PaperMetadata::default());
    };
    let article = article.as_str();

    let title_re = Regex::new(r"(?s)<ArticleTitle[^>]*>(.*?)</ArticleTitle>")?;
    let title = match title_re.captures(article).and_then(|c| c.get(1)) {
        Some(m) => Some(markup::to_plain_text(m.as_str())?),
        None => None,
    }
    .filter(|t| !t.is_empty());

    let abstract_re = Regex::new(r"(?s)<Abstract>(.*?)</Abstract>")?;
    let text_re = Regex::new(r"(?s)<AbstractText[^>]*>(.*?)</AbstractText>")?;
    let abstract_text = match abstract_re.captures(article).and_then(|c| c.get(1)) {
        Some(block) => {
            let mut parts = Vec::new();
            for cap in text_re.captures_iter(block.as_str()) {
                let text = markup::to_plain_text(&cap[1])?;
                if !text.is_empty() {
                    parts.push(text);
                }
            }
            Some(parts.join("\n")).filter(|a| !a.is_empty())
        }
        None => None,
    };

    let type_re = Regex::new(r"(?s)<PublicationType[^>]*>(.*?)</PublicationType>")?;
    let is_preprint = type_re
        .captures_iter(article)
        .any(|cap| is_preprint_type(&cap[1]));

    Ok(PaperMetadata {
        title,
        abstract_text,
        is_preprint,
    })
}

/// 出版类型是否为预印本（不区分大小写）
pub fn is_preprint_type(publication_type: &str) -> bool {
    let lower = publication_type.to_lowercase();
    lower.contains("preprint") || lower.contains("pre-print")
}
