use crate::workflow::StageOrder;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 缓存数据库所在的根目录（其下创建 `database/`）
    pub data_folder: String,
    /// 研究范围配置文件（TOML）
    pub scope_config_path: String,
    /// 筛选结果日志目录，每个研究范围一个文件
    pub result_folder: String,
    /// 只运行指定研究范围；为空时运行配置文件中的全部范围
    pub scope: Option<String>,
    /// 跳过结果日志中已记录的文献
    pub resume: bool,
    /// 两个分类阶段的先后顺序
    pub stage_order: StageOrder,
    /// 程序运行日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_output_tokens: u32,
    /// 先推理再抽取结构化结果的两段式调用
    pub llm_two_step: bool,
    /// 输出不符合 schema 时的最大重问次数
    pub llm_schema_retries: usize,
    // --- PubMed API 配置 ---
    pub pubmed_api_base_url: String,
    pub pmc_base_url: String,
    pub idconv_url: String,
    /// 每次检索请求前的固定等待（毫秒）
    pub pubmed_request_delay_ms: u64,
    pub ncbi_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_folder: ".".to_string(),
            scope_config_path: "config/scope_config.toml".to_string(),
            result_folder: "results".to_string(),
            scope: None,
            resume: true,
            stage_order: StageOrder::RelevanceFirst,
            output_log_file: "app.log".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            llm_max_output_tokens: 4096,
            llm_two_step: false,
            llm_schema_retries: 3,
            pubmed_api_base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            pmc_base_url: "https://pmc.ncbi.nlm.nih.gov/articles".to_string(),
            idconv_url: "https://www.ncbi.nlm.nih.gov/pmc/utils/idconv/v1.0/".to_string(),
            pubmed_request_delay_ms: 400,
            ncbi_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            data_folder: std::env::var("DATA_FOLDER").unwrap_or(default.data_folder),
            scope_config_path: std::env::var("SCOPE_CONFIG_PATH").unwrap_or(default.scope_config_path),
            result_folder: std::env::var("RESULT_FOLDER").unwrap_or(default.result_folder),
            scope: std::env::var("SCREEN_SCOPE").ok().filter(|s| !s.trim().is_empty()),
            resume: std::env::var("SCREEN_RESUME").ok().and_then(|v| v.parse().ok()).unwrap_or(default.resume),
            stage_order: std::env::var("SCREEN_STAGE_ORDER").ok().and_then(|v| v.parse().ok()).unwrap_or(default.stage_order),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_max_output_tokens: std::env::var("LLM_MAX_OUTPUT_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_max_output_tokens),
            llm_two_step: std::env::var("LLM_TWO_STEP").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_two_step),
            llm_schema_retries: std::env::var("LLM_SCHEMA_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.llm_schema_retries),
            pubmed_api_base_url: std::env::var("PUBMED_API_BASE_URL").unwrap_or(default.pubmed_api_base_url),
            pmc_base_url: std::env::var("PMC_BASE_URL").unwrap_or(default.pmc_base_url),
            idconv_url: std::env::var("IDCONV_URL").unwrap_or(default.idconv_url),
            pubmed_request_delay_ms: std::env::var("PUBMED_REQUEST_DELAY_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.pubmed_request_delay_ms),
            ncbi_api_key: std::env::var("NCBI_API_KEY").ok().filter(|s| !s.trim().is_empty()),
        }
    }
}
