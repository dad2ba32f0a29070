use thiserror::Error;

use crate::models::TokenUsage;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误（检索 / 元数据 / 全文）
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 缓存存储错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 业务逻辑错误
    #[error("业务错误: {0}")]
    Business(#[from] BusinessError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },
    /// API 返回错误状态码
    #[error("API返回错误响应 ({endpoint}): status={status}")]
    BadResponse { endpoint: String, status: u16 },
    /// 响应缺少必要字段
    #[error("API响应缺少字段 ({endpoint}): {field}")]
    MissingField { endpoint: String, field: String },
    /// 响应解析失败
    #[error("响应解析失败 ({endpoint}): {source}")]
    ParseFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },
}

/// 缓存存储错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 无法创建缓存目录
    #[error("无法创建缓存目录 {path}: {source}")]
    CreateDirFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 无法打开数据库
    #[error("无法打开数据库 {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    /// SQL 执行失败
    #[error("SQL执行失败: {0}")]
    Query(#[from] rusqlite::Error),
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: BoxError,
        /// 失败前已消耗的用量
        usage: TokenUsage,
    },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String, usage: TokenUsage },
    /// 返回结果不符合 schema
    #[error("LLM返回结果不符合 schema {schema}: {reason} (响应: {response})")]
    SchemaViolation {
        schema: String,
        reason: String,
        response: String,
        /// 所有尝试合计的用量
        usage: TokenUsage,
    },
}

/// 业务逻辑错误
#[derive(Debug, Error)]
pub enum BusinessError {
    /// 阶段所需的状态字段缺失
    #[error("阶段 {stage} 缺少状态字段: {field}")]
    MissingStateField { stage: String, field: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件中不存在该研究范围
    #[error("配置中不存在研究范围: {scope}")]
    ScopeNotFound { scope: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建响应解析失败错误
    pub fn api_parse_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::ParseFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
            usage: TokenUsage::default(),
        })
    }

    /// 创建状态字段缺失错误
    pub fn missing_state_field(stage: impl Into<String>, field: impl Into<String>) -> Self {
        AppError::Business(BusinessError::MissingStateField {
            stage: stage.into(),
            field: field.into(),
        })
    }

    /// 是否为 schema 校验失败（单篇文献的致命错误）
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::SchemaViolation { .. }))
    }

    /// 出错前已经消耗的 token 用量
    pub fn spent_usage(&self) -> TokenUsage {
        match self {
            AppError::Llm(
                LlmError::ApiCallFailed { usage, .. }
                | LlmError::EmptyContent { usage, .. }
                | LlmError::SchemaViolation { usage, .. },
            ) => *usage,
            _ => TokenUsage::default(),
        }
    }

    /// 把此前的用量记到错误上；不携带用量的错误原样返回
    pub fn with_spent_usage(mut self, earlier: TokenUsage) -> Self {
        if let AppError::Llm(
            LlmError::ApiCallFailed { usage, .. }
            | LlmError::EmptyContent { usage, .. }
            | LlmError::SchemaViolation { usage, .. },
        ) = &mut self
        {
            *usage += earlier;
        }
        self
    }
}

/// 单篇文献筛选失败，附带失败前已消耗的用量
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ScreeningError {
    pub error: AppError,
    pub usage: TokenUsage,
}

impl ScreeningError {
    /// 累加此前阶段的用量
    pub fn after(mut self, earlier: TokenUsage) -> Self {
        self.usage += earlier;
        self
    }

    pub fn is_schema_violation(&self) -> bool {
        self.error.is_schema_violation()
    }
}

impl From<AppError> for ScreeningError {
    fn from(error: AppError) -> Self {
        let usage = error.spent_usage();
        Self { error, usage }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Cache(CacheError::Query(err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
