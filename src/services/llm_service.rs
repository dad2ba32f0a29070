//! LLM 服务 - 业务能力层
//!
//! 只负责"给定提示词，返回结构化判断"能力，不关心是哪一个阶段
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务）
//! - 单轮模式：直接要求 JSON 输出；两段式：先自由推理，再抽取 JSON

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use std::future::Future;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};
use crate::models::{
    ClassifierRequest, ClassifierResponse, DecisionResult, DecisionSchema, TokenUsage,
};

/// 分类能力
#[async_trait]
pub trait Classifier: Send + Sync {
    /// 按 schema 返回判断、原始响应、用量和推理过程
    async fn invoke(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse>;
}

/// LLM 服务
///
/// 职责：
/// - 调用 LLM API 完成一次结构化判断
/// - 校验输出是否符合 schema，不符合时重问
/// - 汇总本次判断内所有请求的 token 用量
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
    max_output_tokens: u32,
    two_step: bool,
    schema_retries: usize,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            max_output_tokens: config.llm_max_output_tokens,
            two_step: config.llm_two_step,
            schema_retries: config.llm_schema_retries,
        }
    }

    /// 发送一轮对话，返回回复文本和用量
    async fn chat(&self, messages: Vec<ChatCompletionRequestMessage>) -> AppResult<(String, TokenUsage)> {
        debug!("调用 LLM API，模型: {}，消息数: {}", self.model_name, messages.len());

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .max_completion_tokens(self.max_output_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| {
                TokenUsage::new(
                    u.total_tokens as u64,
                    u.prompt_tokens as u64,
                    u.completion_tokens as u64,
                )
            })
            .unwrap_or_default();

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
                usage,
            })?;

        debug!("LLM API 调用成功，{}", usage);

        Ok((content.trim().to_string(), usage))
    }

    fn system_message(&self, content: &str) -> AppResult<ChatCompletionRequestMessage> {
        let msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        Ok(ChatCompletionRequestMessage::System(msg))
    }

    fn user_message(&self, content: &str) -> AppResult<ChatCompletionRequestMessage> {
        let msg = ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        Ok(ChatCompletionRequestMessage::User(msg))
    }

    fn assistant_message(&self, content: &str) -> AppResult<ChatCompletionRequestMessage> {
        let msg = ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;
        Ok(ChatCompletionRequestMessage::Assistant(msg))
    }

    /// 单轮：提示词末尾附上 schema 说明
    async fn invoke_direct(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse> {
        let user_prompt = format!(
            "{}\n\n{}",
            request.instruction_prompt,
            request.schema.format_instructions()
        );
        let messages = vec![
            self.system_message(&request.system_prompt)?,
            self.user_message(&user_prompt)?,
        ];

        let attempt = ask_until_valid(&request.schema, self.schema_retries, || {
            self.chat(messages.clone())
        })
        .await?;

        Ok(ClassifierResponse {
            result: attempt.result,
            raw: attempt.raw,
            usage: attempt.usage,
            rationale: None,
        })
    }

    /// 两段式：第一轮只推理，第二轮基于推理抽取 JSON
    async fn invoke_two_step(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse> {
        let system = self.system_message(&request.system_prompt)?;
        let instruction = self.user_message(&request.instruction_prompt)?;

        let (reasoning, reasoning_usage) = self.chat(vec![system.clone(), instruction.clone()]).await?;

        let extraction_prompt = format!(
            "Based on your reasoning above, give the final answer.\n\n{}",
            request.schema.format_instructions()
        );
        let messages = vec![
            system,
            instruction,
            self.assistant_message(&reasoning)?,
            self.user_message(&extraction_prompt)?,
        ];

        let attempt = ask_until_valid(&request.schema, self.schema_retries, || {
            self.chat(messages.clone())
        })
        .await
        .map_err(|e| e.with_spent_usage(reasoning_usage))?;

        Ok(ClassifierResponse {
            result: attempt.result,
            raw: attempt.raw,
            usage: reasoning_usage + attempt.usage,
            rationale: Some(reasoning),
        })
    }
}

#[async_trait]
impl Classifier for LlmService {
    async fn invoke(&self, request: &ClassifierRequest) -> AppResult<ClassifierResponse> {
        if self.two_step {
            self.invoke_two_step(request).await
        } else {
            self.invoke_direct(request).await
        }
    }
}

/// 一次合格的结构化输出
struct ValidAttempt {
    result: DecisionResult,
    raw: String,
    usage: TokenUsage,
}

/// 反复请求直到输出符合 schema，最多 `max_attempts` 次
///
/// 返回的用量包含所有尝试；API 错误立即返回，schema 不符则重问。
/// 失败时已消耗的用量记在错误上。
async fn ask_until_valid<F, Fut>(
    schema: &DecisionSchema,
    max_attempts: usize,
    mut ask: F,
) -> AppResult<ValidAttempt>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<(String, TokenUsage)>>,
{
    let max_attempts = max_attempts.max(1);
    let mut usage = TokenUsage::default();
    let mut last_violation = None;

    for attempt in 1..=max_attempts {
        let (raw, delta) = ask().await.map_err(|e| e.with_spent_usage(usage))?;
        usage += delta;

        match schema.parse(&raw) {
            Ok(result) => return Ok(ValidAttempt { result, raw, usage }),
            Err(violation) => {
                warn!(
                    "LLM 输出不符合 schema {} (尝试 {}/{}): {}",
                    schema.name, attempt, max_attempts, violation
                );
                last_violation = Some(violation);
            }
        }
    }

    let error: AppError = last_violation
        .unwrap_or_else(|| LlmError::EmptyContent {
            model: schema.name.to_string(),
            usage: TokenUsage::default(),
        })
        .into();
    Err(error.with_spent_usage(usage))
}
