//! 分类器的请求、响应与结构化输出 schema

use serde_json::{json, Value as JsonValue};

use crate::error::LlmError;
use crate::models::usage::TokenUsage;

/// 结构化输出 schema：`{rationale: string, <decision_field>: bool}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionSchema {
    pub name: &'static str,
    pub decision_field: &'static str,
    pub description: &'static str,
}

/// 分类器给出的判断
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionResult {
    pub rationale: Option<String>,
    pub decision: bool,
}

impl DecisionSchema {
    /// JSON Schema 形式，写进提示词
    pub fn to_json_schema(&self) -> JsonValue {
        json!({
            "title": self.name,
            "type": "object",
            "properties": {
                "rationale": {
                    "type": "string",
                    "description": "The reasoning process behind the decision."
                },
                (self.decision_field): {
                    "type": "boolean",
                    "description": self.description
                }
            },
            "required": ["rationale", self.decision_field]
        })
    }

    /// 要求模型按 schema 输出的说明
    pub fn format_instructions(&self) -> String {
        let schema = serde_json::to_string_pretty(&self.to_json_schema()).unwrap_or_default();
        format!(
            "Respond with a single JSON object that conforms to this JSON schema, and nothing else:\n```json\n{}\n```",
            schema
        )
    }

    /// 校验并解析模型输出
    ///
    /// 允许输出被 markdown 代码块包裹或前后有多余文字，但判断字段必须是布尔值。
    pub fn parse(&self, raw: &str) -> Result<DecisionResult, LlmError> {
        let violation = |reason: &str| LlmError::SchemaViolation {
            schema: self.name.to_string(),
            reason: reason.to_string(),
            response: raw.to_string(),
            usage: TokenUsage::default(),
        };

        let object = extract_json_object(raw).ok_or_else(|| violation("未找到 JSON 对象"))?;
        let value: JsonValue =
            serde_json::from_str(object).map_err(|e| violation(&format!("JSON 解析失败: {}", e)))?;

        let decision = match value.get(self.decision_field) {
            Some(JsonValue::Bool(b)) => *b,
            Some(_) => return Err(violation(&format!("字段 {} 不是布尔值", self.decision_field))),
            None => return Err(violation(&format!("缺少字段 {}", self.decision_field))),
        };

        let rationale = match value.get("rationale") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.trim().to_string()),
            Some(_) => return Err(violation("字段 rationale 不是字符串")),
        };

        Ok(DecisionResult {
            rationale,
            decision,
        })
    }
}

/// 截取第一个 `{` 到最后一个 `}` 之间的内容
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// 一次分类请求
#[derive(Debug, Clone)]
pub struct ClassifierRequest {
    pub system_prompt: String,
    pub instruction_prompt: String,
    pub schema: DecisionSchema,
}

/// 分类结果：解析后的判断、原始响应、用量、推理过程
#[derive(Debug, Clone)]
pub struct ClassifierResponse {
    pub result: DecisionResult,
    pub raw: String,
    pub usage: TokenUsage,
    /// 两段式调用时为第一轮的推理文本
    pub rationale: Option<String>,
}

impl ClassifierResponse {
    /// 上报用的推理过程：优先使用单独的推理文本
    pub fn reasoning(&self) -> Option<&str> {
        self.rationale
            .as_deref()
            .or(self.result.rationale.as_deref())
    }
}
