use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::config::HostConfig;
use crate::error::SidebarError;
use crate::models::ChatTurn;
use crate::settings::Settings;

/** \brief 固定采样温度。 */
pub const TEMPERATURE: f64 = 0.7;

/**
 * \brief Groq Chat Completions 客户端（非流式）。
 */
#[derive(Debug, Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GroqClient {
    pub fn new(config: &HostConfig) -> Result<Self, SidebarError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            endpoint: config.api_url.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /**
     * \brief 发送完整历史并返回首个候选的文本。
     * \details 非 2xx 时优先取响应体中的 `error.message`，否则使用 HTTP 状态描述。
     */
    pub async fn chat_once(
        &self,
        settings: &Settings,
        messages: &[ChatTurn],
    ) -> Result<String, SidebarError> {
        if settings.api_key.is_empty() {
            return Err(SidebarError::missing_api_key());
        }

        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", settings.api_key))
            .json(&build_body(settings, messages))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| extract_error_message(&v))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .map(str::to_string)
                        .unwrap_or_else(|| status.as_u16().to_string())
                });
            return Err(SidebarError::Upstream(detail));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| SidebarError::Upstream(format!("malformed response body: {}", e)))?;
        extract_content(&v)
            .ok_or_else(|| SidebarError::Upstream("response contained no completion".to_string()))
    }
}

pub fn build_body(settings: &Settings, messages: &[ChatTurn]) -> Value {
    json!({
        "model": settings.model,
        "messages": messages,
        "max_tokens": settings.max_tokens,
        "temperature": TEMPERATURE,
        "stream": false
    })
}

fn extract_content(v: &Value) -> Option<String> {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.to_string())
}

fn extract_error_message(v: &Value) -> Option<String> {
    v.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(|s| s.to_string())
}
