use serde::{Deserialize, Serialize};

use crate::error::SidebarError;
use crate::models::ChatTurn;

/**
 * \brief 发往后台（Host Proxy）的消息，按 `type` 字段区分。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    /** \brief 侧边栏发起的聊天请求。 */
    GroqApiRequest { data: ChatPayload },
    /** \brief 页面触发器请求打开侧边栏。 */
    OpenSidebar,
    /** \brief `OPEN_SIDEBAR` 失败时的备用打开请求。 */
    TriggerActionClick,
}

/**
 * \brief 发往页面触发器（内容脚本）的消息。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentMessage {
    ToggleTrigger,
    UpdateExtensionIconSetting {
        #[serde(rename = "useExtensionIcon")]
        use_extension_icon: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub messages: Vec<ChatTurn>,
}

/**
 * \brief 所有消息的统一应答：`{success, data?, error?}`。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /**
     * \brief 将处理结果收敛为边界应答，错误只以文本形式出现。
     */
    pub fn from_result(result: Result<String, SidebarError>) -> Self {
        match result {
            Ok(data) => Self::with_data(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }

    /** \brief 供调用方解包：成功时返回可选数据，失败时返回错误文本。 */
    pub fn into_result(self) -> Result<Option<String>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_request_wire_shape() {
        let msg = HostMessage::GroqApiRequest {
            data: ChatPayload {
                messages: vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")],
            },
        };
        let v = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            v,
            json!({
                "type": "GROQ_API_REQUEST",
                "data": {"messages": [
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "hello"}
                ]}
            })
        );
    }

    #[test]
    fn test_unit_messages_parse_from_tag_only() {
        let open: HostMessage =
            serde_json::from_value(json!({"type": "OPEN_SIDEBAR"})).expect("parse open");
        assert_eq!(open, HostMessage::OpenSidebar);
        let fallback: HostMessage =
            serde_json::from_value(json!({"type": "TRIGGER_ACTION_CLICK"})).expect("parse");
        assert_eq!(fallback, HostMessage::TriggerActionClick);
    }

    #[test]
    fn test_icon_setting_message_uses_camel_case_field() {
        let msg: ContentMessage = serde_json::from_value(json!({
            "type": "UPDATE_EXTENSION_ICON_SETTING",
            "useExtensionIcon": true
        }))
        .expect("parse");
        assert_eq!(
            msg,
            ContentMessage::UpdateExtensionIconSetting {
                use_extension_icon: true
            }
        );
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let parsed = serde_json::from_value::<HostMessage>(json!({"type": "DELETE_EVERYTHING"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_response_omits_absent_fields() {
        let v = serde_json::to_value(MessageResponse::ok()).expect("serialize");
        assert_eq!(v, json!({"success": true}));
        let v = serde_json::to_value(MessageResponse::failure("boom")).expect("serialize");
        assert_eq!(v, json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn test_from_result_renders_error_text() {
        let resp = MessageResponse::from_result(Err(SidebarError::Upstream("Unauthorized".into())));
        assert_eq!(resp.into_result(), Err("API Error: Unauthorized".to_string()));
    }
}
