use std::sync::Arc;

use crate::error::SidebarError;
use crate::models::{ChatTurn, Role};
use crate::platform::{HostPlatform, RuntimeChannel};
use crate::protocol::{ChatPayload, ContentMessage, HostMessage, MessageResponse};
use crate::settings::{clamp_max_tokens, CredentialStatus, Settings};
use crate::store::KeyValueStore;
use crate::telemetry;

pub const MAX_INPUT_CHARS: usize = 2000;
const WARNING_CHARS: usize = 1500;
const DANGER_CHARS: usize = 1800;

pub const CLEAR_CONFIRMATION: &str = "Are you sure you want to clear the chat history?";
pub const ERROR_PREFIX: &str = "Error: ";

/**
 * \brief 欢迎页的快捷提示：按钮文字与填入输入框的内容。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickPrompt {
    pub label: &'static str,
    pub prompt: &'static str,
}

pub const QUICK_PROMPTS: [QuickPrompt; 4] = [
    QuickPrompt {
        label: "Write Email",
        prompt: "Help me write a professional email",
    },
    QuickPrompt {
        label: "Explain",
        prompt: "Explain this concept in simple terms",
    },
    QuickPrompt {
        label: "Brainstorm",
        prompt: "Generate ideas for",
    },
    QuickPrompt {
        label: "Summarize",
        prompt: "Summarize the key points",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharCountLevel {
    Normal,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Info,
}

/**
 * \brief 短暂提示，由界面层取出后展示。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/**
 * \brief 侧边栏：持有对话历史、输入框与设置表单。
 */
pub struct SidebarController {
    channel: Arc<dyn RuntimeChannel>,
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn HostPlatform>,
    turns: Vec<ChatTurn>,
    input: String,
    loading: bool,
    form: Settings,
    baseline: Settings,
    settings_open: bool,
    saving: bool,
    notifications: Vec<Notification>,
}

impl SidebarController {
    pub fn new(
        channel: Arc<dyn RuntimeChannel>,
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn HostPlatform>,
    ) -> Self {
        Self {
            channel,
            store,
            platform,
            turns: Vec::new(),
            input: String::new(),
            loading: false,
            form: Settings::default(),
            baseline: Settings::default(),
            settings_open: false,
            saving: false,
            notifications: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /** \brief 对话为空时显示欢迎页与快捷提示。 */
    pub fn is_welcome(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn quick_prompts(&self) -> &'static [QuickPrompt] {
        if self.is_welcome() {
            &QUICK_PROMPTS
        } else {
            &[]
        }
    }

    pub fn apply_quick_prompt(&mut self, index: usize) -> bool {
        match QUICK_PROMPTS.get(index) {
            Some(p) => {
                self.input = p.prompt.to_string();
                true
            }
            None => false,
        }
    }

    /** \brief 按 UTF-16 码元计数，与页面输入框的长度一致。 */
    pub fn char_count(&self) -> (usize, CharCountLevel) {
        let count = self.input.encode_utf16().count();
        let level = if count > DANGER_CHARS {
            CharCountLevel::Danger
        } else if count > WARNING_CHARS {
            CharCountLevel::Warning
        } else {
            CharCountLevel::Normal
        };
        (count, level)
    }

    pub fn char_count_label(&self) -> String {
        format!("{}/{}", self.char_count().0, MAX_INPUT_CHARS)
    }

    pub fn send_enabled(&self) -> bool {
        !self.loading && !self.input.trim().is_empty()
    }

    /**
     * \brief 发送的前半段：记录用户消息、清空输入、进入加载状态，并构造请求。
     * \return 输入为空或已有请求在途时返回 None。
     */
    pub fn begin_send(&mut self) -> Option<HostMessage> {
        let text = self.input.trim().to_string();
        if text.is_empty() || self.loading {
            return None;
        }
        self.turns.push(ChatTurn::user(text));
        self.input.clear();
        self.loading = true;
        Some(HostMessage::GroqApiRequest {
            data: ChatPayload {
                messages: self.turns.clone(),
            },
        })
    }

    /**
     * \brief 发送的后半段：无论成功与否都退出加载状态，并追加一条助手消息。
     */
    pub fn finish_send(&mut self, outcome: Result<MessageResponse, SidebarError>) {
        self.loading = false;
        let reply = match outcome.map(MessageResponse::into_result) {
            Ok(Ok(data)) => data.unwrap_or_default(),
            Ok(Err(error)) => format!("{}{}", ERROR_PREFIX, error),
            Err(e) => format!("{}{}", ERROR_PREFIX, e),
        };
        if reply.starts_with(ERROR_PREFIX) {
            telemetry::log_error("sidebar.chat", &reply);
        }
        self.turns.push(ChatTurn::assistant(reply));
    }

    /**
     * \brief 完整发送流程；返回是否真正发出了请求。
     */
    pub async fn send(&mut self) -> bool {
        let Some(request) = self.begin_send() else {
            return false;
        };
        telemetry::log_event(
            "sidebar.chat",
            &format!("send turns={}", self.turns.len()),
        );
        let channel = Arc::clone(&self.channel);
        let outcome = channel.send(request).await;
        self.finish_send(outcome);
        true
    }

    /** \brief 最近一条助手回复。 */
    pub fn last_reply(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }

    /**
     * \brief 清空对话，需要用户确认；返回是否执行了清空。
     */
    pub fn clear<F>(&mut self, confirm: F) -> bool
    where
        F: FnOnce(&str) -> bool,
    {
        if !confirm(CLEAR_CONFIRMATION) {
            return false;
        }
        self.turns.clear();
        telemetry::log_event("sidebar.chat", "history cleared");
        true
    }

    pub fn is_settings_open(&self) -> bool {
        self.settings_open
    }

    pub fn open_settings(&mut self) -> Result<(), SidebarError> {
        self.settings_open = true;
        self.load_settings()
    }

    pub fn close_settings(&mut self) {
        self.settings_open = false;
    }

    /**
     * \brief 读取设置到表单，并记录为变更检测的基线。
     */
    pub fn load_settings(&mut self) -> Result<(), SidebarError> {
        match Settings::load(self.store.as_ref()) {
            Ok(settings) => {
                self.form = settings.clone();
                self.baseline = settings;
                self.saving = false;
                Ok(())
            }
            Err(e) => {
                telemetry::log_error("sidebar.settings", &format!("load failed: {}", e));
                Err(e.into())
            }
        }
    }

    pub fn form(&self) -> &Settings {
        &self.form
    }

    pub fn set_api_key(&mut self, value: impl Into<String>) {
        self.form.api_key = value.into();
    }

    pub fn set_model(&mut self, value: impl Into<String>) {
        self.form.model = value.into();
    }

    /** \brief 滑块取值，超出范围时截断。 */
    pub fn set_max_tokens(&mut self, value: u32) {
        self.form.max_tokens = clamp_max_tokens(value);
    }

    pub fn set_use_extension_icon(&mut self, value: bool) {
        self.form.use_extension_icon = value;
    }

    pub fn credential_status(&self) -> CredentialStatus {
        CredentialStatus::classify(&self.form.api_key)
    }

    pub fn has_settings_changed(&self) -> bool {
        self.form.api_key != self.baseline.api_key
            || self.form.model != self.baseline.model
            || self.form.max_tokens != self.baseline.max_tokens
            || self.form.use_extension_icon != self.baseline.use_extension_icon
    }

    pub fn save_enabled(&self) -> bool {
        !self.saving && !self.form.api_key.trim().is_empty() && self.has_settings_changed()
    }

    /**
     * \brief 保存设置：整体写入、更新基线、尽力通知当前页面，然后关闭设置面板。
     * \details API Key 为空时在写入前拒绝；失败时恢复保存按钮并提示错误。
     */
    pub async fn save_settings(&mut self) -> Result<(), SidebarError> {
        self.saving = true;
        match self.persist_form() {
            Ok(settings) => {
                self.saving = false;
                self.notify_active_tab(settings.use_extension_icon).await;
                self.settings_open = false;
                self.push_notification(NotificationKind::Success, "Settings saved successfully!");
                Ok(())
            }
            Err(e) => {
                self.saving = false;
                telemetry::log_error("sidebar.settings", &format!("save failed: {}", e));
                self.push_notification(
                    NotificationKind::Error,
                    format!("Error saving settings: {}", e),
                );
                Err(e)
            }
        }
    }

    fn persist_form(&mut self) -> Result<Settings, SidebarError> {
        if self.form.api_key.trim().is_empty() {
            return Err(SidebarError::Validation("API key is required".to_string()));
        }
        let settings = self.form.clone();
        settings.save(self.store.as_ref())?;
        telemetry::log_event(
            "sidebar.settings",
            &format!(
                "saved model={} max_tokens={} icon={} key={}",
                settings.model,
                settings.max_tokens,
                settings.use_extension_icon,
                telemetry::mask_secret(&settings.api_key)
            ),
        );
        self.baseline = settings.clone();
        Ok(settings)
    }

    /**
     * \brief 将图标模式推送给当前页面的触发器，任何失败都只记录不上抛。
     */
    async fn notify_active_tab(&self, use_extension_icon: bool) {
        let tab = match self.platform.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => return,
            Err(e) => {
                telemetry::log_event("sidebar.settings", &format!("no active tab: {}", e));
                return;
            }
        };
        let message = ContentMessage::UpdateExtensionIconSetting { use_extension_icon };
        if let Err(e) = self.platform.send_to_tab(tab.id, message).await {
            telemetry::log_event(
                "sidebar.settings",
                &format!("icon setting not delivered to tab {}: {}", tab.id, e),
            );
        }
    }

    fn push_notification(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.notifications.push(Notification {
            kind,
            message: message.into(),
        });
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}
