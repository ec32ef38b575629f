use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SidebarError;
use crate::llm::GroqClient;
use crate::models::{ChatTurn, Tab};
use crate::platform::{HostPlatform, RuntimeChannel};
use crate::protocol::{ContentMessage, HostMessage, MessageResponse};
use crate::settings::{self, Settings};
use crate::store::KeyValueStore;
use crate::telemetry;

/**
 * \brief 安装事件的触发原因。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    BrowserUpdate,
}

/**
 * \brief 后台上下文：持有出站请求与设置存储，响应其他上下文的消息和平台生命周期事件。
 */
pub struct HostProxy {
    store: Arc<dyn KeyValueStore>,
    platform: Arc<dyn HostPlatform>,
    client: GroqClient,
}

impl HostProxy {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        platform: Arc<dyn HostPlatform>,
        client: GroqClient,
    ) -> Self {
        Self {
            store,
            platform,
            client,
        }
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.store)
    }

    /**
     * \brief 消息入口，任何失败都转换为 `{success:false, error}`。
     */
    pub async fn handle(&self, message: HostMessage) -> MessageResponse {
        match message {
            HostMessage::GroqApiRequest { data } => {
                MessageResponse::from_result(self.chat(&data.messages).await)
            }
            HostMessage::OpenSidebar | HostMessage::TriggerActionClick => {
                if let Err(e) = self.open_panel_for_active_tab().await {
                    telemetry::log_error("host.panel", &format!("open failed: {}", e));
                }
                MessageResponse::ok()
            }
        }
    }

    /**
     * \brief 读取最新设置并代理一次聊天请求；未配置 API Key 时不发起网络调用。
     */
    pub async fn chat(&self, messages: &[ChatTurn]) -> Result<String, SidebarError> {
        let settings = Settings::load(self.store.as_ref())?;
        if settings.api_key.is_empty() {
            telemetry::log_error("host.chat", "rejected: api key not configured");
            return Err(SidebarError::missing_api_key());
        }
        telemetry::log_event(
            "host.chat",
            &format!(
                "endpoint={} model={} max_tokens={} msgs={} key={}",
                self.client.endpoint(),
                settings.model,
                settings.max_tokens,
                messages.len(),
                telemetry::mask_secret(&settings.api_key)
            ),
        );
        match self.client.chat_once(&settings, messages).await {
            Ok(reply) => {
                telemetry::log_event("host.chat", &format!("reply_len={}", reply.len()));
                Ok(reply)
            }
            Err(e) => {
                telemetry::log_error("host.chat", &format!("request failed: {}", e));
                Err(e)
            }
        }
    }

    /**
     * \brief 安装或升级时补齐默认设置，已有值保持不变。
     */
    pub fn on_installed(&self, reason: InstallReason) -> Result<Vec<String>, SidebarError> {
        let seeded = settings::seed_defaults(self.store.as_ref())?;
        telemetry::log_event(
            "host.install",
            &format!("reason={:?} seeded={:?}", reason, seeded),
        );
        Ok(seeded)
    }

    /**
     * \brief 为活动标签页所在窗口打开侧边栏；没有活动标签页时什么也不做。
     * \return 是否真正打开了侧边栏。
     */
    pub async fn open_panel_for_active_tab(&self) -> Result<bool, SidebarError> {
        match self.platform.active_tab().await? {
            Some(tab) => {
                self.platform.open_side_panel(tab.window_id).await?;
                telemetry::log_event("host.panel", &format!("opened window={}", tab.window_id));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /**
     * \brief 扩展图标点击：仅在图标模式开启时打开侧边栏。
     */
    pub async fn on_action_clicked(&self, tab: &Tab) -> Result<bool, SidebarError> {
        if !Settings::load_use_extension_icon(self.store.as_ref())? {
            return Ok(false);
        }
        self.platform.open_side_panel(tab.window_id).await?;
        telemetry::log_event(
            "host.panel",
            &format!("opened from icon window={}", tab.window_id),
        );
        Ok(true)
    }

    /**
     * \brief 切换活动标签页中触发器的可见性，页面没有内容脚本时忽略。
     */
    pub async fn toggle_trigger_in_active_tab(&self) -> Result<bool, SidebarError> {
        let Some(tab) = self.platform.active_tab().await? else {
            return Ok(false);
        };
        match self
            .platform
            .send_to_tab(tab.id, ContentMessage::ToggleTrigger)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_transport() => {
                telemetry::log_event("host.panel", &format!("toggle skipped: {}", e));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/**
 * \brief 同进程内直接路由到后台，通道本身永不失败。
 */
#[async_trait]
impl RuntimeChannel for HostProxy {
    async fn send(&self, message: HostMessage) -> Result<MessageResponse, SidebarError> {
        Ok(self.handle(message).await)
    }
}
