use async_trait::async_trait;

use crate::error::SidebarError;
use crate::models::Tab;
use crate::protocol::{ContentMessage, HostMessage, MessageResponse};

/**
 * \brief 扩展平台提供的标签页与侧边栏能力。
 */
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /** \brief 当前窗口的活动标签页，没有时返回 None。 */
    async fn active_tab(&self) -> Result<Option<Tab>, SidebarError>;

    /** \brief 为指定窗口打开侧边栏。 */
    async fn open_side_panel(&self, window_id: i64) -> Result<(), SidebarError>;

    /**
     * \brief 向标签页中的内容脚本发送消息。
     * \details 标签页没有内容脚本时返回 `SidebarError::Transport`。
     */
    async fn send_to_tab(
        &self,
        tab_id: i64,
        message: ContentMessage,
    ) -> Result<MessageResponse, SidebarError>;
}

/**
 * \brief 发往后台的运行时消息通道（runtime.sendMessage）。
 */
#[async_trait]
pub trait RuntimeChannel: Send + Sync {
    async fn send(&self, message: HostMessage) -> Result<MessageResponse, SidebarError>;
}

/** \brief 平台找不到接收方时的报错文本。 */
pub const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";
