use thiserror::Error;

/** \brief 未配置 API Key 时返回给调用方的固定提示。 */
pub const MISSING_API_KEY_MESSAGE: &str =
    "API key not configured. Please set your Groq API key in the extension settings.";

/**
 * \brief 跨上下文统一错误分类。
 * \details 所有变体在消息边界处都会被转换为 `{success:false, error}`，不会越界抛出。
 */
#[derive(Debug, Error)]
pub enum SidebarError {
    /** \brief 缺少凭据等可由用户修复的配置问题。 */
    #[error("{0}")]
    Configuration(String),

    /** \brief 上游返回非 2xx 或响应体结构异常。 */
    #[error("API Error: {0}")]
    Upstream(String),

    /** \brief 消息通道不可达，例如目标标签页没有内容脚本。 */
    #[error("{0}")]
    Transport(String),

    /** \brief 表单校验失败。 */
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SidebarError {
    pub fn missing_api_key() -> Self {
        SidebarError::Configuration(MISSING_API_KEY_MESSAGE.to_string())
    }

    /** \brief 尽力而为的通知只吞掉通道错误。 */
    pub fn is_transport(&self) -> bool {
        matches!(self, SidebarError::Transport(_))
    }
}
