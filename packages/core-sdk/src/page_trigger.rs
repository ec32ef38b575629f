use std::sync::Arc;

use crate::platform::RuntimeChannel;
use crate::protocol::{ContentMessage, HostMessage, MessageResponse};
use crate::settings::Settings;
use crate::store::KeyValueStore;
use crate::telemetry;

/** \brief 浏览器内部页面前缀，这些页面上不显示触发器。 */
pub const HIDDEN_URL_PREFIXES: [&str; 6] = [
    "chrome://",
    "chrome-extension://",
    "moz-extension://",
    "edge://",
    "about:",
    "view-source:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Visible,
    Hidden,
}

/**
 * \brief 页面上承载触发器元素的宿主（DOM 抽象）。
 */
pub trait TriggerSurface {
    /** \brief 触发器元素是否仍在文档中。 */
    fn is_mounted(&self) -> bool;
    /** \brief 插入触发器元素并绑定事件。 */
    fn mount(&mut self);
    fn set_hidden(&mut self, hidden: bool);
}

/**
 * \brief 键盘组合键，Ctrl/Cmd + Shift + A 打开侧边栏。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub key: char,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyChord {
    pub fn is_open_shortcut(&self) -> bool {
        (self.ctrl || self.meta) && self.shift && self.key.eq_ignore_ascii_case(&'a')
    }
}

/** \brief 打开侧边栏请求最终走的路径。 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenRoute {
    Primary,
    Fallback,
    Unreachable,
}

pub fn is_privileged_url(url: &str) -> bool {
    HIDDEN_URL_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
}

/**
 * \brief 内容脚本：每个页面一个，只负责触发器的显隐与打开请求。
 */
pub struct PageTrigger<S: TriggerSurface> {
    url: String,
    state: TriggerState,
    surface: S,
    store: Arc<dyn KeyValueStore>,
    channel: Arc<dyn RuntimeChannel>,
}

impl<S: TriggerSurface> PageTrigger<S> {
    pub fn new(
        url: impl Into<String>,
        mut surface: S,
        store: Arc<dyn KeyValueStore>,
        channel: Arc<dyn RuntimeChannel>,
    ) -> Self {
        surface.mount();
        let mut trigger = Self {
            url: url.into(),
            state: TriggerState::Visible,
            surface,
            store,
            channel,
        };
        trigger.check_visibility();
        trigger
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state == TriggerState::Visible
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /**
     * \brief 初始显隐规则：图标模式开启则隐藏；否则按页面地址判断。
     * \details 读取设置失败时按图标模式关闭处理。
     */
    pub fn startup_state(&self) -> TriggerState {
        match Settings::load_use_extension_icon(self.store.as_ref()) {
            Ok(true) => return TriggerState::Hidden,
            Ok(false) => {}
            Err(e) => telemetry::log_error("trigger", &format!("settings read failed: {}", e)),
        }
        if is_privileged_url(&self.url) {
            TriggerState::Hidden
        } else {
            TriggerState::Visible
        }
    }

    pub fn check_visibility(&mut self) {
        let next = self.startup_state();
        self.set_state(next);
    }

    pub fn show(&mut self) {
        self.set_state(TriggerState::Visible);
    }

    pub fn hide(&mut self) {
        self.set_state(TriggerState::Hidden);
    }

    pub fn toggle(&mut self) {
        match self.state {
            TriggerState::Visible => self.hide(),
            TriggerState::Hidden => self.show(),
        }
    }

    fn set_state(&mut self, state: TriggerState) {
        self.state = state;
        self.surface.set_hidden(state == TriggerState::Hidden);
    }

    /**
     * \brief 处理来自后台或侧边栏的消息。
     */
    pub fn handle_message(&mut self, message: ContentMessage) -> MessageResponse {
        match message {
            ContentMessage::ToggleTrigger => self.toggle(),
            ContentMessage::UpdateExtensionIconSetting { use_extension_icon } => {
                if use_extension_icon {
                    self.hide();
                } else {
                    self.check_visibility();
                }
            }
        }
        MessageResponse::ok()
    }

    /**
     * \brief 页面结构变化后的收敛步骤：元素被移除时重新插入并恢复当前显隐。
     * \return 是否发生了重新插入。
     */
    pub fn reconcile(&mut self) -> bool {
        if self.surface.is_mounted() {
            return false;
        }
        self.surface.mount();
        self.surface.set_hidden(self.state == TriggerState::Hidden);
        telemetry::log_event("trigger", &format!("re-mounted on {}", self.url));
        true
    }

    /** \brief 点击触发器；隐藏状态下忽略。 */
    pub async fn on_click(&self) -> Option<OpenRoute> {
        if !self.is_visible() {
            return None;
        }
        Some(self.open_sidebar().await)
    }

    pub async fn on_key(&self, chord: KeyChord) -> Option<OpenRoute> {
        if !chord.is_open_shortcut() {
            return None;
        }
        Some(self.open_sidebar().await)
    }

    /**
     * \brief 请求后台打开侧边栏，通道失败时改发 `TRIGGER_ACTION_CLICK`。
     */
    pub async fn open_sidebar(&self) -> OpenRoute {
        match self.channel.send(HostMessage::OpenSidebar).await {
            Ok(_) => OpenRoute::Primary,
            Err(e) => {
                telemetry::log_error("trigger", &format!("open sidebar failed: {}", e));
                match self.channel.send(HostMessage::TriggerActionClick).await {
                    Ok(_) => OpenRoute::Fallback,
                    Err(e) => {
                        telemetry::log_error("trigger", &format!("fallback failed: {}", e));
                        OpenRoute::Unreachable
                    }
                }
            }
        }
    }
}
