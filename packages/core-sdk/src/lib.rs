pub mod config;
pub mod error;
pub mod host_proxy;
pub mod llm;
pub mod models;
pub mod page_trigger;
pub mod platform;
pub mod protocol;
pub mod server;
pub mod settings;
pub mod sidebar;
pub mod store;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用类型。
 */
pub mod prelude {
    pub use crate::config::HostConfig;
    pub use crate::error::SidebarError;
    pub use crate::host_proxy::{HostProxy, InstallReason};
    pub use crate::llm::GroqClient;
    pub use crate::models::{ChatTurn, Role, Tab};
    pub use crate::page_trigger::{KeyChord, OpenRoute, PageTrigger, TriggerState, TriggerSurface};
    pub use crate::platform::{HostPlatform, RuntimeChannel};
    pub use crate::protocol::{ContentMessage, HostMessage, MessageResponse};
    pub use crate::settings::{CredentialStatus, Settings};
    pub use crate::sidebar::SidebarController;
    pub use crate::store::{KeyValueStore, MemoryStore, SqliteStore};
    pub use crate::telemetry;
}
