use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    routing::{get, get_service, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::host_proxy::HostProxy;
use crate::protocol::{HostMessage, MessageResponse};
use crate::settings::{CredentialStatus, Settings};
use crate::telemetry;

/**
 * \brief 启动本地桥接服务，让网页形态的侧边栏通过 HTTP 与后台通信。
 * \param addr 监听地址，如 "127.0.0.1:5173"
 * \param ui_root 静态页面目录，未命中 API 路由的请求由它兜底
 */
pub async fn run(addr: &str, proxy: Arc<HostProxy>, ui_root: &Path) -> Result<()> {
    let static_service =
        get_service(ServeDir::new(ui_root).append_index_html_on_directories(true));

    let app = router(proxy).fallback_service(static_service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    telemetry::log_event("server", &format!("listening addr={}", addr));
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(proxy: Arc<HostProxy>) -> Router {
    Router::new()
        .route("/api/message", post(post_message))
        .route("/api/settings", get(get_settings))
        .route("/api/health", get(health_check))
        .with_state(proxy)
}

/**
 * \brief 设置的只读视图，API Key 不回传明文。
 */
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct SettingsView {
    api_key_configured: bool,
    api_key_status: &'static str,
    model: String,
    max_tokens: u32,
    use_extension_icon: bool,
}

/**
 * \brief 转发一条运行时消息；应答恒为 200，失败体现在 `success:false`。
 */
async fn post_message(
    State(proxy): State<Arc<HostProxy>>,
    Json(message): Json<HostMessage>,
) -> Json<MessageResponse> {
    Json(proxy.handle(message).await)
}

async fn get_settings(
    State(proxy): State<Arc<HostProxy>>,
) -> Result<Json<SettingsView>, (axum::http::StatusCode, String)> {
    let store = proxy.store();
    let settings = Settings::load(store.as_ref()).map_err(internal_err)?;
    Ok(Json(SettingsView {
        api_key_configured: !settings.api_key.is_empty(),
        api_key_status: CredentialStatus::classify(&settings.api_key).message(),
        model: settings.model,
        max_tokens: settings.max_tokens,
        use_extension_icon: settings.use_extension_icon,
    }))
}

async fn health_check(State(proxy): State<Arc<HostProxy>>) -> Json<serde_json::Value> {
    let store = proxy.store();
    match Settings::load(store.as_ref()) {
        Ok(s) => Json(serde_json::json!({
            "ok": true,
            "configured": !s.api_key.is_empty(),
            "model": s.model
        })),
        Err(e) => Json(serde_json::json!({
            "ok": false,
            "error": e.to_string()
        })),
    }
}

fn internal_err<E: std::fmt::Display>(e: E) -> (axum::http::StatusCode, String) {
    telemetry::log_error("server", &e.to_string());
    (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::llm::GroqClient;
    use crate::platform::testing::{sample_tab, FakePlatform};
    use crate::store::MemoryStore;

    fn proxy(store: Arc<MemoryStore>, platform: Arc<FakePlatform>) -> Arc<HostProxy> {
        let config = HostConfig {
            api_url: "http://127.0.0.1:9/openai/v1/chat/completions".into(),
            ..HostConfig::default()
        };
        Arc::new(HostProxy::new(
            store,
            platform,
            GroqClient::new(&config).expect("client"),
        ))
    }

    #[tokio::test]
    async fn test_post_message_routes_to_proxy() {
        let platform = Arc::new(FakePlatform::with_tab(sample_tab()));
        let p = proxy(Arc::new(MemoryStore::new()), Arc::clone(&platform));
        let Json(resp) = post_message(State(p), Json(HostMessage::OpenSidebar)).await;
        assert_eq!(resp, MessageResponse::ok());
        assert_eq!(platform.opened(), vec![3]);
    }

    #[tokio::test]
    async fn test_settings_view_hides_key() {
        let store = Arc::new(MemoryStore::new());
        Settings {
            api_key: "gsk_abc123xyz789".into(),
            ..Settings::default()
        }
        .save(store.as_ref())
        .expect("save");
        let p = proxy(store, Arc::new(FakePlatform::default()));
        let Json(view) = get_settings(State(p)).await.expect("settings");
        assert!(view.api_key_configured);
        assert_eq!(view.api_key_status, "Valid Groq API key format");
        let v = serde_json::to_value(&view).expect("serialize");
        assert!(v.get("apiKey").is_none());
        assert_eq!(v["maxTokens"], 1000);
    }
}
