use std::{path::PathBuf, time::Duration};

/** \brief Groq Chat Completions 固定地址。 */
pub const GROQ_CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_DB_PATH: &str = "sidebar.db";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_UI_DIR: &str = "web";

/**
 * \brief 后台运行配置，均可通过环境变量覆盖。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /** \brief 聊天接口地址（SIDEBAR_API_URL） */
    pub api_url: String,
    /** \brief 键值存储文件（SIDEBAR_DB_PATH） */
    pub db_path: PathBuf,
    /** \brief 出站请求超时，None 表示不限（SIDEBAR_REQUEST_TIMEOUT_SECS=0） */
    pub request_timeout: Option<Duration>,
    /** \brief 是否写入遥测日志（SIDEBAR_TELEMETRY） */
    pub telemetry_enabled: bool,
    /** \brief 桥接服务的静态页面目录（SIDEBAR_UI_DIR） */
    pub ui_dir: PathBuf,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            api_url: GROQ_CHAT_COMPLETIONS_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            telemetry_enabled: false,
            ui_dir: PathBuf::from(DEFAULT_UI_DIR),
        }
    }
}

impl HostConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /**
     * \brief 以任意查找函数构造配置，无法解析的值回落到默认值。
     */
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let api_url = lookup("SIDEBAR_API_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.api_url);
        let db_path = lookup("SIDEBAR_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let request_timeout = match lookup("SIDEBAR_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.request_timeout,
        };
        let telemetry_enabled = lookup("SIDEBAR_TELEMETRY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.telemetry_enabled);
        let ui_dir = lookup("SIDEBAR_UI_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.ui_dir);
        Self {
            api_url,
            db_path,
            request_timeout,
            telemetry_enabled,
            ui_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = HostConfig::from_lookup(|_| None);
        assert_eq!(cfg, HostConfig::default());
        assert_eq!(cfg.api_url, GROQ_CHAT_COMPLETIONS_URL);
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(60)));
        assert_eq!(cfg.ui_dir, PathBuf::from("web"));
    }

    #[test]
    fn test_overrides_and_zero_timeout_disables() {
        let cfg = HostConfig::from_lookup(lookup_from(&[
            ("SIDEBAR_API_URL", "http://127.0.0.1:9000/v1/chat/completions"),
            ("SIDEBAR_DB_PATH", "/tmp/x.db"),
            ("SIDEBAR_REQUEST_TIMEOUT_SECS", "0"),
            ("SIDEBAR_TELEMETRY", "TRUE"),
            ("SIDEBAR_UI_DIR", "dist/sidebar"),
        ]));
        assert_eq!(cfg.api_url, "http://127.0.0.1:9000/v1/chat/completions");
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.request_timeout, None);
        assert!(cfg.telemetry_enabled);
        assert_eq!(cfg.ui_dir, PathBuf::from("dist/sidebar"));
    }

    #[test]
    fn test_unparsable_timeout_keeps_default() {
        let cfg = HostConfig::from_lookup(lookup_from(&[("SIDEBAR_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(60)));
    }
}
