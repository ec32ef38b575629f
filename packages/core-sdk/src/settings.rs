use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::ops::RangeInclusive;

use crate::store::KeyValueStore;

pub const KEY_API_KEY: &str = "apiKey";
pub const KEY_MODEL: &str = "model";
pub const KEY_MAX_TOKENS: &str = "maxTokens";
pub const KEY_USE_EXTENSION_ICON: &str = "useExtensionIcon";

pub const ALL_KEYS: [&str; 4] = [
    KEY_API_KEY,
    KEY_MODEL,
    KEY_MAX_TOKENS,
    KEY_USE_EXTENSION_ICON,
];

pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/** \brief 设置面板滑块的取值范围。 */
pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 100..=4000;

/** \brief 设置面板下拉框提供的 Groq 模型，仅作提示，不做强制校验。 */
pub const KNOWN_MODELS: [&str; 4] = [
    "llama3-8b-8192",
    "llama3-70b-8192",
    "mixtral-8x7b-32768",
    "gemma-7b-it",
];

/**
 * \brief 全局唯一的持久化配置。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /** \brief Groq API Key（明文存储） */
    pub api_key: String,
    /** \brief 模型名 */
    pub model: String,
    /** \brief 单次回复的 token 上限 */
    pub max_tokens: u32,
    /** \brief 为 true 时隐藏页面触发器，改由扩展图标打开侧边栏 */
    pub use_extension_icon: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            use_extension_icon: false,
        }
    }
}

impl Settings {
    /**
     * \brief 从存储读取全部配置；缺失、为空或类型不符的键回落到默认值。
     */
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let raw = store.get(&ALL_KEYS)?;
        Ok(Self::from_items(&raw))
    }

    pub fn from_items(raw: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            api_key: raw
                .get(KEY_API_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(defaults.api_key),
            model: raw
                .get(KEY_MODEL)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.model),
            max_tokens: raw
                .get(KEY_MAX_TOKENS)
                .and_then(Value::as_u64)
                .filter(|n| *n > 0)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(defaults.max_tokens),
            use_extension_icon: raw
                .get(KEY_USE_EXTENSION_ICON)
                .and_then(Value::as_bool)
                .unwrap_or(defaults.use_extension_icon),
        }
    }

    /**
     * \brief 整体写入四个键，不做局部合并。
     */
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(self.to_items())
    }

    pub fn to_items(&self) -> Map<String, Value> {
        let mut items = Map::new();
        items.insert(KEY_API_KEY.to_string(), json!(self.api_key));
        items.insert(KEY_MODEL.to_string(), json!(self.model));
        items.insert(KEY_MAX_TOKENS.to_string(), json!(self.max_tokens));
        items.insert(
            KEY_USE_EXTENSION_ICON.to_string(),
            json!(self.use_extension_icon),
        );
        items
    }

    /** \brief 只读取图标模式开关，供页面触发器使用。 */
    pub fn load_use_extension_icon(store: &dyn KeyValueStore) -> Result<bool> {
        let raw = store.get(&[KEY_USE_EXTENSION_ICON])?;
        Ok(raw
            .get(KEY_USE_EXTENSION_ICON)
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

/**
 * \brief 安装/升级时写入默认值，只补齐缺失的键，返回本次写入的键名。
 */
pub fn seed_defaults(store: &dyn KeyValueStore) -> Result<Vec<String>> {
    let existing = store.get(&ALL_KEYS)?;
    let missing: Map<String, Value> = Settings::default()
        .to_items()
        .into_iter()
        .filter(|(k, _)| !existing.contains_key(k))
        .collect();
    let seeded = missing.keys().cloned().collect::<Vec<_>>();
    if !missing.is_empty() {
        store.set(missing)?;
    }
    Ok(seeded)
}

pub fn clamp_max_tokens(value: u32) -> u32 {
    value.clamp(*MAX_TOKENS_RANGE.start(), *MAX_TOKENS_RANGE.end())
}

/**
 * \brief API Key 格式提示，仅用于展示，不阻止保存。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Empty,
    TooShort,
    RecognizedFormat,
    UnrecognizedFormat,
}

pub const MIN_CREDENTIAL_LEN: usize = 10;
pub const GROQ_KEY_PREFIX: &str = "gsk_";

impl CredentialStatus {
    pub fn classify(credential: &str) -> Self {
        let key = credential.trim();
        if key.is_empty() {
            CredentialStatus::Empty
        } else if key.encode_utf16().count() < MIN_CREDENTIAL_LEN {
            CredentialStatus::TooShort
        } else if key.starts_with(GROQ_KEY_PREFIX) {
            CredentialStatus::RecognizedFormat
        } else {
            CredentialStatus::UnrecognizedFormat
        }
    }

    /** \brief 字段旁的提示文本，空字符串表示不显示。 */
    pub fn message(&self) -> &'static str {
        match self {
            CredentialStatus::Empty => "",
            CredentialStatus::TooShort => "API key seems too short",
            CredentialStatus::RecognizedFormat => "Valid Groq API key format",
            CredentialStatus::UnrecognizedFormat => "Please enter a valid Groq API key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_load_from_empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let s = Settings::load(&store).expect("load");
        assert_eq!(s, Settings::default());
        assert_eq!(s.model, "llama3-8b-8192");
        assert_eq!(s.max_tokens, 1000);
        assert!(!s.use_extension_icon);
    }

    #[test]
    fn test_save_then_load_round_trips_all_fields() {
        let store = MemoryStore::new();
        let s = Settings {
            api_key: "gsk_abc123xyz789".into(),
            model: "mixtral-8x7b-32768".into(),
            max_tokens: 1500,
            use_extension_icon: true,
        };
        s.save(&store).expect("save");
        assert_eq!(store.write_count(), 1);
        assert_eq!(Settings::load(&store).expect("load"), s);
    }

    #[test]
    fn test_falsy_values_fall_back_to_defaults() {
        let raw = json!({"model": "", "maxTokens": 0, "useExtensionIcon": "yes"});
        let s = Settings::from_items(raw.as_object().expect("object"));
        assert_eq!(s.model, DEFAULT_MODEL);
        assert_eq!(s.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(!s.use_extension_icon);
    }

    #[test]
    fn test_seed_defaults_fills_only_missing_keys() {
        let store = MemoryStore::new();
        store
            .set(json!({"apiKey": "gsk_existing_key"}).as_object().cloned().expect("obj"))
            .expect("set");
        let seeded = seed_defaults(&store).expect("seed");
        assert_eq!(seeded.len(), 3);
        assert!(!seeded.contains(&KEY_API_KEY.to_string()));
        let s = Settings::load(&store).expect("load");
        assert_eq!(s.api_key, "gsk_existing_key");

        let again = seed_defaults(&store).expect("seed again");
        assert!(again.is_empty());
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_clamp_max_tokens() {
        assert_eq!(clamp_max_tokens(5), 100);
        assert_eq!(clamp_max_tokens(1500), 1500);
        assert_eq!(clamp_max_tokens(99999), 4000);
    }

    #[test]
    fn test_credential_status_classification() {
        assert_eq!(CredentialStatus::classify("   "), CredentialStatus::Empty);
        assert_eq!(CredentialStatus::classify("gsk_1"), CredentialStatus::TooShort);
        assert_eq!(
            CredentialStatus::classify("gsk_abc123xyz789"),
            CredentialStatus::RecognizedFormat
        );
        assert_eq!(
            CredentialStatus::classify("sk-abcdefghijkl"),
            CredentialStatus::UnrecognizedFormat
        );
        // 非 BMP 字符占两个码元
        assert_eq!(CredentialStatus::classify("🔑🔑🔑🔑🔑"), CredentialStatus::UnrecognizedFormat);
        assert_eq!(CredentialStatus::classify("🔑🔑🔑🔑"), CredentialStatus::TooShort);
        assert_eq!(
            CredentialStatus::TooShort.message(),
            "API key seems too short"
        );
        assert_eq!(CredentialStatus::Empty.message(), "");
    }
}
