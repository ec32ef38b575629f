use anyhow::{Context, Result};
use rusqlite::{params, Connection, ErrorCode};
use serde_json::{Map, Value};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

/**
 * \brief 扁平键值存储，语义对齐扩展平台的 `storage.local`。
 * \details `get` 只返回存在的键；`set` 一次性写入整批键值。
 */
pub trait KeyValueStore: Send + Sync {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>>;
    fn set(&self, items: Map<String, Value>) -> Result<()>;
}

/**
 * \brief 基于 SQLite 的持久化实现（本地目录下的 sidebar.db）。
 */
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open store {}", path.as_ref().display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection poisoned"))
    }
}

/**
 * \brief 创建键值表。值以 JSON 文本保存，保留字符串/数字/布尔类型。
 */
fn migrate(conn: &Connection) -> Result<()> {
    retry_on_locked(|| {
        conn.execute_batch(
            r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
        )
    })?;
    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key=?1")?;
        let mut out = Map::new();
        for key in keys {
            let mut rows = stmt.query(params![key])?;
            if let Some(row) = rows.next()? {
                let raw: String = row.get(0)?;
                let value: Value = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt value for key {}", key))?;
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    fn set(&self, items: Map<String, Value>) -> Result<()> {
        let mut conn = self.lock()?;
        let encoded = items
            .into_iter()
            .map(|(k, v)| -> Result<(String, String)> { Ok((k, serde_json::to_string(&v)?)) })
            .collect::<Result<Vec<_>>>()?;
        retry_on_locked(|| {
            let tx = conn.transaction()?;
            for (key, value) in &encoded {
                tx.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
                    params![key, value],
                )?;
            }
            tx.commit()
        })?;
        Ok(())
    }
}

/**
 * \brief 内存实现，记录写入次数，便于断言“未发生写入”。
 */
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Map<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<Map<String, Value>> {
        let items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect())
    }

    fn set(&self, new_items: Map<String, Value>) -> Result<()> {
        let mut items = self
            .items
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        items.extend(new_items);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/**
 * \brief 针对 SQLite 锁冲突的重试助手。
 * \details 捕获 `database is locked` 等错误并线性退避，最多尝试 6 次。
 */
fn retry_on_locked<T, F>(mut action: F) -> Result<T>
where
    F: FnMut() -> rusqlite::Result<T>,
{
    const MAX_RETRIES: usize = 5;
    let mut attempt = 0;
    loop {
        match action() {
            Ok(value) => return Ok(value),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if matches!(
                    err.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) && attempt < MAX_RETRIES =>
            {
                attempt += 1;
                thread::sleep(Duration::from_millis(200 * attempt as u64));
            }
            Err(e) => return Err(e.into()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object literal")
    }

    #[test]
    fn test_sqlite_get_returns_only_present_keys() {
        let store = SqliteStore::open_in_memory().expect("open store");
        store
            .set(items(json!({"apiKey": "gsk_1", "maxTokens": 1500})))
            .expect("set");
        let got = store.get(&["apiKey", "maxTokens", "model"]).expect("get");
        assert_eq!(got.len(), 2);
        assert_eq!(got["apiKey"], json!("gsk_1"));
        assert_eq!(got["maxTokens"], json!(1500));
    }

    #[test]
    fn test_sqlite_set_overwrites_and_keeps_types() {
        let store = SqliteStore::open_in_memory().expect("open store");
        store
            .set(items(json!({"useExtensionIcon": false})))
            .expect("set 1");
        store
            .set(items(json!({"useExtensionIcon": true})))
            .expect("set 2");
        let got = store.get(&["useExtensionIcon"]).expect("get");
        assert_eq!(got["useExtensionIcon"], json!(true));
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = std::env::temp_dir().join(format!("sidebar-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("kv.db");
        {
            let store = SqliteStore::open(&path).expect("open");
            store.set(items(json!({"model": "gemma-7b-it"}))).expect("set");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        let got = store.get(&["model"]).expect("get");
        assert_eq!(got["model"], json!("gemma-7b-it"));
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_memory_store_counts_writes() {
        let store = MemoryStore::new();
        assert_eq!(store.write_count(), 0);
        store.set(items(json!({"a": 1, "b": 2}))).expect("set");
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get(&["a", "c"]).expect("get").len(), 1);
    }
}
