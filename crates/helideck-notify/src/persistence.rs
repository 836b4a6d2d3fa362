//! Key/value persistence for the notification center.
//!
//! The center only needs `load(key)` / `save(key, bytes)`, so the backend can
//! be swapped without touching store logic: in-memory for tests, a JSON file
//! per key, or a SQLite table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use helideck_core::{HelideckError, NotificationConfig, Result, StorageBackend};

/// Durable byte storage keyed by string.
pub trait KeyValueStore: Send + Sync {
    /// `Ok(None)` when nothing was ever saved under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    /// Overwrite the whole value under `key`.
    fn save(&self, key: &str, value: &[u8]) -> Result<()>;
    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Open the backend selected in config.
pub fn open_store(config: &NotificationConfig) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.storage {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::File => Arc::new(FileStore::new(&config.data_path())?),
        StorageBackend::Sqlite => {
            let dir = config.data_path();
            std::fs::create_dir_all(&dir)?;
            Arc::new(SqliteStore::open(&dir.join("notifications.db"))?)
        }
    };
    tracing::info!("🗄️ Notification storage: {}", store.name());
    Ok(store)
}

// ─── Memory ───────────────────────────────────────────────

/// In-process store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `save` calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_vec());
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ─── File ─────────────────────────────────────────────────

/// One human-readable JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the store, making `dir` if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(&path)?))
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        // Write-then-rename: readers see the old or the new file, never half of one.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!("💾 Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ─── SQLite ───────────────────────────────────────────────

/// SQLite-backed key/value table.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| HelideckError::Storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| HelideckError::Storage(format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .map_err(|e| HelideckError::Storage(format!("Migration: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, rusqlite::Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let mut rows = stmt.query(rusqlite::params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get::<_, Vec<u8>>(0)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, Utc::now().to_rfc3339()],
            )
            .map_err(|e| HelideckError::Storage(format!("Save {key}: {e}")))?;
        tracing::debug!("💾 Saved {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
