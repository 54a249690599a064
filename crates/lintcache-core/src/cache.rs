//! Content-addressable result cache with two storage backends.
//!
//! Both backends store full [`CheckResult`]s keyed by the source
//! fingerprint and return them byte-for-byte. The SQLite backend keeps one
//! relational table and evicts oldest-first when a size limit is set; the
//! sharded-file backend writes one compact binary record per key and never
//! evicts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::{CacheBackend, Config};
use crate::error::{Error, Result};
use crate::result::CheckResult;

/// Storage contract shared by the backends: at most one entry per key.
///
/// The checker only saves after a confirmed miss, so a double `save` for
/// one key never happens in normal use; a racing writer from another
/// process cannot corrupt an entry either way (see each backend for which
/// writer wins).
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn load(&self, source_hash: &str) -> Result<Option<CheckResult>>;
    async fn save(&self, source_hash: &str, result: &CheckResult) -> Result<()>;
}

/// Open the backend selected by the configuration.
pub fn open_cache(config: &Config, cache_dir: &Path) -> Result<Box<dyn ResultCache>> {
    match config.cache_backend {
        CacheBackend::Sqlite => Ok(Box::new(SqliteResultCache::open(
            cache_dir,
            config.eviction_limit(),
        )?)),
        CacheBackend::Files => Ok(Box::new(ShardedFileCache::open(cache_dir)?)),
    }
}

/// SQLite-backed cache: one `cached_result` table, fingerprint as primary
/// key, creation timestamp per row.
///
/// `save` is first-write-wins (`INSERT OR IGNORE`). When a maximum entry
/// count is set, each save counts the table and deletes the oldest surplus
/// rows (`created_at` ascending, key as the deterministic tie-break) inside
/// the same transaction as the insert, so concurrent runs of the whole tool
/// never observe a half-applied eviction.
pub struct SqliteResultCache {
    conn: tokio::sync::Mutex<Connection>,
    max_entries: Option<i64>,
}

impl SqliteResultCache {
    pub fn open(cache_dir: &Path, max_entries: Option<i64>) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let conn = Connection::open(cache_dir.join("cache.db"))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cached_result (
                 source_hash TEXT PRIMARY KEY,
                 exit_code   INTEGER NOT NULL,
                 stdout      TEXT NOT NULL,
                 stderr      TEXT NOT NULL,
                 created_at  INTEGER NOT NULL
             )",
            [],
        )?;
        Ok(Self {
            conn: tokio::sync::Mutex::new(conn),
            max_entries,
        })
    }
}

#[async_trait]
impl ResultCache for SqliteResultCache {
    async fn load(&self, source_hash: &str) -> Result<Option<CheckResult>> {
        let conn = self.conn.lock().await;
        let result = conn
            .query_row(
                "SELECT exit_code, stdout, stderr FROM cached_result WHERE source_hash = ?1",
                params![source_hash],
                |row| {
                    Ok(CheckResult {
                        exit_code: row.get(0)?,
                        stdout: row.get(1)?,
                        stderr: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    async fn save(&self, source_hash: &str, result: &CheckResult) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO cached_result
                 (source_hash, exit_code, stdout, stderr, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source_hash,
                result.exit_code,
                result.stdout,
                result.stderr,
                now_millis()
            ],
        )?;

        if let Some(max) = self.max_entries {
            let count: i64 =
                tx.query_row("SELECT COUNT(*) FROM cached_result", [], |row| row.get(0))?;
            if count > max {
                tx.execute(
                    "DELETE FROM cached_result WHERE source_hash IN (
                         SELECT source_hash FROM cached_result
                         ORDER BY created_at ASC, source_hash ASC
                         LIMIT ?1
                     )",
                    params![count - max],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

/// Sharded-file cache: each key maps to
/// `<dir>/<last char>/<second-to-last char>/<trailing 18 chars>`, a two
/// level fan-out that keeps directories small. Entries are bincode records
/// of the three result fields. Unbounded; callers choosing this backend
/// prune externally or accept growth.
///
/// `save` writes to a temporary file and renames it into place, so a racing
/// writer for the same key leaves one intact record (last write wins).
pub struct ShardedFileCache {
    cache_dir: PathBuf,
}

impl ShardedFileCache {
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Cache file path for a key, derived from its trailing characters.
    fn entry_path(&self, source_hash: &str) -> PathBuf {
        let n = source_hash.len();
        let level1 = &source_hash[n.saturating_sub(1)..];
        let level2 = &source_hash[n.saturating_sub(2)..n.saturating_sub(1)];
        let name = &source_hash[n.saturating_sub(20)..n.saturating_sub(2)];
        self.cache_dir.join(level1).join(level2).join(name)
    }
}

#[async_trait]
impl ResultCache for ShardedFileCache {
    async fn load(&self, source_hash: &str) -> Result<Option<CheckResult>> {
        let path = self.entry_path(source_hash);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (result, _): (CheckResult, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(Some(result))
    }

    async fn save(&self, source_hash: &str, result: &CheckResult) -> Result<()> {
        let path = self.entry_path(source_hash);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = bincode::serde::encode_to_vec(result, bincode::config::standard())?;
        let tmp = path.with_extension(format!("tmp{}", std::process::id()));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(exit_code: i32) -> CheckResult {
        CheckResult {
            exit_code,
            stdout: "warning: something\nnote: detail\n".to_string(),
            stderr: "".to_string(),
        }
    }

    async fn round_trip(cache: &dyn ResultCache) {
        let result = CheckResult {
            exit_code: -9,
            stdout: "multi\nline\noutput".to_string(),
            stderr: "".to_string(),
        };
        cache.save("abc", &result).await.unwrap();
        assert_eq!(cache.load("abc").await.unwrap(), Some(result));
        assert_eq!(cache.load("never-saved").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sqlite_round_trip_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteResultCache::open(dir.path(), None).unwrap();
        round_trip(&cache).await;
    }

    #[tokio::test]
    async fn sharded_round_trip_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShardedFileCache::open(dir.path()).unwrap();
        round_trip(&cache).await;
    }

    #[tokio::test]
    async fn sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = SqliteResultCache::open(dir.path(), None).unwrap();
            cache.save("abc", &sample(12)).await.unwrap();
        }
        let cache = SqliteResultCache::open(dir.path(), None).unwrap();
        assert_eq!(cache.load("abc").await.unwrap(), Some(sample(12)));
    }

    #[tokio::test]
    async fn sharded_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ShardedFileCache::open(dir.path()).unwrap();
            cache.save("abc", &sample(12)).await.unwrap();
        }
        let cache = ShardedFileCache::open(dir.path()).unwrap();
        assert_eq!(cache.load("abc").await.unwrap(), Some(sample(12)));
    }

    #[tokio::test]
    async fn oldest_entries_are_evicted_first() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteResultCache::open(dir.path(), Some(2)).unwrap();

        cache.save("aaa", &sample(0)).await.unwrap();
        cache.save("bbb", &sample(1)).await.unwrap();
        cache.save("ccc", &sample(2)).await.unwrap();

        assert_eq!(cache.load("aaa").await.unwrap(), None);
        assert_eq!(cache.load("bbb").await.unwrap(), Some(sample(1)));
        assert_eq!(cache.load("ccc").await.unwrap(), Some(sample(2)));
    }

    #[tokio::test]
    async fn loads_do_not_refresh_eviction_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteResultCache::open(dir.path(), Some(2)).unwrap();

        cache.save("aaa", &sample(0)).await.unwrap();
        cache.save("bbb", &sample(1)).await.unwrap();
        // A read of the oldest entry must not protect it.
        cache.load("aaa").await.unwrap().unwrap();
        cache.save("ccc", &sample(2)).await.unwrap();

        assert_eq!(cache.load("aaa").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unbounded_sqlite_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteResultCache::open(dir.path(), None).unwrap();

        for i in 0..20 {
            cache.save(&format!("key{i:02}"), &sample(i)).await.unwrap();
        }
        for i in 0..20 {
            assert!(cache.load(&format!("key{i:02}")).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn sqlite_first_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SqliteResultCache::open(dir.path(), None).unwrap();

        cache.save("abc", &sample(0)).await.unwrap();
        cache.save("abc", &sample(1)).await.unwrap();
        assert_eq!(cache.load("abc").await.unwrap(), Some(sample(0)));
    }

    #[tokio::test]
    async fn sharded_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShardedFileCache::open(dir.path()).unwrap();

        cache.save("abc", &sample(0)).await.unwrap();
        cache.save("abc", &sample(1)).await.unwrap();
        assert_eq!(cache.load("abc").await.unwrap(), Some(sample(1)));
    }

    #[test]
    fn entry_paths_shard_on_trailing_characters() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShardedFileCache::open(dir.path()).unwrap();

        let path = cache.entry_path("abcdefghijklmnopqrstuvwxyz");
        let expected = dir
            .path()
            .join("z")
            .join("y")
            .join("ghijklmnopqrstuvwx");
        assert_eq!(path, expected);
    }

    #[test]
    fn short_keys_do_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShardedFileCache::open(dir.path()).unwrap();
        let path = cache.entry_path("abc");
        assert_eq!(path, dir.path().join("c").join("b").join("a"));
    }

    #[tokio::test]
    async fn empty_and_negative_fields_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteResultCache::open(dir.path().join("db").as_path(), None).unwrap();
        let sharded = ShardedFileCache::open(dir.path().join("files").as_path()).unwrap();

        let result = CheckResult {
            exit_code: -15,
            stdout: String::new(),
            stderr: "error: bad\n".to_string(),
        };
        for cache in [&sqlite as &dyn ResultCache, &sharded as &dyn ResultCache] {
            cache.save("k", &result).await.unwrap();
            assert_eq!(cache.load("k").await.unwrap(), Some(result.clone()));
        }
    }

    #[tokio::test]
    async fn open_cache_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();

        let first = open_cache(&config, dir.path()).unwrap();
        first.save("abc", &sample(7)).await.unwrap();
        let second = open_cache(&config, dir.path()).unwrap();
        assert_eq!(second.load("abc").await.unwrap(), Some(sample(7)));
    }
}
