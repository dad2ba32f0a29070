//! 文献缓存 - 基础设施层
//!
//! 以 PMID 为键的 SQLite 缓存，保存元数据和全文 HTML 两类记录。
//! 每次调用单独打开连接、用完即关，任何存储异常都当作未命中处理。

use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AppResult, CacheError};
use crate::models::PaperMetadata;

const DATABASE_FOLDER: &str = "database";
const DATABASE_FILE: &str = "pmid_paper.db";

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS pmid_paper (
    pmid TEXT PRIMARY KEY,
    html_content TEXT DEFAULT NULL,
    title TEXT DEFAULT NULL,
    abstract TEXT DEFAULT NULL,
    is_preprint INTEGER NOT NULL DEFAULT 0,
    datetime TEXT NOT NULL
)";

/// 文献缓存
///
/// 职责：
/// - 元数据 / 全文两类记录的 upsert 与按键读取
/// - 只写本次提供的字段，另一类记录保持不变
/// - 从不删除记录
pub struct PaperCache {
    db_dir: PathBuf,
}

impl PaperCache {
    /// `data_folder` 下的 `database/pmid_paper.db`
    pub fn new(data_folder: impl AsRef<Path>) -> Self {
        Self {
            db_dir: data_folder.as_ref().join(DATABASE_FOLDER),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_dir.join(DATABASE_FILE)
    }

    /// 读取元数据，未命中或出错时返回 `(None, None, false)`
    pub fn get_metadata(&self, pmid: &str) -> PaperMetadata {
        match self.try_get_metadata(pmid) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => PaperMetadata::default(),
            Err(e) => {
                warn!("读取缓存元数据失败 (PMID {}): {}", pmid, e);
                PaperMetadata::default()
            }
        }
    }

    /// 写入元数据，返回是否成功
    pub fn put_metadata(
        &self,
        pmid: &str,
        title: Option<&str>,
        abstract_text: Option<&str>,
        is_preprint: bool,
    ) -> bool {
        let result = self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO pmid_paper (pmid, title, abstract, is_preprint, datetime)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(pmid) DO UPDATE SET
                   title = excluded.title,
                   abstract = excluded.abstract,
                   is_preprint = excluded.is_preprint,
                   datetime = excluded.datetime",
                params![pmid, title, abstract_text, is_preprint, now()],
            )?;
            Ok(())
        });
        self.report_write("元数据", pmid, result)
    }

    /// 读取全文 HTML，未命中或出错时返回 `None`
    pub fn get_body(&self, pmid: &str) -> Option<String> {
        let result = self.with_connection(|conn| {
            let body: Option<Option<String>> = conn
                .query_row(
                    "SELECT html_content FROM pmid_paper WHERE pmid = ?1",
                    params![pmid],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(body.flatten())
        });
        match result {
            Ok(body) => body,
            Err(e) => {
                warn!("读取缓存全文失败 (PMID {}): {}", pmid, e);
                None
            }
        }
    }

    /// 写入全文 HTML，返回是否成功
    pub fn put_body(&self, pmid: &str, html_content: &str) -> bool {
        let result = self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO pmid_paper (pmid, html_content, datetime)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(pmid) DO UPDATE SET
                   html_content = excluded.html_content,
                   datetime = excluded.datetime",
                params![pmid, html_content, now()],
            )?;
            Ok(())
        });
        self.report_write("全文", pmid, result)
    }

    fn try_get_metadata(&self, pmid: &str) -> AppResult<Option<PaperMetadata>> {
        self.with_connection(|conn| {
            let metadata = conn
                .query_row(
                    "SELECT title, abstract, is_preprint FROM pmid_paper WHERE pmid = ?1",
                    params![pmid],
                    |row| {
                        Ok(PaperMetadata {
                            title: row.get(0)?,
                            abstract_text: row.get(1)?,
                            is_preprint: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(metadata)
        })
    }

    /// 打开连接、建表、执行、关闭
    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.open()?;
        let result = f(&conn);
        if let Err((_, e)) = conn.close() {
            debug!("关闭缓存连接失败: {}", e);
        }
        result
    }

    fn open(&self) -> AppResult<Connection> {
        fs::create_dir_all(&self.db_dir).map_err(|source| CacheError::CreateDirFailed {
            path: self.db_dir.display().to_string(),
            source,
        })?;

        let path = self.db_path();
        let conn = Connection::open(&path).map_err(|source| CacheError::OpenFailed {
            path: path.display().to_string(),
            source,
        })?;
        conn.execute(CREATE_TABLE_SQL, [])?;
        Ok(conn)
    }

    fn report_write(&self, kind: &str, pmid: &str, result: AppResult<()>) -> bool {
        match result {
            Ok(()) => {
                debug!("已缓存{} (PMID {})", kind, pmid);
                true
            }
            Err(e) => {
                warn!("写入缓存{}失败 (PMID {}): {}", kind, pmid, e);
                false
            }
        }
    }
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, PaperCache) {
        let dir = TempDir::new().unwrap();
        let cache = PaperCache::new(dir.path());
        (dir, cache)
    }

    #[test]
    fn test_unwritten_id_returns_sentinel() {
        let (_dir, cache) = cache();
        assert_eq!(cache.get_metadata("404"), PaperMetadata::default());
        assert_eq!(cache.get_body("404"), None);
    }

    #[test]
    fn test_metadata_last_write_wins() {
        let (_dir, cache) = cache();

        assert!(cache.put_metadata("100", Some("T"), Some("A"), false));
        assert_eq!(cache.get_metadata("100"), PaperMetadata::new("T", "A", false));

        assert!(cache.put_metadata("100", Some("T2"), Some("A2"), true));
        assert_eq!(cache.get_metadata("100"), PaperMetadata::new("T2", "A2", true));
    }

    #[test]
    fn test_record_kinds_do_not_overwrite_each_other() {
        let (_dir, cache) = cache();

        assert!(cache.put_body("7", "<html>body</html>"));
        assert!(!cache.get_metadata("7").is_found());

        assert!(cache.put_metadata("7", Some("T"), Some("A"), false));
        assert_eq!(cache.get_body("7").as_deref(), Some("<html>body</html>"));

        assert!(cache.put_body("7", "<html>v2</html>"));
        assert_eq!(cache.get_metadata("7"), PaperMetadata::new("T", "A", false));
        assert_eq!(cache.get_body("7").as_deref(), Some("<html>v2</html>"));
    }

    #[test]
    fn test_unavailable_storage_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "file").unwrap();
        let cache = PaperCache::new(&blocker);

        assert!(!cache.put_metadata("1", Some("T"), Some("A"), false));
        assert!(!cache.put_body("1", "<html/>"));
        assert_eq!(cache.get_metadata("1"), PaperMetadata::default());
        assert_eq!(cache.get_body("1"), None);
    }
}
