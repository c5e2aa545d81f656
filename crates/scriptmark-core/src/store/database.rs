//! SQLite storage for per-candidate mark blobs and session state.
//!
//! Each public method opens its own connection so callers never manage
//! connection lifetime.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::candidate::Candidate;
use crate::errors::{MarkingError, MarkingResult};
use crate::models::PageMarks;
use crate::store::schema;

pub const META_LAST_CANDIDATE: &str = "last_candidate";
pub const META_LAST_PAGE: &str = "last_page";
pub const META_LAST_OUTPUT_DIR: &str = "last_output_dir";

/// Serialize a candidate's pages to the stored blob text.
pub fn encode_pages(pages: &[PageMarks]) -> MarkingResult<String> {
    Ok(serde_json::to_string(pages)?)
}

/// Decode a stored blob, checking every mark's stroke-point invariant.
pub fn decode_pages(text: &str) -> MarkingResult<Vec<PageMarks>> {
    let pages: Vec<PageMarks> = serde_json::from_str(text)
        .map_err(|e| MarkingError::Storage(format!("undecodable marks: {e}")))?;
    for mark in pages.iter().flatten() {
        mark.validate()
            .map_err(|e| MarkingError::Storage(e.to_string()))?;
    }
    Ok(pages)
}

/// CRC32 of the blob text, as stored in the `checksum` column.
pub fn blob_checksum(text: &str) -> i64 {
    i64::from(crc32fast::hash(text.as_bytes()))
}

/// Durable store of candidate marks.
pub struct MarkStore {
    db_path: PathBuf,
}

impl MarkStore {
    /// Create a store handle. Parent directories are created if needed; the
    /// schema is not touched until [`MarkStore::init_schema`].
    pub fn new(db_path: impl Into<PathBuf>) -> MarkingResult<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { db_path })
    }

    /// Create a store handle and bring its schema up to date.
    pub fn open(db_path: impl Into<PathBuf>) -> MarkingResult<Self> {
        let store = Self::new(db_path)?;
        store.init_schema()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> MarkingResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Set WAL mode, create all tables and run pending migrations.
    pub fn init_schema(&self) -> MarkingResult<()> {
        let conn = self.connect()?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        for stmt in schema::SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        schema::migrate_schema(&conn)?;
        Ok(())
    }

    /// Create an unmarked candidate unless one with this name exists.
    /// Returns whether a row was inserted.
    pub fn register_candidate(&self, name: &str, page_count: usize) -> MarkingResult<bool> {
        let text = encode_pages(Candidate::unmarked(name, page_count).pages())?;
        let conn = self.connect()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO candidates(name, page_count, marks_json, checksum) \
             VALUES (?1, ?2, ?3, ?4);",
            params![name, page_count as i64, text, blob_checksum(&text)],
        )?;
        if inserted > 0 {
            info!(pages = page_count, "Registered candidate {name}");
        }
        Ok(inserted > 0)
    }

    /// Write a candidate's marks, replacing any stored copy.
    pub fn save_candidate(&self, candidate: &Candidate) -> MarkingResult<()> {
        let text = encode_pages(candidate.pages())?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO candidates(name, page_count, marks_json, checksum, updated_at) \
             VALUES (?1, ?2, ?3, ?4, CURRENT_TIMESTAMP) \
             ON CONFLICT(name) DO UPDATE SET \
                page_count = excluded.page_count, \
                marks_json = excluded.marks_json, \
                checksum = excluded.checksum, \
                updated_at = excluded.updated_at;",
            params![
                candidate.name(),
                candidate.page_count() as i64,
                text,
                blob_checksum(&text)
            ],
        )?;
        debug!("Saved marks for {}", candidate.name());
        Ok(())
    }

    /// Load a candidate's marks.
    ///
    /// Fails with [`MarkingError::Storage`] on a missing row, a checksum
    /// mismatch, undecodable JSON, a page-count mismatch or an invalid mark.
    /// A stored checksum of 0 predates checksumming and is not verified.
    pub fn load_candidate(&self, name: &str) -> MarkingResult<Candidate> {
        let conn = self.connect()?;
        let row: Option<(i64, String, i64)> = conn
            .query_row(
                "SELECT page_count, marks_json, checksum FROM candidates WHERE name = ?1;",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let (page_count, text, checksum) = row.ok_or_else(|| {
            MarkingError::Storage(format!("no stored marks for candidate {name}"))
        })?;

        if checksum != 0 && checksum != blob_checksum(&text) {
            return Err(MarkingError::Storage(format!(
                "checksum mismatch for candidate {name}"
            )));
        }
        let pages = decode_pages(&text)
            .map_err(|e| MarkingError::Storage(format!("candidate {name}: {e}")))?;
        if pages.len() as i64 != page_count {
            return Err(MarkingError::Storage(format!(
                "candidate {name} has {} stored pages, expected {page_count}",
                pages.len()
            )));
        }
        Ok(Candidate::new(name, pages))
    }

    /// Names of every stored candidate, sorted.
    pub fn candidate_names(&self) -> MarkingResult<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT name FROM candidates ORDER BY name;")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn get_meta(&self, key: &str) -> MarkingResult<Option<String>> {
        let conn = self.connect()?;
        let value = conn
            .query_row(
                "SELECT value FROM session_meta WHERE key = ?1;",
                params![key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(value.flatten())
    }

    pub fn set_meta(&self, key: &str, value: &str) -> MarkingResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO session_meta(key, value) VALUES(?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![key, value],
        )?;
        Ok(())
    }

    /// Copy the whole store to `destination` using the SQLite backup API.
    pub fn backup_to(&self, destination: &Path) -> MarkingResult<()> {
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let src_conn = self.connect()?;
        let mut dst_conn = Connection::open(destination)?;
        let backup = rusqlite::backup::Backup::new(&src_conn, &mut dst_conn)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
        info!("Backed up mark store to {}", destination.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Mark, StrokePoint};

    fn store() -> (tempfile::TempDir, MarkStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkStore::open(dir.path().join("internal").join("marks.sqlite3")).unwrap();
        (dir, store)
    }

    fn marked() -> Candidate {
        Candidate::new(
            "adams",
            vec![
                vec![
                    Mark::score(150, 200, 125, 100, 2),
                    Mark::tally(150, 400, 125, 100),
                    Mark::strike(),
                ],
                vec![Mark::touch(vec![
                    StrokePoint::new(10.5, 20.0),
                    StrokePoint::new(11.0, 22.25),
                ])
                .unwrap()],
            ],
        )
    }

    fn corrupt(store: &MarkStore, sql: &str) {
        Connection::open(store.db_path())
            .unwrap()
            .execute_batch(sql)
            .unwrap();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = store();
        let candidate = marked();
        store.save_candidate(&candidate).unwrap();
        let loaded = store.load_candidate("adams").unwrap();
        assert_eq!(loaded.pages(), candidate.pages());
        assert_eq!(loaded.name(), "adams");
    }

    #[test]
    fn test_register_only_once() {
        let (_dir, store) = store();
        assert!(store.register_candidate("adams", 2).unwrap());
        store.save_candidate(&marked()).unwrap();
        assert!(!store.register_candidate("adams", 2).unwrap());
        let loaded = store.load_candidate("adams").unwrap();
        assert_eq!(loaded.pages()[0].len(), 3);
        assert_eq!(store.candidate_names().unwrap(), vec!["adams".to_string()]);
    }

    #[test]
    fn test_registered_candidate_is_unmarked() {
        let (_dir, store) = store();
        store.register_candidate("brown", 3).unwrap();
        let loaded = store.load_candidate("brown").unwrap();
        assert_eq!(loaded.page_count(), 3);
        assert!(loaded.pages().iter().all(|p| p.is_empty()));
    }

    #[test]
    fn test_missing_candidate_is_storage_error() {
        let (_dir, store) = store();
        let err = store.load_candidate("nobody").unwrap_err();
        assert!(matches!(err, MarkingError::Storage(_)));
    }

    #[test]
    fn test_checksum_mismatch_is_storage_error() {
        let (_dir, store) = store();
        store.save_candidate(&marked()).unwrap();
        corrupt(
            &store,
            "UPDATE candidates SET marks_json = '[[],[]]' WHERE name = 'adams';",
        );
        let err = store.load_candidate("adams").unwrap_err();
        assert!(matches!(err, MarkingError::Storage(ref m) if m.contains("checksum")));
    }

    #[test]
    fn test_undecodable_blob_is_storage_error() {
        let (_dir, store) = store();
        store.save_candidate(&marked()).unwrap();
        corrupt(
            &store,
            "UPDATE candidates SET marks_json = '[[{\"kind\":', checksum = 0 WHERE name = 'adams';",
        );
        let err = store.load_candidate("adams").unwrap_err();
        assert!(matches!(err, MarkingError::Storage(_)));
    }

    #[test]
    fn test_page_count_mismatch_is_storage_error() {
        let (_dir, store) = store();
        store.save_candidate(&marked()).unwrap();
        corrupt(&store, "UPDATE candidates SET page_count = 5 WHERE name = 'adams';");
        let err = store.load_candidate("adams").unwrap_err();
        assert!(matches!(err, MarkingError::Storage(ref m) if m.contains("expected 5")));
    }

    #[test]
    fn test_invalid_mark_is_storage_error() {
        let (_dir, store) = store();
        let text = r#"[[{"kind":"touch","x":-1,"y":-1,"w":-1,"h":-1}]]"#;
        corrupt(
            &store,
            &format!(
                "INSERT INTO candidates(name, page_count, marks_json, checksum) \
                 VALUES('bad', 1, '{text}', 0);"
            ),
        );
        let err = store.load_candidate("bad").unwrap_err();
        assert!(matches!(err, MarkingError::Storage(_)));
    }

    #[test]
    fn test_meta_round_trip() {
        let (_dir, store) = store();
        assert_eq!(store.get_meta(META_LAST_CANDIDATE).unwrap(), None);
        store.set_meta(META_LAST_CANDIDATE, "adams").unwrap();
        store.set_meta(META_LAST_CANDIDATE, "brown").unwrap();
        assert_eq!(
            store.get_meta(META_LAST_CANDIDATE).unwrap().as_deref(),
            Some("brown")
        );
        assert_eq!(
            store.get_meta("schema_version").unwrap(),
            Some(schema::SCHEMA_VERSION.to_string())
        );
    }

    #[test]
    fn test_backup_copies_marks() {
        let (dir, store) = store();
        store.save_candidate(&marked()).unwrap();
        let dest = dir.path().join("backup").join("copy.sqlite3");
        store.backup_to(&dest).unwrap();
        let copy = MarkStore::new(&dest).unwrap();
        assert_eq!(copy.load_candidate("adams").unwrap().pages(), marked().pages());
    }
}
