use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::dedup::{DedupEntry, DedupStore};
use crate::error::StoreError;
use crate::models::{FilterReason, JobRecord, Status};
use crate::store::{JobStore, StatusChange};

/// SQLite backing for both the dedup cache and job records.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "potato") {
            proj_dirs.data_dir().join("potato.db")
        } else {
            PathBuf::from("potato.db")
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database connection lock poisoned".to_string()))
    }

    pub fn init(&self) -> Result<()> {
        self.lock()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS dedup (
                key TEXT PRIMARY KEY,
                state TEXT NOT NULL CHECK (state IN ('seen', 'filtered')),
                reason TEXT,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                key TEXT PRIMARY KEY,
                company TEXT NOT NULL,
                role TEXT NOT NULL,
                url TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'New',
                score INTEGER,
                dream_company INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS status_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_key TEXT NOT NULL REFERENCES jobs(key),
                from_status TEXT NOT NULL,
                to_status TEXT NOT NULL,
                cause TEXT NOT NULL,
                changed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_dedup_state ON dedup(state);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_history_job ON status_history(job_key);
            "#,
        )?;
        Ok(())
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        let tables: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('dedup', 'jobs')",
            [],
            |row| row.get(0),
        )?;
        if tables < 2 {
            return Err(anyhow!("Database not initialized. Run 'potato init' first."));
        }
        Ok(())
    }

    // --- Dedup operations ---

    pub fn dedup_entry(&self, key: &str) -> Result<Option<DedupEntry>, StoreError> {
        let entry = self
            .lock()?
            .query_row(
                "SELECT state, reason FROM dedup WHERE key = ?1",
                [key],
                Self::row_to_dedup,
            )
            .optional()?;
        Ok(entry)
    }

    fn row_to_dedup(row: &rusqlite::Row) -> rusqlite::Result<DedupEntry> {
        let state: String = row.get(0)?;
        if state != "filtered" {
            return Ok(DedupEntry::Seen);
        }
        let reason: String = row.get::<_, Option<String>>(1)?.unwrap_or_default();
        reason
            .parse::<FilterReason>()
            .map(DedupEntry::Filtered)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))
    }

    fn insert_dedup(&self, key: &str, state: &str, reason: Option<String>) -> Result<bool, StoreError> {
        let inserted = self.lock()?.execute(
            "INSERT INTO dedup (key, state, reason, recorded_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO NOTHING",
            params![key, state, reason, Utc::now()],
        )?;
        Ok(inserted == 1)
    }

    // --- Job operations ---

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let status: String = row.get(4)?;
        Ok(JobRecord {
            key: row.get(0)?,
            company: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            status: parse_status(4, &status)?,
            score: row.get(5)?,
            dream_company: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn row_to_change(row: &rusqlite::Row) -> rusqlite::Result<StatusChange> {
        let from: String = row.get(0)?;
        let to: String = row.get(1)?;
        Ok(StatusChange {
            from: parse_status(0, &from)?,
            to: parse_status(1, &to)?,
            cause: row.get(2)?,
            changed_at: row.get::<_, DateTime<Utc>>(3)?,
        })
    }
}

fn parse_status(idx: usize, text: &str) -> rusqlite::Result<Status> {
    text.parse::<Status>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

impl DedupStore for Database {
    fn has_seen(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.dedup_entry(key)? == Some(DedupEntry::Seen))
    }

    fn mark_seen(&self, key: &str) -> Result<bool, StoreError> {
        self.insert_dedup(key, "seen", None)
    }

    fn is_filtered(&self, key: &str) -> Result<bool, StoreError> {
        Ok(matches!(self.dedup_entry(key)?, Some(DedupEntry::Filtered(_))))
    }

    fn mark_filtered(&self, key: &str, reason: FilterReason) -> Result<bool, StoreError> {
        self.insert_dedup(key, "filtered", Some(format!("{:?}", reason)))
    }

    fn clear_filtered(&self) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM dedup WHERE state = 'filtered'", [])?;
        tx.commit()?;
        Ok(removed)
    }
}

impl JobStore for Database {
    fn get_job_record(&self, key: &str) -> Result<Option<JobRecord>, StoreError> {
        let record = self
            .lock()?
            .query_row(
                "SELECT key, company, role, url, status, score, dream_company, created_at, updated_at
                 FROM jobs WHERE key = ?1",
                [key],
                Self::row_to_job,
            )
            .optional()?;
        Ok(record)
    }

    fn put_job_record(&self, record: &JobRecord) -> Result<bool, StoreError> {
        let inserted = self.lock()?.execute(
            "INSERT INTO jobs (key, company, role, url, status, score, dream_company, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(key) DO NOTHING",
            params![
                record.key,
                record.company,
                record.title,
                record.url,
                record.status.to_string(),
                record.score,
                record.dream_company,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(inserted == 1)
    }

    fn update_status(
        &self,
        key: &str,
        from: Status,
        to: Status,
        cause: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now();

        let updated = tx.execute(
            "UPDATE jobs SET status = ?1, updated_at = ?2 WHERE key = ?3 AND status = ?4",
            params![to.to_string(), now, key, from.to_string()],
        )?;

        if updated == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM jobs WHERE key = ?1)",
                [key],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(key.to_string()));
            }
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO status_history (job_key, from_status, to_status, cause, changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![key, from.to_string(), to.to_string(), cause, now],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn list_jobs(&self, status: Option<Status>) -> Result<Vec<JobRecord>, StoreError> {
        let mut sql = String::from(
            "SELECT key, company, role, url, status, score, dream_company, created_at, updated_at
             FROM jobs",
        );
        if status.is_some() {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY created_at DESC, key");

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map([s.to_string()], Self::row_to_job)?
        } else {
            stmt.query_map([], Self::row_to_job)?
        };

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn status_history(&self, key: &str) -> Result<Vec<StatusChange>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT from_status, to_status, cause, changed_at
             FROM status_history WHERE job_key = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([key], Self::row_to_change)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    fn record(key: &str) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            key: key.to_string(),
            company: "Meta".to_string(),
            title: "Production Engineer Intern".to_string(),
            url: format!("{}?utm_source=x", key),
            status: Status::New,
            score: Some(64),
            dream_company: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ensure_initialized() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.ensure_initialized().is_err());
        db.init().unwrap();
        db.init().unwrap();
        assert!(db.ensure_initialized().is_ok());
    }

    #[test]
    fn test_dedup_round_trip() {
        let db = db();
        assert!(db.mark_seen("https://a.com/1").unwrap());
        assert!(!db.mark_seen("https://a.com/1").unwrap());
        assert!(db.has_seen("https://a.com/1").unwrap());

        assert!(db
            .mark_filtered("https://a.com/2", FilterReason::GraduationTimelineMismatch)
            .unwrap());
        assert!(db.is_filtered("https://a.com/2").unwrap());
        assert!(!db.has_seen("https://a.com/2").unwrap());
        assert_eq!(
            db.dedup_entry("https://a.com/2").unwrap(),
            Some(DedupEntry::Filtered(FilterReason::GraduationTimelineMismatch))
        );
    }

    #[test]
    fn test_clear_filtered_keeps_seen() {
        let db = db();
        db.mark_seen("seen").unwrap();
        db.mark_filtered("f1", FilterReason::SeasonYearMismatch).unwrap();
        db.mark_filtered("f2", FilterReason::ClassStandingMismatch).unwrap();

        assert_eq!(db.clear_filtered().unwrap(), 2);
        assert!(db.has_seen("seen").unwrap());
        assert_eq!(db.dedup_entry("f1").unwrap(), None);
        assert!(db.mark_filtered("f1", FilterReason::SeasonYearMismatch).unwrap());
    }

    #[test]
    fn test_job_records() {
        let db = db();
        let job = record("https://jobs.example.com/meta-pe");
        assert!(db.put_job_record(&job).unwrap());
        assert!(!db.put_job_record(&job).unwrap());

        let loaded = db.get_job_record(&job.key).unwrap().unwrap();
        assert_eq!(loaded.company, "Meta");
        assert_eq!(loaded.status, Status::New);
        assert_eq!(loaded.score, Some(64));
        assert!(db.get_job_record("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_status_compare_and_set() {
        let db = db();
        let job = record("k");
        db.put_job_record(&job).unwrap();

        assert!(db.update_status("k", Status::New, Status::OA, "OAInvite").unwrap());
        assert!(!db.update_status("k", Status::New, Status::Applied, "Confirmation").unwrap());
        assert_eq!(db.get_job_record("k").unwrap().unwrap().status, Status::OA);

        let history = db.status_history("k").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, Status::New);
        assert_eq!(history[0].to, Status::OA);

        let err = db.update_status("nope", Status::New, Status::OA, "OAInvite").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_jobs_by_status() {
        let db = db();
        db.put_job_record(&record("a")).unwrap();
        db.put_job_record(&record("b")).unwrap();
        db.update_status("a", Status::New, Status::Rejected, "Rejection").unwrap();

        assert_eq!(db.list_jobs(None).unwrap().len(), 2);
        let new_jobs = db.list_jobs(Some(Status::New)).unwrap();
        assert_eq!(new_jobs.len(), 1);
        assert_eq!(new_jobs[0].key, "b");
    }
}
