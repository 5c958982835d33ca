use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::{JobRecord, Status};

/// One applied lifecycle change, kept as an audit trail per job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub from: Status,
    pub to: Status,
    pub cause: String,
    pub changed_at: DateTime<Utc>,
}

pub trait JobStore: Send + Sync {
    fn get_job_record(&self, key: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Insert a new record. Returns `false` and leaves the stored record alone
    /// if the key already exists.
    fn put_job_record(&self, record: &JobRecord) -> Result<bool, StoreError>;

    /// Move `key` from `from` to `to`, appending to its history.
    ///
    /// Returns `false` without writing anything if the stored status is no
    /// longer `from`, so a concurrent update is never overwritten.
    fn update_status(
        &self,
        key: &str,
        from: Status,
        to: Status,
        cause: &str,
    ) -> Result<bool, StoreError>;

    fn list_jobs(&self, status: Option<Status>) -> Result<Vec<JobRecord>, StoreError>;

    fn status_history(&self, key: &str) -> Result<Vec<StatusChange>, StoreError>;
}

#[derive(Debug, Default)]
struct JobEntry {
    record: Option<JobRecord>,
    history: Vec<StatusChange>,
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, JobEntry>>,
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("job store lock poisoned".to_string())
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryJobStore {
    fn get_job_record(&self, key: &str) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        Ok(jobs.get(key).and_then(|e| e.record.clone()))
    }

    fn put_job_record(&self, record: &JobRecord) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let entry = jobs.entry(record.key.clone()).or_default();
        if entry.record.is_some() {
            return Ok(false);
        }
        entry.record = Some(record.clone());
        Ok(true)
    }

    fn update_status(
        &self,
        key: &str,
        from: Status,
        to: Status,
        cause: &str,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let entry = jobs
            .get_mut(key)
            .filter(|e| e.record.is_some())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let now = Utc::now();
        match entry.record.as_mut() {
            Some(record) if record.status == from => {
                record.status = to;
                record.updated_at = now;
            }
            _ => return Ok(false),
        }
        entry.history.push(StatusChange {
            from,
            to,
            cause: cause.to_string(),
            changed_at: now,
        });
        Ok(true)
    }

    fn list_jobs(&self, status: Option<Status>) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        let mut records: Vec<JobRecord> = jobs
            .values()
            .filter_map(|e| e.record.clone())
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key.cmp(&b.key)));
        Ok(records)
    }

    fn status_history(&self, key: &str) -> Result<Vec<StatusChange>, StoreError> {
        let jobs = self.jobs.lock().map_err(|_| poisoned())?;
        Ok(jobs.get(key).map(|e| e.history.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str) -> JobRecord {
        let now = Utc::now();
        JobRecord {
            key: key.to_string(),
            company: "Google".to_string(),
            title: "SWE Intern".to_string(),
            url: key.to_string(),
            status: Status::New,
            score: Some(70),
            dream_company: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_put_is_insert_only() {
        let store = MemoryJobStore::new();
        assert!(store.put_job_record(&record("k")).unwrap());

        let mut changed = record("k");
        changed.status = Status::Offer;
        assert!(!store.put_job_record(&changed).unwrap());
        assert_eq!(store.get_job_record("k").unwrap().unwrap().status, Status::New);
    }

    #[test]
    fn test_update_status_records_history() {
        let store = MemoryJobStore::new();
        store.put_job_record(&record("k")).unwrap();

        assert!(store.update_status("k", Status::New, Status::Applied, "Confirmation").unwrap());
        assert!(!store.update_status("k", Status::New, Status::OA, "OAInvite").unwrap());

        let history = store.status_history("k").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to, Status::Applied);
        assert_eq!(history[0].cause, "Confirmation");
    }

    #[test]
    fn test_update_missing_record() {
        let store = MemoryJobStore::new();
        let err = store
            .update_status("missing", Status::New, Status::Applied, "Confirmation")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_list_filters_by_status() {
        let store = MemoryJobStore::new();
        store.put_job_record(&record("a")).unwrap();
        store.put_job_record(&record("b")).unwrap();
        store.update_status("b", Status::New, Status::Rejected, "Rejection").unwrap();

        assert_eq!(store.list_jobs(None).unwrap().len(), 2);
        let rejected = store.list_jobs(Some(Status::Rejected)).unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].key, "b");
    }
}
