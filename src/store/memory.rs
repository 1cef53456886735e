//! Provides an in-memory implementation of [`JobRepository`].
//!
//! Currently this is provided for testing purposes and not designed for
//! use in a production system: it trades durability for a correct,
//! dependency-free stand-in. Keeping one entry per id makes the
//! uniqueness invariant structural rather than enforced.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::job::{Job, JobStatus};

use super::{JobRepository, StoreError};

type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    jobs: Arc<RwLock<HashMap<String, (JobStatus, Job)>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRepository for InMemoryRepository {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn resolve(&self, id: &str) -> Option<JobStatus> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|(status, _)| *status)
    }

    fn read(&self, id: &str) -> Result<Job> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|(_, job)| job.clone())
            .ok_or(StoreError::NotFound)
    }

    fn write(&self, id: &str, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        // Writes keep the job in its current bucket; new ids land queued.
        let status = jobs
            .get(id)
            .map(|(status, _)| *status)
            .unwrap_or(JobStatus::Queued);
        jobs.insert(id.to_owned(), (status, job.clone()));
        Ok(())
    }

    fn relocate(&self, id: &str, status: JobStatus) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        entry.0 = status;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn ids(&self, status: JobStatus) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, (bucket, _))| *bucket == status)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn writes_preserve_the_current_bucket() {
        let repo = InMemoryRepository::new();
        repo.write("x", &Job::new()).unwrap();
        repo.relocate("x", JobStatus::Failed).unwrap();

        repo.write("x", &Job::new()).unwrap();

        assert_eq!(repo.resolve("x"), Some(JobStatus::Failed));
        assert_eq!(repo.ids(JobStatus::Failed).unwrap(), vec!["x".to_owned()]);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.resolve("x"), None);
        assert_matches!(repo.read("x"), Err(StoreError::NotFound));
        assert_matches!(repo.remove("x"), Err(StoreError::NotFound));
        assert_matches!(
            repo.relocate("x", JobStatus::Completed),
            Err(StoreError::NotFound)
        );
    }
}
