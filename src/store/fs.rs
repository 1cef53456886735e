//! Filesystem-backed job repository.
//!
//! A job's status is the directory its document lives in, and
//! `fs::rename` within one filesystem is the atomic status transition.
//! Crash states stay visible on disk and are manually recoverable.
//!
//! There is no file locking: concurrent writers to the same job id can
//! corrupt it, as can a crash mid-write. Accepted limitation for a
//! single-host, one-controller deployment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::job::{Job, JobStatus};

use super::{JobRepository, StoreError};

type Result<T> = std::result::Result<T, StoreError>;

/// Job documents as `<root>/<status>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FsRepository {
    root: PathBuf,
}

impl FsRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn status_dir(&self, status: JobStatus) -> PathBuf {
        self.root.join(status.dir_name())
    }

    fn job_path(&self, status: JobStatus, id: &str) -> PathBuf {
        self.status_dir(status).join(format!("{id}.json"))
    }

    /// Probes the status directories in [`JobStatus::RESOLVE_ORDER`] and
    /// returns the first existing document path. Absent ids fall back to
    /// the queued path, the write-intent default.
    pub fn resolve_path(&self, id: &str) -> PathBuf {
        JobStatus::RESOLVE_ORDER
            .iter()
            .map(|status| self.job_path(*status, id))
            .find(|path| path.is_file())
            .unwrap_or_else(|| self.job_path(JobStatus::Queued, id))
    }
}

impl JobRepository for FsRepository {
    fn init(&self) -> Result<()> {
        for status in JobStatus::RESOLVE_ORDER {
            fs::create_dir_all(self.status_dir(status))?;
        }
        Ok(())
    }

    fn resolve(&self, id: &str) -> Option<JobStatus> {
        JobStatus::RESOLVE_ORDER
            .into_iter()
            .find(|status| self.job_path(*status, id).is_file())
    }

    fn read(&self, id: &str) -> Result<Job> {
        let contents = fs::read_to_string(self.resolve_path(id))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, id: &str, job: &Job) -> Result<()> {
        fs::write(self.resolve_path(id), serde_json::to_string_pretty(job)?)?;
        Ok(())
    }

    fn relocate(&self, id: &str, status: JobStatus) -> Result<()> {
        let source = self.resolve_path(id);
        if !source.is_file() {
            return Err(StoreError::NotFound);
        }
        fs::rename(source, self.job_path(status, id))?;
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let path = self.resolve_path(id);
        if !path.is_file() {
            return Err(StoreError::NotFound);
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn ids(&self, status: JobStatus) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.status_dir(status))? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(stem.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn repo() -> (tempfile::TempDir, FsRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = FsRepository::new(dir.path().join("jobs"));
        repo.init().unwrap();
        (dir, repo)
    }

    #[test]
    fn init_creates_the_three_directories_idempotently() {
        let (_dir, repo) = repo();
        repo.init().unwrap();

        for status in JobStatus::RESOLVE_ORDER {
            assert!(repo.status_dir(status).is_dir());
            assert!(repo.ids(status).unwrap().is_empty());
        }
    }

    #[test]
    fn resolve_prefers_queued_then_failed_then_completed() {
        let (_dir, repo) = repo();
        let job = Job::new();
        let raw = serde_json::to_string(&job).unwrap();

        fs::write(repo.status_dir(JobStatus::Completed).join("x.json"), &raw).unwrap();
        assert_eq!(repo.resolve("x"), Some(JobStatus::Completed));

        fs::write(repo.status_dir(JobStatus::Failed).join("x.json"), &raw).unwrap();
        assert_eq!(repo.resolve("x"), Some(JobStatus::Failed));

        fs::write(repo.status_dir(JobStatus::Queued).join("x.json"), &raw).unwrap();
        assert_eq!(repo.resolve("x"), Some(JobStatus::Queued));
        assert_eq!(
            repo.resolve_path("x"),
            repo.status_dir(JobStatus::Queued).join("x.json")
        );
    }

    #[test]
    fn resolve_path_defaults_to_the_queued_slot() {
        let (_dir, repo) = repo();
        assert_eq!(
            repo.resolve_path("fresh"),
            repo.status_dir(JobStatus::Queued).join("fresh.json")
        );
    }

    #[test]
    fn relocate_moves_the_document_between_directories() {
        let (_dir, repo) = repo();
        repo.write("x", &Job::new()).unwrap();

        repo.relocate("x", JobStatus::Completed).unwrap();

        assert!(repo.status_dir(JobStatus::Completed).join("x.json").is_file());
        assert!(!repo.status_dir(JobStatus::Queued).join("x.json").exists());
        assert_matches!(repo.relocate("missing", JobStatus::Failed), Err(StoreError::NotFound));
    }

    #[test]
    fn ids_lists_sorted_json_stems_only() {
        let (_dir, repo) = repo();
        repo.write("beta", &Job::new()).unwrap();
        repo.write("alpha", &Job::new()).unwrap();
        fs::write(repo.status_dir(JobStatus::Queued).join("notes.txt"), "x").unwrap();

        assert_eq!(
            repo.ids(JobStatus::Queued).unwrap(),
            vec!["alpha".to_owned(), "beta".to_owned()]
        );
    }

    #[test]
    fn malformed_documents_surface_as_json_errors() {
        let (_dir, repo) = repo();
        fs::write(repo.status_dir(JobStatus::Queued).join("x.json"), "{not json").unwrap();

        assert_matches!(repo.read("x"), Err(StoreError::Json(_)));
    }
}
