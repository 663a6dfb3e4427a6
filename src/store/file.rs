//! JSON file repository
//!
//! One `<learner_id>.json` per learner under a data directory. A save holds an
//! exclusive `<learner_id>.lock` file for the whole version check and write, so
//! repositories in other threads or processes sharing the directory cannot
//! interleave. The new state goes to a uniquely named temporary file that is
//! renamed over the old one.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::NamedTempFile;

use super::{LearnerRepository, LearnerState, check_learner_id};
use crate::error::{EngineError, Result};

/// How long a save waits for another writer before giving up
const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Lock files older than this were left behind by a crashed writer
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Exclusive hold on a learner's lock file, released on drop
struct WriteLock {
    path: PathBuf,
    _file: File,
}

impl WriteLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self { path, _file: file }),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path) {
                        tracing::warn!("Removing stale lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    if started.elapsed() > LOCK_TIMEOUT {
                        return Err(EngineError::Storage(format!(
                            "Timed out waiting for lock {}",
                            path.display()
                        )));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn is_stale(path: &Path) -> bool {
        fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .is_some_and(|age| age > STALE_LOCK_AGE)
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::error!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}

/// Learner states stored as JSON files
#[derive(Debug, Clone)]
pub struct FileRepository {
    dir: PathBuf,
}

impl FileRepository {
    /// Repository rooted at `dir` (created on first save)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the path of a learner's state file
    fn learner_path(&self, learner_id: &str) -> Result<PathBuf> {
        check_learner_id(learner_id)?;
        Ok(self.dir.join(format!("{}.json", learner_id)))
    }

    fn lock_path(&self, learner_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", learner_id))
    }

    fn read(path: &Path) -> Result<Option<LearnerState>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path)?;
        let state = serde_json::from_str(&contents).map_err(|e| {
            EngineError::Storage(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(state))
    }

    /// Learner ids with a stored state, sorted
    pub fn learners(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(&self.dir)?
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

impl LearnerRepository for FileRepository {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>> {
        let path = self.learner_path(learner_id)?;
        Self::read(&path)
    }

    fn save(&self, state: &LearnerState, expected_version: u64) -> Result<u64> {
        let path = self.learner_path(&state.learner_id)?;
        fs::create_dir_all(&self.dir)?;
        let _lock = WriteLock::acquire(self.lock_path(&state.learner_id))?;

        let found = Self::read(&path)?.map_or(0, |s| s.version);
        if found != expected_version {
            return Err(EngineError::Conflict {
                learner_id: state.learner_id.clone(),
                expected: expected_version,
                found,
            });
        }

        let mut stored = state.clone();
        stored.version = expected_version + 1;
        let contents = serde_json::to_string_pretty(&stored)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| EngineError::Io(e.error))?;

        tracing::debug!("Saved learner {} at version {}", stored.learner_id, stored.version);
        Ok(stored.version)
    }
}
