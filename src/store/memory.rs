//! In-process repository

use std::collections::HashMap;
use std::sync::Mutex;

use super::{LearnerRepository, LearnerState};
use crate::error::{EngineError, Result};

/// Learner states held in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryRepository {
    states: Mutex<HashMap<String, LearnerState>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of learners stored
    pub fn len(&self) -> usize {
        self.states.lock().map(|states| states.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LearnerRepository for MemoryRepository {
    fn load(&self, learner_id: &str) -> Result<Option<LearnerState>> {
        let states = self.states.lock().map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(states.get(learner_id).cloned())
    }

    fn save(&self, state: &LearnerState, expected_version: u64) -> Result<u64> {
        let mut states = self.states.lock().map_err(|e| EngineError::Storage(e.to_string()))?;

        let found = states.get(&state.learner_id).map_or(0, |s| s.version);
        if found != expected_version {
            return Err(EngineError::Conflict {
                learner_id: state.learner_id.clone(),
                expected: expected_version,
                found,
            });
        }

        let mut stored = state.clone();
        stored.version = expected_version + 1;
        states.insert(stored.learner_id.clone(), stored);
        Ok(expected_version + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Node};

    fn state() -> LearnerState {
        let catalog = Catalog::new(vec![Node::new("a", 10)], Vec::new()).unwrap();
        LearnerState::new("ada", &catalog, 10)
    }

    #[test]
    fn load_missing_is_none() {
        let repo = MemoryRepository::new();
        assert!(repo.load("ada").unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[test]
    fn save_bumps_version() {
        let repo = MemoryRepository::new();
        assert_eq!(repo.save(&state(), 0).unwrap(), 1);

        let loaded = repo.load("ada").unwrap().unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(repo.save(&loaded, loaded.version).unwrap(), 2);
    }

    #[test]
    fn stale_save_conflicts() {
        let repo = MemoryRepository::new();
        repo.save(&state(), 0).unwrap();

        let err = repo.save(&state(), 0).unwrap_err();
        assert!(matches!(err, EngineError::Conflict { expected: 0, found: 1, .. }));
    }
}
