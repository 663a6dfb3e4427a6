//! Per-learner progress records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, EdgeState};
use crate::error::{EngineError, Result};

/// Where a node sits in the unlock state machine
///
/// `Locked -> Current -> InProgress -> Completed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    #[default]
    Locked,
    Current,
    InProgress,
    Completed,
}

impl NodeStatus {
    /// Can the learner attempt this node?
    pub fn is_reachable(self) -> bool {
        !matches!(self, NodeStatus::Locked)
    }

    /// Display label for renderers
    pub fn label(self) -> &'static str {
        match self {
            NodeStatus::Locked => "Locked",
            NodeStatus::Current => "Up next",
            NodeStatus::InProgress => "In progress",
            NodeStatus::Completed => "Completed",
        }
    }
}

/// Status and best performance for a single node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub node_id: String,
    pub status: NodeStatus,
    /// Best star rating (0-3), never decreases
    pub stars: u8,
    /// Best score (0-100), never decreases
    pub best_score: u8,
    /// Completion events processed
    pub attempts: u32,
    /// Unix timestamp of the latest passing completion
    pub completed_at: Option<i64>,
}

impl ProgressRecord {
    /// Fresh record in its initial state
    pub fn new(node_id: impl Into<String>, status: NodeStatus) -> Self {
        Self { node_id: node_id.into(), status, ..Default::default() }
    }
}

/// Counts for dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub total: usize,
    pub locked: usize,
    pub current: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub total_stars: u32,
}

impl ProgressSummary {
    /// Completed share as a whole percentage
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// All progress records for one learner, keyed by node id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressSet {
    records: BTreeMap<String, ProgressRecord>,
}

impl ProgressSet {
    /// Progress for a learner with no history
    pub fn initial(catalog: &Catalog) -> Self {
        let mut progress = Self::default();
        progress.reconcile(catalog);
        progress
    }

    /// Create records for catalog nodes this set has not seen yet
    ///
    /// Roots start `Current`, everything else `Locked`. Returns the ids created.
    /// Nodes whose prerequisites are already completed stay locked until the
    /// unlock propagator runs.
    pub fn reconcile(&mut self, catalog: &Catalog) -> Vec<String> {
        let mut created = Vec::new();
        for node in catalog.nodes() {
            if self.records.contains_key(&node.id) {
                continue;
            }
            let status = if node.is_root() { NodeStatus::Current } else { NodeStatus::Locked };
            self.records.insert(node.id.clone(), ProgressRecord::new(node.id.clone(), status));
            created.push(node.id.clone());
        }
        created
    }

    /// Get a record
    pub fn get(&self, node_id: &str) -> Option<&ProgressRecord> {
        self.records.get(node_id)
    }

    /// Get or lazily create a record
    pub fn record_mut(&mut self, node_id: &str) -> &mut ProgressRecord {
        self.records
            .entry(node_id.to_string())
            .or_insert_with(|| ProgressRecord::new(node_id, NodeStatus::Locked))
    }

    /// Status of a node, `Locked` when no record exists
    pub fn status(&self, node_id: &str) -> NodeStatus {
        self.records.get(node_id).map_or(NodeStatus::Locked, |r| r.status)
    }

    pub fn is_completed(&self, node_id: &str) -> bool {
        self.status(node_id) == NodeStatus::Completed
    }

    /// Iterate records in id order
    pub fn iter(&self) -> impl Iterator<Item = &ProgressRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids currently in the given status
    pub fn ids_with_status(&self, status: NodeStatus) -> Vec<String> {
        self.records.values().filter(|r| r.status == status).map(|r| r.node_id.clone()).collect()
    }

    pub fn summary(&self) -> ProgressSummary {
        let mut summary = ProgressSummary { total: self.records.len(), ..Default::default() };
        for record in self.records.values() {
            match record.status {
                NodeStatus::Locked => summary.locked += 1,
                NodeStatus::Current => summary.current += 1,
                NodeStatus::InProgress => summary.in_progress += 1,
                NodeStatus::Completed => summary.completed += 1,
            }
            summary.total_stars += u32::from(record.stars);
        }
        summary
    }

    /// Catalog edges with `is_active` set when the source node is completed
    pub fn edge_states(&self, catalog: &Catalog) -> Vec<EdgeState> {
        catalog
            .edges()
            .iter()
            .map(|edge| EdgeState {
                from: edge.from.clone(),
                to: edge.to.clone(),
                is_active: self.is_completed(&edge.from),
            })
            .collect()
    }

    /// Verify the record invariants against the catalog
    pub fn check_invariants(&self, catalog: &Catalog) -> Result<()> {
        for record in self.records.values() {
            let node = catalog.node(&record.node_id).ok_or_else(|| {
                EngineError::DataIntegrity(format!("progress for unknown node {}", record.node_id))
            })?;

            if record.stars > crate::rewards::MAX_STARS || u32::from(record.best_score) > 100 {
                return Err(EngineError::DataIntegrity(format!(
                    "node {} has out-of-range stars {} or score {}",
                    record.node_id, record.stars, record.best_score
                )));
            }

            if record.status == NodeStatus::Completed && record.stars == 0 {
                return Err(EngineError::DataIntegrity(format!(
                    "node {} is completed with zero stars",
                    record.node_id
                )));
            }

            if record.status.is_reachable() {
                if let Some(missing) = node.prerequisites.iter().find(|p| !self.is_completed(p)) {
                    return Err(EngineError::DataIntegrity(format!(
                        "node {} is {:?} but prerequisite {} is not completed",
                        record.node_id, record.status, missing
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Node;
    use pretty_assertions::assert_eq;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Node::new("a", 50),
                Node::new("b", 40).requires("a"),
                Node::new("c", 30).requires("a").requires("b"),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn initial_progress_unlocks_roots_only() {
        let progress = ProgressSet::initial(&catalog());
        assert_eq!(progress.status("a"), NodeStatus::Current);
        assert_eq!(progress.status("b"), NodeStatus::Locked);
        assert_eq!(progress.status("c"), NodeStatus::Locked);
        assert!(progress.check_invariants(&catalog()).is_ok());
    }

    #[test]
    fn reconcile_only_adds_missing_records() {
        let catalog = catalog();
        let mut progress = ProgressSet::default();
        progress.record_mut("a").attempts = 2;

        let created = progress.reconcile(&catalog);
        assert_eq!(created, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(progress.get("a").unwrap().attempts, 2);
        assert!(progress.reconcile(&catalog).is_empty());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&NodeStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }

    #[test]
    fn invariants_reject_unreachable_progress() {
        let catalog = catalog();
        let mut progress = ProgressSet::initial(&catalog);
        progress.record_mut("b").status = NodeStatus::Current;
        assert!(progress.check_invariants(&catalog).is_err());
    }

    #[test]
    fn invariants_reject_zero_star_completion() {
        let catalog = catalog();
        let mut progress = ProgressSet::initial(&catalog);
        progress.record_mut("a").status = NodeStatus::Completed;
        assert!(progress.check_invariants(&catalog).is_err());
    }

    #[test]
    fn summary_counts_statuses_and_stars() {
        let catalog = catalog();
        let mut progress = ProgressSet::initial(&catalog);
        let a = progress.record_mut("a");
        a.status = NodeStatus::Completed;
        a.stars = 2;

        let summary = progress.summary();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.locked, 2);
        assert_eq!(summary.total_stars, 2);
        assert_eq!(summary.percent_complete(), 33);
    }

    #[test]
    fn edges_activate_from_completed_sources() {
        let catalog = catalog();
        let mut progress = ProgressSet::initial(&catalog);
        let a = progress.record_mut("a");
        a.status = NodeStatus::Completed;
        a.stars = 1;

        let active: Vec<(String, bool)> =
            progress.edge_states(&catalog).into_iter().map(|e| (e.from, e.is_active)).collect();
        assert_eq!(
            active,
            vec![("a".to_string(), true), ("a".to_string(), true), ("b".to_string(), false)]
        );
    }
}
