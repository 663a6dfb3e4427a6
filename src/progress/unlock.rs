//! Unlock propagation
//!
//! A locked node becomes `Current` once every one of its prerequisites is
//! completed. Completion is never revoked, so one pass over the locked nodes
//! reaches the fixed point: an unlock only produces `Current` nodes, which can
//! never satisfy another node's prerequisites. A single completion therefore
//! cascades exactly one level.

use super::model::{NodeStatus, ProgressSet};
use crate::catalog::{Catalog, Node};

fn prerequisites_met(progress: &ProgressSet, node: &Node) -> bool {
    node.prerequisites.iter().all(|prereq| progress.is_completed(prereq))
}

fn unlock_if_ready(progress: &mut ProgressSet, node: &Node) -> bool {
    if progress.status(&node.id) != NodeStatus::Locked || !prerequisites_met(progress, node) {
        return false;
    }
    progress.record_mut(&node.id).status = NodeStatus::Current;
    true
}

/// Full re-scan: unlock every locked node whose prerequisites are all completed
///
/// Returns the newly unlocked ids in topological order.
pub fn propagate(progress: &mut ProgressSet, catalog: &Catalog) -> Vec<String> {
    let mut unlocked = Vec::new();
    for node in catalog.topological() {
        if unlock_if_ready(progress, node) {
            unlocked.push(node.id.clone());
        }
    }

    if !unlocked.is_empty() {
        tracing::debug!("Unlocked {} node(s): {}", unlocked.len(), unlocked.join(", "));
    }
    unlocked
}

/// Incremental variant: only the direct dependents of a just-completed node
///
/// Yields the same result as [`propagate`] when called after each completion.
pub fn propagate_from(
    progress: &mut ProgressSet,
    catalog: &Catalog,
    completed_id: &str,
) -> Vec<String> {
    let mut unlocked = Vec::new();
    for dependent in catalog.dependents(completed_id) {
        if let Some(node) = catalog.node(dependent) {
            if unlock_if_ready(progress, node) {
                unlocked.push(node.id.clone());
            }
        }
    }
    unlocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn complete(progress: &mut ProgressSet, id: &str) {
        let record = progress.record_mut(id);
        record.status = NodeStatus::Completed;
        record.stars = 1;
    }

    fn diamond() -> Catalog {
        Catalog::new(
            vec![
                Node::new("a", 10),
                Node::new("b", 10),
                Node::new("ab", 10).requires("a").requires("b"),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    fn chain() -> Catalog {
        Catalog::new(
            vec![
                Node::new("a", 10),
                Node::new("b", 10).requires("a"),
                Node::new("c", 10).requires("b"),
            ],
            Vec::new(),
        )
        .unwrap()
    }

    #[test]
    fn requires_all_prerequisites() {
        let catalog = diamond();
        let mut progress = ProgressSet::initial(&catalog);

        complete(&mut progress, "a");
        assert!(propagate(&mut progress, &catalog).is_empty());
        assert_eq!(progress.status("ab"), NodeStatus::Locked);

        complete(&mut progress, "b");
        assert_eq!(propagate(&mut progress, &catalog), vec!["ab".to_string()]);
        assert_eq!(progress.status("ab"), NodeStatus::Current);

        assert!(propagate(&mut progress, &catalog).is_empty());
    }

    #[test]
    fn order_of_prerequisites_does_not_matter() {
        let catalog = diamond();
        let mut progress = ProgressSet::initial(&catalog);

        complete(&mut progress, "b");
        assert!(propagate(&mut progress, &catalog).is_empty());
        complete(&mut progress, "a");
        assert_eq!(propagate(&mut progress, &catalog), vec!["ab".to_string()]);
    }

    #[test]
    fn chain_cascades_one_level_per_completion() {
        let catalog = chain();
        let mut progress = ProgressSet::initial(&catalog);

        complete(&mut progress, "a");
        assert_eq!(propagate(&mut progress, &catalog), vec!["b".to_string()]);
        assert_eq!(progress.status("c"), NodeStatus::Locked);

        complete(&mut progress, "b");
        assert_eq!(propagate(&mut progress, &catalog), vec!["c".to_string()]);
    }

    #[test]
    fn incremental_matches_full_rescan_on_chain() {
        let catalog = chain();
        let mut full = ProgressSet::initial(&catalog);
        let mut incremental = full.clone();

        for id in ["a", "b", "c"] {
            complete(&mut full, id);
            complete(&mut incremental, id);
            let from_scan = propagate(&mut full, &catalog);
            let from_dependents = propagate_from(&mut incremental, &catalog, id);
            assert_eq!(from_scan, from_dependents);
            assert_eq!(full, incremental);
        }
    }

    #[test]
    fn rescan_unlocks_roots_missing_from_history() {
        let catalog = chain();
        let mut progress = ProgressSet::default();
        progress.record_mut("a");

        assert_eq!(propagate(&mut progress, &catalog), vec!["a".to_string()]);
    }
}
