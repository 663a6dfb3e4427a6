//! Prerequisite graph checks
//!
//! Load-time integrity validation: every prerequisite exists, ids are unique and
//! the graph is acyclic. Unlock propagation never re-checks these.

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::model::{Edge, Node};
use crate::error::{EngineError, Result};

/// Build an id -> position index, rejecting duplicates
pub fn index_nodes(nodes: &[Node]) -> Result<HashMap<String, usize>> {
    let mut index = HashMap::with_capacity(nodes.len());
    for (idx, node) in nodes.iter().enumerate() {
        if node.id.is_empty() {
            return Err(EngineError::DataIntegrity(format!(
                "node at position {} has empty id",
                idx
            )));
        }
        if index.insert(node.id.clone(), idx).is_some() {
            return Err(EngineError::DataIntegrity(format!("duplicate node id {}", node.id)));
        }
    }
    Ok(index)
}

/// Check every prerequisite references a known node other than itself
pub fn check_references(nodes: &[Node], index: &HashMap<String, usize>) -> Result<()> {
    for node in nodes {
        for prereq in &node.prerequisites {
            if prereq == &node.id {
                return Err(EngineError::DataIntegrity(format!(
                    "node {} lists itself as a prerequisite",
                    node.id
                )));
            }
            if !index.contains_key(prereq) {
                return Err(EngineError::DataIntegrity(format!(
                    "node {} requires unknown node {}",
                    node.id, prereq
                )));
            }
        }
    }
    Ok(())
}

/// Topological order of node positions (Kahn's algorithm)
///
/// Ties are broken by catalog position, so the order is deterministic.
/// Fails with `DataIntegrity` naming the nodes left on a cycle.
pub fn topological_order(nodes: &[Node], index: &HashMap<String, usize>) -> Result<Vec<usize>> {
    let mut in_degree: Vec<usize> = nodes.iter().map(|n| n.prerequisites.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (idx, node) in nodes.iter().enumerate() {
        for prereq in &node.prerequisites {
            if let Some(&p) = index.get(prereq) {
                dependents[p].push(idx);
            }
        }
    }

    let mut ready: VecDeque<usize> =
        in_degree.iter().enumerate().filter(|(_, d)| **d == 0).map(|(i, _)| i).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(idx) = ready.pop_front() {
        order.push(idx);
        for &dep in &dependents[idx] {
            in_degree[dep] -= 1;
            if in_degree[dep] == 0 {
                ready.push_back(dep);
            }
        }
    }

    if order.len() < nodes.len() {
        let stuck: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > 0)
            .map(|(i, _)| nodes[i].id.as_str())
            .collect();
        return Err(EngineError::DataIntegrity(format!(
            "prerequisite cycle involving {}",
            stuck.join(", ")
        )));
    }

    Ok(order)
}

/// Edges implied by the prerequisite sets, sorted
pub fn derive_edges(nodes: &[Node]) -> Vec<Edge> {
    let mut edges: Vec<Edge> = nodes
        .iter()
        .flat_map(|node| node.prerequisites.iter().map(|p| Edge::new(p.clone(), node.id.clone())))
        .collect();
    edges.sort();
    edges
}

/// Check that stored edges mirror the prerequisite relation exactly
pub fn check_edges(nodes: &[Node], edges: &[Edge]) -> Result<()> {
    let derived: BTreeSet<Edge> = derive_edges(nodes).into_iter().collect();
    let stored: BTreeSet<Edge> = edges.iter().cloned().collect();

    if let Some(extra) = stored.difference(&derived).next() {
        return Err(EngineError::DataIntegrity(format!(
            "edge {} -> {} has no matching prerequisite",
            extra.from, extra.to
        )));
    }
    if let Some(missing) = derived.difference(&stored).next() {
        return Err(EngineError::DataIntegrity(format!(
            "prerequisite {} -> {} has no edge",
            missing.from, missing.to
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("c", 10).requires("a").requires("b"),
            Node::new("a", 10),
            Node::new("b", 10).requires("a"),
        ]
    }

    #[test]
    fn topological_order_respects_prerequisites() {
        let nodes = nodes();
        let index = index_nodes(&nodes).unwrap();
        let order = topological_order(&nodes, &index).unwrap();
        let ids: Vec<&str> = order.iter().map(|&i| nodes[i].id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn cycle_is_detected() {
        let nodes = vec![Node::new("a", 1).requires("b"), Node::new("b", 1).requires("a")];
        let index = index_nodes(&nodes).unwrap();
        let err = topological_order(&nodes, &index).unwrap_err();
        assert!(matches!(err, EngineError::DataIntegrity(ref msg) if msg.contains("cycle")));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let nodes = vec![Node::new("a", 1), Node::new("a", 2)];
        assert!(index_nodes(&nodes).is_err());
    }

    #[test]
    fn unknown_and_self_prerequisites_are_rejected() {
        let unknown = vec![Node::new("a", 1).requires("ghost")];
        let index = index_nodes(&unknown).unwrap();
        assert!(check_references(&unknown, &index).is_err());

        let looped = vec![Node::new("a", 1).requires("a")];
        let index = index_nodes(&looped).unwrap();
        assert!(check_references(&looped, &index).is_err());
    }

    #[test]
    fn edges_must_mirror_prerequisites() {
        let nodes = nodes();
        let derived = derive_edges(&nodes);
        assert_eq!(derived.len(), 3);
        assert!(check_edges(&nodes, &derived).is_ok());

        let mut extra = derived.clone();
        extra.push(Edge::new("c", "a"));
        assert!(check_edges(&nodes, &extra).is_err());

        assert!(check_edges(&nodes, &derived[1..]).is_err());
    }
}
