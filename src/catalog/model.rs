//! Catalog data model
//!
//! Nodes and edges as supplied by the content collaborator. The catalog is
//! read-only for the lifetime of a process.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A unit of learning content with a position in the skill tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: String,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Nodes that must be completed before this one is reachable
    #[serde(default)]
    pub prerequisites: BTreeSet<String>,
    /// XP before the star multiplier
    #[serde(default)]
    pub base_xp: u32,
    /// Checkpoint marker (informational)
    #[serde(default)]
    pub is_checkpoint: bool,
    /// Grouping used by renderers (e.g., "basics")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Display ordering within the tree
    #[serde(default)]
    pub order: u32,
}

impl Node {
    /// Create a node with no prerequisites
    pub fn new(id: impl Into<String>, base_xp: u32) -> Self {
        Self {
            id: id.into(),
            title: None,
            prerequisites: BTreeSet::new(),
            base_xp,
            is_checkpoint: false,
            category: None,
            order: 0,
        }
    }

    /// Add a prerequisite
    pub fn requires(mut self, prerequisite: impl Into<String>) -> Self {
        self.prerequisites.insert(prerequisite.into());
        self
    }

    /// Mark as checkpoint
    pub fn checkpoint(mut self) -> Self {
        self.is_checkpoint = true;
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Is this node reachable from the start?
    pub fn is_root(&self) -> bool {
        self.prerequisites.is_empty()
    }
}

/// A stored `from -> to` connection mirroring `to.prerequisites ∋ from`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), to: to.into() }
    }
}

/// Edge with its rendering flag, derived from progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeState {
    pub from: String,
    pub to: String,
    /// Source node is completed
    pub is_active: bool,
}

/// On-disk catalog layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    pub nodes: Vec<Node>,
    /// Derived from prerequisites when absent
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_builder() {
        let node =
            Node::new("loops", 40).requires("variables").checkpoint().with_category("basics");

        assert!(node.prerequisites.contains("variables"));
        assert!(node.is_checkpoint);
        assert_eq!(node.category, Some("basics".into()));
        assert!(!node.is_root());
    }

    #[test]
    fn catalog_file_deserializes_with_defaults() {
        let json = r#"{
            "nodes": [
                { "id": "intro", "base_xp": 50 },
                { "id": "next", "prerequisites": ["intro"], "base_xp": 30, "is_checkpoint": true }
            ]
        }"#;

        let file: CatalogFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.nodes.len(), 2);
        assert!(file.edges.is_empty());
        assert!(file.nodes[0].is_root());
        assert!(file.nodes[1].is_checkpoint);
    }
}
