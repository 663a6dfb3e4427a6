//! Skill-tree catalog
//!
//! The fixed list of nodes and edges, validated once at load time. An invalid
//! catalog (cycle, dangling prerequisite, duplicate id) is refused outright.

pub mod graph;
pub mod model;

pub use model::{CatalogFile, Edge, EdgeState, Node};

use std::collections::HashMap;
use std::path::Path;

use crate::error::{EngineError, Result};

/// A validated, read-only skill tree
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Nodes in catalog order
    nodes: Vec<Node>,
    /// id -> position in `nodes`
    index: HashMap<String, usize>,
    /// Positions in topological order
    topo_order: Vec<usize>,
    /// id -> ids that list it as a prerequisite
    dependents: HashMap<String, Vec<String>>,
    edges: Vec<Edge>,
}

impl Catalog {
    /// Validate nodes and edges into a catalog
    ///
    /// Empty `edges` are derived from the prerequisites. Supplied edges must
    /// mirror them exactly.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self> {
        let index = graph::index_nodes(&nodes)?;
        graph::check_references(&nodes, &index)?;
        let topo_order = graph::topological_order(&nodes, &index)?;

        let edges = if edges.is_empty() {
            graph::derive_edges(&nodes)
        } else {
            graph::check_edges(&nodes, &edges)?;
            edges
        };

        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for &idx in &topo_order {
            let node = &nodes[idx];
            for prereq in &node.prerequisites {
                dependents.entry(prereq.clone()).or_default().push(node.id.clone());
            }
        }

        tracing::debug!("Catalog validated: {} nodes, {} edges", nodes.len(), edges.len());

        Ok(Self { nodes, index, topo_order, dependents, edges })
    }

    /// Parse and validate a catalog from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::new(file.nodes, file.edges)
    }

    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Get a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    /// Get a node by id, or `NotFound`
    pub fn require(&self, id: &str) -> Result<&Node> {
        self.node(id).ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Does the catalog contain this id?
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in catalog order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes with every prerequisite before its dependents
    pub fn topological(&self) -> impl Iterator<Item = &Node> + '_ {
        self.topo_order.iter().map(|&idx| &self.nodes[idx])
    }

    /// Direct dependents of a node
    pub fn dependents(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Stored edges
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Node count
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
