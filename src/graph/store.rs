use std::collections::HashMap;

use crate::error::RunError;
use crate::model::{Connection, Node};

/// The node/connection set for one workflow, as loaded for a single run.
///
/// Arena-style records keyed by id, with adjacency lists rebuilt fresh per
/// run from the store; no in-memory back-references between nodes.
#[derive(Debug)]
pub struct RunGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    /// Incoming connections per target node, in definition order.
    incoming: HashMap<String, Vec<Connection>>,
    /// Outgoing connection count per source node.
    out_degree: HashMap<String, usize>,
    successors: HashMap<String, Vec<String>>,
}

impl RunGraph {
    pub fn build(nodes: Vec<Node>, connections: Vec<Connection>) -> Result<Self, RunError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(RunError::GraphBuild(format!(
                    "duplicate node id: {}",
                    node.id
                )));
            }
        }

        let mut incoming: HashMap<String, Vec<Connection>> = HashMap::new();
        let mut out_degree: HashMap<String, usize> = HashMap::new();
        let mut successors: HashMap<String, Vec<String>> = HashMap::new();
        for conn in connections {
            if !index.contains_key(&conn.source) {
                return Err(RunError::GraphBuild(format!(
                    "connection source not in workflow: {}",
                    conn.source
                )));
            }
            if !index.contains_key(&conn.target) {
                return Err(RunError::GraphBuild(format!(
                    "connection target not in workflow: {}",
                    conn.target
                )));
            }
            *out_degree.entry(conn.source.clone()).or_default() += 1;
            successors
                .entry(conn.source.clone())
                .or_default()
                .push(conn.target.clone());
            incoming.entry(conn.target.clone()).or_default().push(conn);
        }

        Ok(Self {
            nodes,
            index,
            incoming,
            out_degree,
            successors,
        })
    }

    /// Nodes in definition order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Incoming connections of a node, in definition order.
    pub fn incoming(&self, id: &str) -> &[Connection] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn successors(&self, id: &str) -> &[String] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Terminal nodes: no outgoing connections, in definition order.
    pub fn terminal_nodes(&self) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| !self.out_degree.contains_key(&n.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
