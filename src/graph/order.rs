use std::collections::{HashMap, VecDeque};

use crate::error::RunError;

use super::RunGraph;

/// Kahn's algorithm over the run graph. Returns a linear order satisfying
/// all edges, deterministic for a fixed graph: the queue is seeded and
/// refilled in node definition order. O(V+E).
///
/// If the result is shorter than the node count, the undrained remainder
/// forms one or more cycles and is reported by id.
pub fn topological_order(graph: &RunGraph) -> Result<Vec<String>, RunError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
    for node in graph.nodes() {
        in_degree.insert(node.id.as_str(), graph.incoming(&node.id).len());
    }

    let mut queue: VecDeque<&str> = graph
        .nodes()
        .iter()
        .filter(|n| in_degree[n.id.as_str()] == 0)
        .map(|n| n.id.as_str())
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        for succ in graph.successors(id) {
            let degree = in_degree
                .get_mut(succ.as_str())
                .expect("successor is a validated graph node");
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(succ.as_str());
            }
        }
    }

    if order.len() < graph.len() {
        let stuck: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| in_degree[n.id.as_str()] > 0)
            .map(|n| n.id.clone())
            .collect();
        return Err(RunError::CycleDetected { nodes: stuck });
    }

    Ok(order)
}
