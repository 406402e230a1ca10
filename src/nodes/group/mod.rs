//! Node groups
//!
//! A group is a subgraph between a [`GroupInputsNode`] and the
//! [`GroupOutputsNode`] reachable from it. A composite [`GroupNode`] captures
//! the subgraph when linked and evaluates it as one step of the outer graph,
//! optionally several times in a row with outputs fed back into inputs.

use std::collections::HashSet;

pub mod boundary;
pub mod iteration;

pub use boundary::{GroupInputsNode, GroupOutputsNode};
pub use iteration::{GroupMode, GroupNode};

use super::graph::Graph;
use super::node::{BoundaryRole, Node, NodeId};

/// Result of looking for a group's outputs boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundarySearch {
    Found(NodeId),
    NotFound,
    /// More than one outputs boundary is reachable, in insertion order
    Ambiguous(Vec<NodeId>),
}

/// Walk downstream from an inputs boundary and collect the outputs boundaries
/// it reaches. The walk does not continue past an outputs boundary.
pub fn find_outputs_boundary(graph: &Graph, inputs: NodeId) -> BoundarySearch {
    let mut stack = vec![inputs];
    let mut visited = HashSet::new();
    let mut found = Vec::new();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let role = graph.node_by_id(id).and_then(Node::boundary);
        if id != inputs && role == Some(BoundaryRole::Outputs) {
            found.push(id);
            continue;
        }
        for next in graph.successors(id).into_iter().rev() {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }
    }

    match found.len() {
        0 => BoundarySearch::NotFound,
        1 => BoundarySearch::Found(found[0]),
        _ => {
            found.sort_by_key(|id| graph.rank(*id));
            BoundarySearch::Ambiguous(found)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::library::ScalarMathNode;

    #[test]
    fn finds_the_reachable_outputs_node() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
        graph.add_node(Node::new("M", ScalarMathNode::add())).unwrap();
        graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
        graph.add_node(Node::new("Elsewhere", GroupOutputsNode::new())).unwrap();
        let inputs = graph.id_of("In").unwrap();

        assert_eq!(find_outputs_boundary(&graph, inputs), BoundarySearch::NotFound);

        graph.add_link("In", "Data1", "M", "A").unwrap();
        graph.add_link("M", "Result", "Out", "Data1").unwrap();
        assert_eq!(
            find_outputs_boundary(&graph, inputs),
            BoundarySearch::Found(graph.id_of("Out").unwrap())
        );

        graph.add_link("In", "Data2", "Elsewhere", "Data1").unwrap();
        assert!(matches!(
            find_outputs_boundary(&graph, inputs),
            BoundarySearch::Ambiguous(ids) if ids.len() == 2
        ));
    }
}
