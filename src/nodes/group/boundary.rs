//! Group boundary pseudo-nodes
//!
//! Both ends of a group carry a growable socket sequence that adapts its
//! kind to whatever is linked to it. Neither computes anything itself: the
//! composite node places values on the inputs boundary and reads them back
//! off the outputs boundary.

use crate::config::EngineConfig;
use crate::constants::{group, multi_socket};
use crate::error::Result;
use crate::nodes::context::NodeContext;
use crate::nodes::multi_socket::MultiSocket;
use crate::nodes::node::{BoundaryRole, Node, NodeProcessor};
use crate::nodes::socket::Socket;
use crate::nodes::value::DataKind;

fn boundary_sockets(min_sockets: usize) -> MultiSocket {
    MultiSocket::new(group::BOUNDARY_SOCKET_BASE, DataKind::any(), min_sockets).adapting()
}

/// Entry point of a group: exposes the group's inputs as outputs
#[derive(Debug, Clone)]
pub struct GroupInputsNode {
    min_sockets: usize,
}

impl GroupInputsNode {
    pub fn new() -> Self {
        Self {
            min_sockets: multi_socket::DEFAULT_MIN_SOCKETS,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_sockets: config.multi_socket_min,
        }
    }
}

impl Default for GroupInputsNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeProcessor for GroupInputsNode {
    fn type_id(&self) -> &'static str {
        "group.inputs"
    }

    fn init(&mut self, node: &mut Node) {
        let sockets = boundary_sockets(self.min_sockets);
        for position in 0..self.min_sockets.max(1) {
            node.add_output(Socket::output(sockets.socket_name(position), sockets.kind.clone()));
        }
        node.multi_outputs = Some(sockets);
    }

    fn process(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn boundary(&self) -> Option<BoundaryRole> {
        Some(BoundaryRole::Inputs)
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}

/// Exit point of a group: collects the group's outputs on its inputs
#[derive(Debug, Clone)]
pub struct GroupOutputsNode {
    min_sockets: usize,
}

impl GroupOutputsNode {
    pub fn new() -> Self {
        Self {
            min_sockets: multi_socket::DEFAULT_MIN_SOCKETS,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_sockets: config.multi_socket_min,
        }
    }
}

impl Default for GroupOutputsNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeProcessor for GroupOutputsNode {
    fn type_id(&self) -> &'static str {
        "group.outputs"
    }

    fn init(&mut self, node: &mut Node) {
        let sockets = boundary_sockets(self.min_sockets);
        for position in 0..self.min_sockets.max(1) {
            node.add_input(Socket::input(sockets.socket_name(position), sockets.kind.clone()).optional());
        }
        node.multi_inputs = Some(sockets);
    }

    fn process(&mut self, _ctx: &mut NodeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn boundary(&self) -> Option<BoundaryRole> {
        Some(BoundaryRole::Outputs)
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::graph::Graph;
    use crate::nodes::library::{IntegerNode, ScalarMathNode};
    use crate::nodes::socket::SocketDirection;

    fn names(graph: &Graph, node: &str, direction: SocketDirection) -> Vec<String> {
        graph
            .node(node)
            .unwrap()
            .sockets(direction)
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    #[test]
    fn inputs_boundary_grows_and_prunes() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
        graph.add_node(Node::new("M", ScalarMathNode::add())).unwrap();
        assert_eq!(names(&graph, "In", SocketDirection::Output), ["Data1"]);

        graph.add_link("In", "Data1", "M", "A").unwrap();
        assert_eq!(names(&graph, "In", SocketDirection::Output), ["Data1", "Data2"]);

        graph.add_link("In", "Data2", "M", "B").unwrap();
        assert_eq!(
            names(&graph, "In", SocketDirection::Output),
            ["Data1", "Data2", "Data3"]
        );

        graph.remove_link("M", "B").unwrap();
        assert_eq!(names(&graph, "In", SocketDirection::Output), ["Data1", "Data2"]);
        graph.remove_link("M", "A").unwrap();
        assert_eq!(names(&graph, "In", SocketDirection::Output), ["Data1"]);
    }

    #[test]
    fn boundary_sockets_take_the_linked_kind() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
        graph.add_node(Node::new("M", ScalarMathNode::add())).unwrap();
        graph.add_link("In", "Data1", "M", "A").unwrap();

        let inputs = graph.node("In").unwrap();
        assert_eq!(inputs.outputs[0].kind, DataKind::scalar_list());
        // the fresh sentinel stays a wildcard
        assert!(inputs.outputs[1].kind.is_any());
        assert_eq!(graph.links().len(), 1);
    }

    #[test]
    fn outputs_boundary_keeps_one_unlinked_sentinel() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("N", IntegerNode::new(2))).unwrap();
        graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();

        graph.add_link("N", "Integer", "Out", "Data1").unwrap();
        let out = graph.node("Out").unwrap();
        assert_eq!(out.inputs.len(), 2);
        let out_id = out.id();
        assert!(!graph.is_linked(out_id, SocketDirection::Input, "Data2"));
    }

    #[test]
    fn min_sockets_comes_from_config() {
        let config = EngineConfig {
            multi_socket_min: 3,
            ..EngineConfig::default()
        };
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::from_config(&config))).unwrap();
        assert_eq!(
            names(&graph, "In", SocketDirection::Output),
            ["Data1", "Data2", "Data3"]
        );
    }
}
