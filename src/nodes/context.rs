//! Contexts handed to node hooks
//!
//! [`NodeContext`] is what `process` sees: socket reads, buffered output
//! writes and access to the run in progress. [`EditContext`] is what the
//! structural hooks see: the graph and the id of the node being edited.

use std::rc::Rc;

use super::execution_engine::{self, RunLog};
use super::graph::Graph;
use super::node::{Node, NodeId};
use super::socket::SocketDirection;
use super::value::{SocketData, SocketValue};
use crate::error::{EngineError, EvaluationError, Result};

/// Evaluation context for a single `process` call.
///
/// Outputs written with [`set`](Self::set) are held back and stored on the
/// node's sockets only when `process` returns `Ok`, so a failing node leaves
/// its previous outputs in place.
pub struct NodeContext<'a> {
    graph: &'a mut Graph,
    node: NodeId,
    run: &'a mut RunLog,
    pending: Vec<(String, Rc<SocketValue>)>,
    /// A nested pass stopped on cancellation
    interrupted: bool,
}

impl<'a> NodeContext<'a> {
    pub(crate) fn new(graph: &'a mut Graph, node: NodeId, run: &'a mut RunLog) -> Self {
        Self {
            graph,
            node,
            run,
            pending: Vec::new(),
            interrupted: false,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// The node being processed
    pub fn node(&self) -> Result<&Node> {
        self.graph
            .node_by_id(self.node)
            .ok_or_else(|| EngineError::NodeNotFound(self.node.to_string()))
    }

    /// Name of the node being processed
    pub fn name(&self) -> &str {
        self.graph.name_of(self.node).unwrap_or_default()
    }

    /// Full socket read: shared handle or independent copy, with an optional
    /// fallback for unlinked inputs
    pub fn fetch(
        &self,
        input: &str,
        default: Option<SocketValue>,
        deepcopy: bool,
    ) -> std::result::Result<SocketData, EvaluationError> {
        self.graph.read_input(self.node, input, default, deepcopy)
    }

    /// Independent copy of an input's value
    pub fn get(&self, input: &str) -> std::result::Result<SocketValue, EvaluationError> {
        self.fetch(input, None, true).map(SocketData::into_owned)
    }

    /// Independent copy of an input's value, or `default` when unlinked and unbound
    pub fn get_or(
        &self,
        input: &str,
        default: SocketValue,
    ) -> std::result::Result<SocketValue, EvaluationError> {
        self.fetch(input, Some(default), true)
            .map(SocketData::into_owned)
    }

    /// Read-only handle on an input's value, no copy made
    pub fn get_shared(&self, input: &str) -> std::result::Result<Rc<SocketValue>, EvaluationError> {
        self.fetch(input, None, false).map(SocketData::into_shared)
    }

    pub fn is_input_linked(&self, input: &str) -> bool {
        self.graph.is_linked(self.node, SocketDirection::Input, input)
    }

    pub fn is_output_linked(&self, output: &str) -> bool {
        self.graph.is_linked(self.node, SocketDirection::Output, output)
    }

    /// A property on the node being processed
    pub fn property(&self, name: &str) -> Option<&SocketValue> {
        self.graph
            .node_by_id(self.node)
            .and_then(|n| n.properties.get(name))
    }

    /// Place a value on an output socket. The value is moved, not copied.
    pub fn set(&mut self, output: &str, value: SocketValue) -> Result<()> {
        self.set_shared(output, Rc::new(value))
    }

    /// Place an existing shared value on an output socket
    pub fn set_shared(&mut self, output: &str, value: Rc<SocketValue>) -> Result<()> {
        let node = self.node()?;
        if node.output(output).is_none() {
            return Err(EngineError::SocketNotFound {
                node: node.name.clone(),
                socket: output.to_string(),
                direction: SocketDirection::Output.as_str(),
            });
        }
        self.pending.retain(|(name, _)| name != output);
        self.pending.push((output.to_string(), value));
        Ok(())
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Direct graph access, used by composite nodes to hand data across
    /// their boundary nodes
    pub fn graph_mut(&mut self) -> &mut Graph {
        self.graph
    }

    /// Execute an update list inside the current run.
    ///
    /// Failures are recorded in the same report and nodes that already failed
    /// in this run are skipped. A pass cut short by cancellation marks this
    /// node as interrupted: its outputs are dropped and it is not reported
    /// as executed.
    pub fn run_nested(&mut self, update_list: &[NodeId]) -> Result<()> {
        execution_engine::execute_pass(self.graph, update_list, self.run)?;
        if self.run.is_cancelled() {
            self.interrupted = true;
        }
        Ok(())
    }

    /// Whether the caller asked the run to stop
    pub fn is_cancelled(&self) -> bool {
        self.run.is_cancelled()
    }

    /// Buffered outputs, and whether a nested pass was interrupted
    pub(crate) fn into_parts(self) -> (Vec<(String, Rc<SocketValue>)>, bool) {
        (self.pending, self.interrupted)
    }
}

/// Context for the structural hooks `update`, `link` and `unlink`
pub struct EditContext<'a> {
    graph: &'a mut Graph,
    node: NodeId,
}

impl<'a> EditContext<'a> {
    pub(crate) fn new(graph: &'a mut Graph, node: NodeId) -> Self {
        Self { graph, node }
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    /// Name of the node being edited
    pub fn name(&self) -> String {
        self.graph
            .name_of(self.node)
            .unwrap_or_default()
            .to_string()
    }

    pub fn node(&self) -> Result<&Node> {
        self.graph
            .node_by_id(self.node)
            .ok_or_else(|| EngineError::NodeNotFound(self.node.to_string()))
    }

    pub fn node_mut(&mut self) -> Result<&mut Node> {
        let id = self.node;
        self.graph
            .node_by_id_mut(id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))
    }

    pub fn graph(&self) -> &Graph {
        self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        self.graph
    }
}
