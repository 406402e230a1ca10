//! Node types and the capability trait concrete nodes implement

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::context::{EditContext, NodeContext};
use super::multi_socket::MultiSocket;
use super::socket::{Socket, SocketDirection};
use super::value::SocketValue;
use crate::error::Result;

/// Stable per-instance identifier.
///
/// Survives renames, is never copied on duplication, and keys every
/// node-local cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Issues a fresh identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// Not yet structurally checked
    NotReady,
    /// Present but not live: required inputs or all outputs unlinked
    Inactive,
    /// Live in the current graph
    Active,
    /// Last `process` call raised an evaluation error
    Failed,
}

/// Which side of a group a boundary pseudo-node sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryRole {
    /// Exposes the group's inputs as its output sockets
    Inputs,
    /// Collects the group's outputs on its input sockets
    Outputs,
}

/// Capability set a concrete node type provides to the engine.
///
/// `process` is the only hook that reads inputs and writes outputs. The
/// structural hooks (`update`, `link`, `unlink`) run between executions.
pub trait NodeProcessor {
    /// Type identifier, independent of the user-visible node name
    fn type_id(&self) -> &'static str;

    /// Declare sockets and properties on a freshly created node
    fn init(&mut self, _node: &mut Node) {}

    /// Evaluate the node
    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()>;

    /// Called after every structural edit, once the node's multi-sockets are adjusted
    fn update(&mut self, _ctx: &mut EditContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Group-like nodes capture their subgraph here
    fn link(&mut self, _ctx: &mut EditContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Release whatever `link` captured
    fn unlink(&mut self, _ctx: &mut EditContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Set for group boundary pseudo-nodes
    fn boundary(&self) -> Option<BoundaryRole> {
        None
    }

    /// Sinks have no outputs but are still live once their inputs are satisfied
    fn is_sink(&self) -> bool {
        false
    }

    /// A node that is not ready stays NOT_READY whatever its links say
    fn ready(&self) -> bool {
        true
    }

    /// Clone the processor for node duplication
    fn clone_box(&self) -> Box<dyn NodeProcessor>;
}

/// A named, typed unit of computation in a graph
pub struct Node {
    id: NodeId,
    pub name: String,
    pub inputs: Vec<Socket>,
    pub outputs: Vec<Socket>,
    pub state: NodeState,
    /// Parameters that unlinked inputs can bind their defaults to
    pub properties: BTreeMap<String, SocketValue>,
    /// Re-evaluated on every frame change
    pub animated: bool,
    /// Growable input sequence, if any
    pub multi_inputs: Option<MultiSocket>,
    /// Growable output sequence, if any
    pub multi_outputs: Option<MultiSocket>,
    type_id: &'static str,
    processor: Option<Box<dyn NodeProcessor>>,
}

impl Node {
    /// Creates a new node and lets the processor declare its sockets
    pub fn new(name: impl Into<String>, processor: impl NodeProcessor + 'static) -> Self {
        Self::from_boxed(name, Box::new(processor))
    }

    /// Creates a node from an already boxed processor
    pub fn from_boxed(name: impl Into<String>, mut processor: Box<dyn NodeProcessor>) -> Self {
        let mut node = Self {
            id: NodeId::new(),
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            state: NodeState::NotReady,
            properties: BTreeMap::new(),
            animated: false,
            multi_inputs: None,
            multi_outputs: None,
            type_id: processor.type_id(),
            processor: None,
        };
        processor.init(&mut node);
        node.processor = Some(processor);
        node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_id(&self) -> &'static str {
        self.type_id
    }

    /// Adds an input socket
    pub fn add_input(&mut self, socket: Socket) -> &mut Self {
        debug_assert!(socket.is_input());
        self.inputs.push(socket);
        self
    }

    /// Adds an output socket
    pub fn add_output(&mut self, socket: Socket) -> &mut Self {
        debug_assert!(socket.is_output());
        self.outputs.push(socket);
        self
    }

    /// Sets a property value
    pub fn with_property(mut self, name: impl Into<String>, value: SocketValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Marks the node as frame-dependent
    pub fn animated(mut self) -> Self {
        self.animated = true;
        self
    }

    pub fn sockets(&self, direction: SocketDirection) -> &Vec<Socket> {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    pub fn sockets_mut(&mut self, direction: SocketDirection) -> &mut Vec<Socket> {
        match direction {
            SocketDirection::Input => &mut self.inputs,
            SocketDirection::Output => &mut self.outputs,
        }
    }

    pub fn socket(&self, direction: SocketDirection, name: &str) -> Option<&Socket> {
        self.sockets(direction).iter().find(|s| s.name == name)
    }

    pub fn socket_mut(&mut self, direction: SocketDirection, name: &str) -> Option<&mut Socket> {
        self.sockets_mut(direction).iter_mut().find(|s| s.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&Socket> {
        self.socket(SocketDirection::Input, name)
    }

    pub fn output(&self, name: &str) -> Option<&Socket> {
        self.socket(SocketDirection::Output, name)
    }

    pub fn multi_socket(&self, direction: SocketDirection) -> Option<&MultiSocket> {
        match direction {
            SocketDirection::Input => self.multi_inputs.as_ref(),
            SocketDirection::Output => self.multi_outputs.as_ref(),
        }
    }

    /// Boundary role reported by the processor
    pub fn boundary(&self) -> Option<BoundaryRole> {
        self.processor.as_ref().and_then(|p| p.boundary())
    }

    /// Whether the processor is a sink
    pub fn is_sink(&self) -> bool {
        self.processor.as_ref().map(|p| p.is_sink()).unwrap_or(false)
    }

    /// Whether the processor considers itself ready for evaluation
    pub fn is_ready(&self) -> bool {
        self.processor.as_ref().map(|p| p.ready()).unwrap_or(true)
    }

    /// Copy of the node under a new name with a fresh instance id.
    ///
    /// Output values and lifecycle state are not carried over.
    pub fn duplicate(&self, name: impl Into<String>) -> Option<Node> {
        let processor = self.processor.as_ref()?.clone_box();
        let mut inputs = self.inputs.clone();
        let mut outputs = self.outputs.clone();
        inputs.iter_mut().chain(outputs.iter_mut()).for_each(Socket::clear);
        Some(Self {
            id: NodeId::new(),
            name: name.into(),
            inputs,
            outputs,
            state: NodeState::NotReady,
            properties: self.properties.clone(),
            animated: self.animated,
            multi_inputs: self.multi_inputs.clone(),
            multi_outputs: self.multi_outputs.clone(),
            type_id: self.type_id,
            processor: Some(processor),
        })
    }

    pub(crate) fn take_processor(&mut self) -> Option<Box<dyn NodeProcessor>> {
        self.processor.take()
    }

    pub(crate) fn restore_processor(&mut self, processor: Box<dyn NodeProcessor>) {
        self.processor = Some(processor);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("state", &self.state)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
