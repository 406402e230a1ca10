//! Node graph data structures and operations

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::cache::{CacheKeyPattern, NodeCache};
use super::context::EditContext;
use super::multi_socket;
use super::node::{Node, NodeId, NodeProcessor, NodeState};
use super::socket::SocketDirection;
use super::value::{DataKind, SocketData, SocketValue};
use crate::error::{EngineError, EvaluationError, Result};

/// One end of a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    pub node: NodeId,
    pub socket: String,
}

impl SocketRef {
    pub fn new(node: NodeId, socket: impl Into<String>) -> Self {
        Self {
            node,
            socket: socket.into(),
        }
    }
}

/// Directed connection from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub from: SocketRef,
    pub to: SocketRef,
}

/// A graph containing nodes and the links between their sockets.
///
/// Nodes are addressed by their unique name at the API surface and by
/// [`NodeId`] internally. Insertion order is kept and used to break ties
/// when ordering independent nodes.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
    order: Vec<NodeId>,
    names: HashMap<String, NodeId>,
    links: Vec<Link>,
    cache: NodeCache,
}

impl Graph {
    /// Creates a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its id
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId> {
        if self.names.contains_key(&node.name) {
            return Err(EngineError::DuplicateNode(node.name));
        }
        let id = node.id();
        node.state = NodeState::NotReady;
        debug!("Adding node '{}' ({})", node.name, node.type_id());
        self.names.insert(node.name.clone(), id);
        self.order.push(id);
        self.nodes.insert(id, node);
        self.refresh()?;
        Ok(id)
    }

    /// Removes a node, its links and its cache entry
    pub fn remove_node(&mut self, name: &str) -> Result<Node> {
        let id = self.require(name)?;
        self.links.retain(|l| l.from.node != id && l.to.node != id);
        self.order.retain(|n| *n != id);
        self.names.remove(name);
        // the node's own entry, and any group that captured it
        self.cache.invalidate(&CacheKeyPattern::Owner(id));
        self.cache.invalidate(&CacheKeyPattern::Member(id));
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))?;
        self.refresh()?;
        Ok(node)
    }

    /// Changes a node's name; its id, links and cache entry stay put
    pub fn rename_node(&mut self, name: &str, new_name: &str) -> Result<()> {
        if name == new_name {
            return Ok(());
        }
        if self.names.contains_key(new_name) {
            return Err(EngineError::DuplicateNode(new_name.to_string()));
        }
        let id = self.require(name)?;
        self.names.remove(name);
        self.names.insert(new_name.to_string(), id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = new_name.to_string();
        }
        Ok(())
    }

    /// Adds an unlinked copy of a node under a new name and a fresh id
    pub fn duplicate_node(&mut self, name: &str, new_name: &str) -> Result<NodeId> {
        let copy = self
            .node(name)
            .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))?
            .duplicate(new_name)
            .ok_or_else(|| EngineError::InvalidLink(format!("node '{}' is busy", name)))?;
        self.add_node(copy)
    }

    /// Links an output socket to an input socket.
    ///
    /// An input holds at most one link, so an existing link into the target is
    /// replaced. The link stays in place even when adjusting multi-sockets
    /// afterwards reports a [`EngineError::TypeMismatch`].
    pub fn add_link(
        &mut self,
        from_node: &str,
        from_socket: &str,
        to_node: &str,
        to_socket: &str,
    ) -> Result<()> {
        let from_id = self.require(from_node)?;
        let to_id = self.require(to_node)?;
        if from_id == to_id {
            return Err(EngineError::InvalidLink(format!(
                "cannot connect node '{}' to itself",
                from_node
            )));
        }

        let from_kind = self.socket_kind(from_id, SocketDirection::Output, from_socket)?;
        let to_kind = self.socket_kind(to_id, SocketDirection::Input, to_socket)?;
        let adaptive = self.is_adaptive(from_id, SocketDirection::Output, from_socket)
            || self.is_adaptive(to_id, SocketDirection::Input, to_socket);
        if !adaptive && !from_kind.can_connect_to(&to_kind) {
            warn!(
                "Rejected link {}.{} ({}) -> {}.{} ({})",
                from_node, from_socket, from_kind, to_node, to_socket, to_kind
            );
            return Err(EngineError::InvalidLink(format!(
                "{}.{} is {} but {}.{} expects {}",
                from_node, from_socket, from_kind, to_node, to_socket, to_kind
            )));
        }

        let to = SocketRef::new(to_id, to_socket);
        self.links.retain(|l| l.to != to);
        self.links.push(Link {
            from: SocketRef::new(from_id, from_socket),
            to,
        });
        debug!("Linked {}.{} -> {}.{}", from_node, from_socket, to_node, to_socket);
        self.refresh()
    }

    /// Removes the link into an input socket
    pub fn remove_link(&mut self, to_node: &str, to_socket: &str) -> Result<Link> {
        let to_id = self.require(to_node)?;
        let index = self
            .links
            .iter()
            .position(|l| l.to.node == to_id && l.to.socket == to_socket)
            .ok_or_else(|| {
                EngineError::InvalidLink(format!("nothing is linked into {}.{}", to_node, to_socket))
            })?;
        let link = self.links.remove(index);
        self.refresh()?;
        Ok(link)
    }

    /// Sets a node property. Not a structural edit.
    pub fn set_property(&mut self, name: &str, key: &str, value: SocketValue) -> Result<NodeId> {
        let id = self.require(name)?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.properties.insert(key.to_string(), value);
        }
        Ok(id)
    }

    /// Runs a composite node's `link` hook to capture its subgraph
    pub fn link_group(&mut self, name: &str) -> Result<()> {
        let id = self.require(name)?;
        let linked = self.with_edit_hook(id, |p, ctx| p.link(ctx));
        let refreshed = self.refresh();
        linked.and(refreshed)
    }

    /// Runs a composite node's `unlink` hook, releasing its subgraph
    pub fn unlink_group(&mut self, name: &str) -> Result<()> {
        let id = self.require(name)?;
        let unlinked = self.with_edit_hook(id, |p, ctx| p.unlink(ctx));
        let refreshed = self.refresh();
        unlinked.and(refreshed)
    }

    /// Re-establish the structural invariants after an edit: drop links to
    /// vanished sockets, adjust multi-sockets, run `update` hooks and
    /// recompute lifecycle states. Every node is visited even when one fails;
    /// the first error is returned.
    pub fn refresh(&mut self) -> Result<()> {
        self.prune_dangling_links();
        let mut first_error = None;
        for id in self.order.clone() {
            let outcome = multi_socket::apply(self, id)
                .and_then(|_| self.with_edit_hook(id, |p, ctx| p.update(ctx)));
            self.apply_state_rule(id);
            if let Err(err) = outcome {
                warn!(
                    "Structural update of '{}' failed: {}",
                    self.name_of(id).unwrap_or_default(),
                    err
                );
                first_error.get_or_insert(err);
            }
        }
        // update hooks may have dropped sockets
        self.prune_dangling_links();
        first_error.map_or(Ok(()), Err)
    }

    /// Node lookup by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|id| self.nodes.get(id))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        let id = *self.names.get(name)?;
        self.nodes.get_mut(&id)
    }

    pub fn node_by_id(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Position of a node in insertion order
    pub fn rank(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// The link feeding an input socket, if any
    pub fn link_into(&self, node: NodeId, socket: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to.node == node && l.to.socket == socket)
    }

    /// Links leaving an output socket
    pub fn links_from<'a>(&'a self, node: NodeId, socket: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links
            .iter()
            .filter(move |l| l.from.node == node && l.from.socket == socket)
    }

    pub fn is_linked(&self, node: NodeId, direction: SocketDirection, socket: &str) -> bool {
        match direction {
            SocketDirection::Input => self.link_into(node, socket).is_some(),
            SocketDirection::Output => self.links_from(node, socket).next().is_some(),
        }
    }

    /// Kinds of the sockets on the far end of a socket's links
    pub fn partner_kinds(&self, node: NodeId, direction: SocketDirection, socket: &str) -> Vec<DataKind> {
        let kind_of = |r: &SocketRef, dir: SocketDirection| {
            self.nodes
                .get(&r.node)
                .and_then(|n| n.socket(dir, &r.socket))
                .map(|s| s.kind.clone())
        };
        match direction {
            SocketDirection::Input => self
                .link_into(node, socket)
                .and_then(|l| kind_of(&l.from, SocketDirection::Output))
                .into_iter()
                .collect(),
            SocketDirection::Output => self
                .links_from(node, socket)
                .filter_map(|l| kind_of(&l.to, SocketDirection::Input))
                .collect(),
        }
    }

    /// Distinct downstream neighbours, in link order
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for link in self.links.iter().filter(|l| l.from.node == node) {
            if !out.contains(&link.to.node) {
                out.push(link.to.node);
            }
        }
        out
    }

    /// Distinct upstream neighbours, in link order
    pub fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for link in self.links.iter().filter(|l| l.to.node == node) {
            if !out.contains(&link.from.node) {
                out.push(link.from.node);
            }
        }
        out
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut NodeCache {
        &mut self.cache
    }

    /// Read an input socket.
    ///
    /// A linked input yields the producer's current value: a shared handle
    /// unless `deepcopy` is set. An unlinked input falls back to its bound
    /// property, then its socket default, then `default`. Reading a linked
    /// input whose producer has not stored anything yet is an evaluation error.
    pub fn read_input(
        &self,
        node: NodeId,
        input: &str,
        default: Option<SocketValue>,
        deepcopy: bool,
    ) -> std::result::Result<SocketData, EvaluationError> {
        let owner = self
            .nodes
            .get(&node)
            .ok_or_else(|| EvaluationError::new(format!("unknown node {}", node)))?;
        let socket = owner.input(input).ok_or_else(|| {
            EvaluationError::new(format!("node '{}' has no input socket '{}'", owner.name, input))
        })?;

        if let Some(link) = self.link_into(node, input) {
            let value = self.output_value(link.from.node, &link.from.socket);
            return match value {
                Some(value) if deepcopy => Ok(SocketData::Owned((*value).clone())),
                Some(value) => Ok(SocketData::Shared(value)),
                None => Err(EvaluationError::no_data(&owner.name, input)),
            };
        }

        socket
            .prop_name
            .as_ref()
            .and_then(|prop| owner.properties.get(prop))
            .or(socket.default.as_ref())
            .cloned()
            .or(default)
            .map(SocketData::Owned)
            .ok_or_else(|| EvaluationError::no_data(&owner.name, input))
    }

    /// The value currently stored on an output socket
    pub fn output_value(&self, node: NodeId, output: &str) -> Option<Rc<SocketValue>> {
        self.nodes
            .get(&node)
            .and_then(|n| n.output(output))
            .and_then(|s| s.value().cloned())
    }

    /// Store a value on an output socket
    pub fn write_output(&mut self, node: NodeId, output: &str, value: Rc<SocketValue>) -> Result<()> {
        let owner = self
            .nodes
            .get_mut(&node)
            .ok_or_else(|| EngineError::NodeNotFound(node.to_string()))?;
        let name = owner.name.clone();
        let socket = owner
            .socket_mut(SocketDirection::Output, output)
            .ok_or_else(|| EngineError::SocketNotFound {
                node: name,
                socket: output.to_string(),
                direction: SocketDirection::Output.as_str(),
            })?;
        socket.store(value);
        Ok(())
    }

    /// Lifecycle state the link topology gives a node: live once every
    /// required input is linked and something consumes its result.
    pub fn structural_state(&self, id: NodeId) -> NodeState {
        let Some(node) = self.nodes.get(&id) else {
            return NodeState::NotReady;
        };
        if !node.is_ready() {
            return NodeState::NotReady;
        }
        let inputs_ok = node
            .inputs
            .iter()
            .filter(|s| s.is_required())
            .all(|s| self.is_linked(id, SocketDirection::Input, &s.name));
        let outputs_ok = node.is_sink()
            || node
                .outputs
                .iter()
                .any(|s| self.is_linked(id, SocketDirection::Output, &s.name));
        if inputs_ok && outputs_ok {
            NodeState::Active
        } else {
            NodeState::Inactive
        }
    }

    /// A failed node keeps its state until it evaluates successfully again
    pub(crate) fn apply_state_rule(&mut self, id: NodeId) {
        let structural = self.structural_state(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.state = match (node.state, structural) {
                (NodeState::Failed, NodeState::Active) => NodeState::Failed,
                (_, state) => state,
            };
        }
    }

    /// Run one of a node's structural hooks with the processor taken out of
    /// the node, so the hook can edit the graph the node lives in.
    pub(crate) fn with_edit_hook<F>(&mut self, id: NodeId, hook: F) -> Result<()>
    where
        F: FnOnce(&mut Box<dyn NodeProcessor>, &mut EditContext<'_>) -> Result<()>,
    {
        let Some(mut processor) = self.nodes.get_mut(&id).and_then(Node::take_processor) else {
            return Ok(());
        };
        let result = {
            let mut ctx = EditContext::new(self, id);
            hook(&mut processor, &mut ctx)
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.restore_processor(processor);
        }
        result
    }

    fn require(&self, name: &str) -> Result<NodeId> {
        self.id_of(name)
            .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))
    }

    fn socket_kind(&self, id: NodeId, direction: SocketDirection, socket: &str) -> Result<DataKind> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| EngineError::NodeNotFound(id.to_string()))?;
        node.socket(direction, socket)
            .map(|s| s.kind.clone())
            .ok_or_else(|| EngineError::SocketNotFound {
                node: node.name.clone(),
                socket: socket.to_string(),
                direction: direction.as_str(),
            })
    }

    /// Whether a socket belongs to a multi-socket sequence that follows its partners' kinds
    fn is_adaptive(&self, id: NodeId, direction: SocketDirection, socket: &str) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let Some(multi) = node.multi_socket(direction) else {
            return false;
        };
        multi.adapt_kind
            && node
                .sockets(direction)
                .iter()
                .position(|s| s.name == socket)
                .is_some_and(|index| index >= multi.start)
    }

    fn prune_dangling_links(&mut self) {
        let nodes = &self.nodes;
        let exists = |r: &SocketRef, direction: SocketDirection| {
            nodes
                .get(&r.node)
                .is_some_and(|n| n.socket(direction, &r.socket).is_some())
        };
        let before = self.links.len();
        self.links.retain(|l| {
            exists(&l.from, SocketDirection::Output) && exists(&l.to, SocketDirection::Input)
        });
        if self.links.len() != before {
            debug!("Dropped {} dangling link(s)", before - self.links.len());
        }
    }
}
