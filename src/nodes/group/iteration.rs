//! Composite group node
//!
//! Linking captures the subgraph between a named inputs boundary and the
//! outputs boundary reachable from it, mirrors the boundaries' linked sockets
//! onto the composite, and caches the interior update list under the
//! composite's id. Processing hands the composite's inputs to the inputs
//! boundary, runs the interior list and collects the outputs boundary's inputs.
//! In iteration mode the interior runs `count` times, and between passes each
//! outputs-boundary input is fed back into the inputs-boundary output at the
//! same position.

use log::{debug, info, warn};

use super::{find_outputs_boundary, BoundarySearch};
use crate::config::EngineConfig;
use crate::constants::group;
use crate::error::{EngineError, Result};
use crate::nodes::cache::CachedSubgraph;
use crate::nodes::context::{EditContext, NodeContext};
use crate::nodes::dependency;
use crate::nodes::graph::Graph;
use crate::nodes::node::{BoundaryRole, Node, NodeId, NodeProcessor, NodeState};
use crate::nodes::socket::{Socket, SocketDirection};
use crate::nodes::value::SocketValue;

/// How often the interior runs per `process` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// One pass
    Single,
    /// `count` passes with feedback in between
    Iterate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Boundaries {
    inputs: NodeId,
    outputs: NodeId,
}

/// Composite node evaluating a captured group
#[derive(Debug, Clone)]
pub struct GroupNode {
    inputs_boundary: String,
    mode: GroupMode,
    default_iterations: usize,
    max_iterations: usize,
    linked: Option<Boundaries>,
    /// Set when the last `link` failed, so the node reads as INACTIVE
    link_failed: bool,
}

impl GroupNode {
    /// Single-pass group over the subgraph starting at `inputs_boundary`
    pub fn new(inputs_boundary: impl Into<String>) -> Self {
        Self {
            inputs_boundary: inputs_boundary.into(),
            mode: GroupMode::Single,
            default_iterations: 1,
            max_iterations: group::MAX_ITERATIONS,
            linked: None,
            link_failed: false,
        }
    }

    /// Iteration node starting with `count` passes
    pub fn iteration(inputs_boundary: impl Into<String>, count: usize) -> Self {
        Self {
            mode: GroupMode::Iterate,
            default_iterations: count,
            ..Self::new(inputs_boundary)
        }
    }

    /// Iteration node using the configured default and maximum loop counts
    pub fn iteration_from_config(inputs_boundary: impl Into<String>, config: &EngineConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            ..Self::iteration(inputs_boundary, config.default_iterations)
        }
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    /// Name of the inputs boundary this node links to
    pub fn inputs_boundary(&self) -> &str {
        &self.inputs_boundary
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    /// Loop count for this call, read from the `count` property and clamped
    fn iterations(&self, ctx: &NodeContext<'_>) -> usize {
        match self.mode {
            GroupMode::Single => 1,
            GroupMode::Iterate => {
                let requested = ctx
                    .property(group::COUNT_PROPERTY)
                    .and_then(SocketValue::first_scalar)
                    .map(|n| n.round().max(0.0) as usize)
                    .unwrap_or(self.default_iterations);
                let max = self.max_iterations.max(1);
                if requested > max {
                    warn!("'{}' asked for {} passes, clamping to {}", ctx.name(), requested, max);
                }
                requested.clamp(1, max)
            }
        }
    }

    fn capture(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let name = ctx.name();
        let composite = ctx.node_id();
        let graph = ctx.graph();

        let inputs = graph
            .id_of(&self.inputs_boundary)
            .ok_or_else(|| EngineError::NodeNotFound(self.inputs_boundary.clone()))?;
        if graph.node_by_id(inputs).and_then(Node::boundary) != Some(BoundaryRole::Inputs) {
            return Err(EngineError::InvalidGroup {
                node: name,
                reason: format!("'{}' is not a group inputs node", self.inputs_boundary),
            });
        }
        if let Some(owner) = graph.cache().owner_of(inputs).filter(|owner| *owner != composite) {
            return Err(EngineError::InvalidGroup {
                node: name,
                reason: format!(
                    "'{}' is already captured by '{}'",
                    self.inputs_boundary,
                    graph.name_of(owner).unwrap_or_default()
                ),
            });
        }

        let outputs = match find_outputs_boundary(graph, inputs) {
            BoundarySearch::Found(id) => id,
            BoundarySearch::NotFound => {
                return Err(EngineError::BoundaryNotFound {
                    inputs: self.inputs_boundary.clone(),
                })
            }
            BoundarySearch::Ambiguous(ids) => {
                let names: Vec<&str> = ids.iter().filter_map(|id| graph.name_of(*id)).collect();
                return Err(EngineError::InvalidGroup {
                    node: name,
                    reason: format!("several outputs nodes are reachable: {}", names.join(", ")),
                });
            }
        };

        let update_list = interior_list(graph, &name, composite, inputs, outputs)?;
        let mirrored_inputs = linked_sockets(graph, inputs, SocketDirection::Output)
            .into_iter()
            .map(|s| Socket::input(s.name, s.kind))
            .collect();
        let mirrored_outputs = linked_sockets(graph, outputs, SocketDirection::Input)
            .into_iter()
            .map(|s| Socket::output(s.name, s.kind))
            .collect();

        let node = ctx.node_mut()?;
        node.inputs = mirrored_inputs;
        node.outputs = mirrored_outputs;
        ctx.graph_mut().cache_mut().insert(
            composite,
            CachedSubgraph {
                inputs,
                outputs,
                update_list,
            },
        );
        self.linked = Some(Boundaries { inputs, outputs });
        Ok(())
    }

    fn release(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let composite = ctx.node_id();
        ctx.graph_mut().cache_mut().evict(composite);
        let node = ctx.node_mut()?;
        node.inputs.clear();
        node.outputs.clear();
        node.state = NodeState::NotReady;
        self.linked = None;
        Ok(())
    }
}

/// Linked sockets of a boundary, in order
fn linked_sockets(graph: &Graph, node: NodeId, direction: SocketDirection) -> Vec<Socket> {
    graph
        .node_by_id(node)
        .map(|n| {
            n.sockets(direction)
                .iter()
                .filter(|s| graph.is_linked(node, direction, &s.name))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Ordered interior of a group, boundaries excluded: nodes downstream of the
/// inputs boundary that also feed the outputs boundary. Consumers of interior
/// nodes that do not lead to the outputs boundary stay in the outer graph.
fn interior_list(
    graph: &Graph,
    name: &str,
    composite: NodeId,
    inputs: NodeId,
    outputs: NodeId,
) -> Result<Vec<NodeId>> {
    let list = dependency::resolve_within(graph, &[inputs], composite)?;
    if !list.contains(&outputs) {
        return Err(EngineError::InvalidGroup {
            node: name.to_string(),
            reason: "outputs node is not downstream of the inputs node".to_string(),
        });
    }
    if list.contains(&composite) {
        return Err(EngineError::InvalidGroup {
            node: name.to_string(),
            reason: "the group feeds back into its own node".to_string(),
        });
    }
    let upstream = dependency::upstream_within(graph, outputs, composite);
    Ok(list
        .into_iter()
        .filter(|id| *id != inputs && *id != outputs && upstream.contains(id))
        .collect())
}

/// Socket pairs (outputs-boundary input, inputs-boundary output) fed back
/// between passes: matched by position, both ends linked
fn feedback_pairs(graph: &Graph, boundaries: Boundaries) -> Vec<(String, String)> {
    let (Some(inputs), Some(outputs)) = (
        graph.node_by_id(boundaries.inputs),
        graph.node_by_id(boundaries.outputs),
    ) else {
        return Vec::new();
    };
    outputs
        .inputs
        .iter()
        .zip(inputs.outputs.iter())
        .filter(|(o, i)| {
            graph.is_linked(boundaries.outputs, SocketDirection::Input, &o.name)
                && graph.is_linked(boundaries.inputs, SocketDirection::Output, &i.name)
        })
        .map(|(o, i)| (o.name.clone(), i.name.clone()))
        .collect()
}

impl NodeProcessor for GroupNode {
    fn type_id(&self) -> &'static str {
        match self.mode {
            GroupMode::Single => "group.node",
            GroupMode::Iterate => "group.iteration",
        }
    }

    fn init(&mut self, node: &mut Node) {
        if self.mode == GroupMode::Iterate {
            node.properties.insert(
                group::COUNT_PROPERTY.to_string(),
                SocketValue::scalar(self.default_iterations as f64),
            );
        }
    }

    fn process(&mut self, ctx: &mut NodeContext<'_>) -> Result<()> {
        let id = ctx.node_id();
        let name = ctx.name().to_string();
        let boundaries = self.linked.ok_or_else(|| EngineError::MissingDependency {
            node: name.clone(),
            reason: "group is not linked".to_string(),
        })?;
        let update_list = ctx
            .graph_mut()
            .cache_mut()
            .get(id)
            .map(|cached| cached.update_list.clone())
            .ok_or_else(|| EngineError::MissingDependency {
                node: name.clone(),
                reason: "no cached update list".to_string(),
            })?;

        let inputs: Vec<String> = ctx
            .node()?
            .inputs
            .iter()
            .filter(|s| ctx.is_input_linked(&s.name))
            .map(|s| s.name.clone())
            .collect();
        for socket in &inputs {
            let value = ctx.fetch(socket, None, false)?.into_shared();
            ctx.graph_mut().write_output(boundaries.inputs, socket, value)?;
        }

        let count = self.iterations(ctx);
        let feedback = feedback_pairs(ctx.graph(), boundaries);
        debug!("Group '{}' running {} pass(es) over {} node(s)", name, count, update_list.len());
        for pass in 0..count {
            ctx.run_nested(&update_list)?;
            if ctx.is_cancelled() {
                return Ok(());
            }
            if pass + 1 == count {
                break;
            }
            for (from, to) in &feedback {
                let read = ctx.graph().read_input(boundaries.outputs, from, None, false);
                match read {
                    Ok(data) => ctx
                        .graph_mut()
                        .write_output(boundaries.inputs, to, data.into_shared())?,
                    Err(err) => debug!("No feedback for '{}' after pass {}: {}", to, pass + 1, err),
                }
            }
        }

        let outputs: Vec<String> = ctx
            .node()?
            .outputs
            .iter()
            .filter(|s| ctx.is_output_linked(&s.name))
            .map(|s| s.name.clone())
            .collect();
        for socket in &outputs {
            let value = ctx
                .graph()
                .read_input(boundaries.outputs, socket, None, false)?
                .into_shared();
            ctx.set_shared(socket, value)?;
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        let Some(boundaries) = self.linked else {
            // a duplicate carries the original's mirrored sockets
            let node = ctx.node_mut()?;
            node.inputs.clear();
            node.outputs.clear();
            return Ok(());
        };
        let name = ctx.name();
        let composite = ctx.node_id();
        let graph = ctx.graph();
        if graph.node_by_id(boundaries.inputs).is_none() || graph.node_by_id(boundaries.outputs).is_none() {
            warn!("Group '{}' lost a boundary node, unlinking", name);
            return self.release(ctx);
        }

        match interior_list(graph, &name, composite, boundaries.inputs, boundaries.outputs) {
            Ok(update_list) => {
                ctx.graph_mut().cache_mut().insert(
                    composite,
                    CachedSubgraph {
                        inputs: boundaries.inputs,
                        outputs: boundaries.outputs,
                        update_list,
                    },
                );
                Ok(())
            }
            Err(err) => {
                ctx.graph_mut().cache_mut().evict(composite);
                Err(err)
            }
        }
    }

    fn link(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        if self.linked.is_some() {
            self.release(ctx)?;
        }
        let captured = self.capture(ctx);
        self.link_failed = captured.is_err();
        match captured {
            Ok(()) => {
                info!("Linked group '{}' to '{}'", ctx.name(), self.inputs_boundary);
                Ok(())
            }
            Err(err) => {
                ctx.node_mut()?.state = NodeState::Inactive;
                Err(err)
            }
        }
    }

    fn unlink(&mut self, ctx: &mut EditContext<'_>) -> Result<()> {
        self.link_failed = false;
        self.release(ctx)
    }

    fn ready(&self) -> bool {
        self.linked.is_some() || self.link_failed
    }

    fn clone_box(&self) -> Box<dyn NodeProcessor> {
        Box::new(Self {
            linked: None,
            link_failed: false,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::group::{GroupInputsNode, GroupOutputsNode};
    use crate::nodes::library::{IntegerNode, ScalarMathNode};

    fn group_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
        graph.add_node(Node::new("M", ScalarMathNode::add())).unwrap();
        graph.add_node(Node::new("Out", GroupOutputsNode::new())).unwrap();
        graph.add_link("In", "Data1", "M", "A").unwrap();
        graph.add_link("M", "Result", "Out", "Data1").unwrap();
        graph.add_node(Node::new("Loop", GroupNode::iteration("In", 3))).unwrap();
        graph
    }

    #[test]
    fn link_caches_the_interior() {
        let mut graph = group_graph();
        graph.link_group("Loop").unwrap();

        let id = graph.id_of("Loop").unwrap();
        let cached = graph.cache().peek(id).unwrap();
        assert_eq!(cached.update_list, vec![graph.id_of("M").unwrap()]);

        let node = graph.node("Loop").unwrap();
        assert_eq!(node.inputs.len(), 1);
        assert_eq!(node.inputs[0].name, "Data1");
        assert_eq!(node.outputs[0].name, "Data1");
        assert_eq!(node.state, NodeState::Inactive);
    }

    #[test]
    fn link_without_outputs_boundary() {
        let mut graph = Graph::new();
        graph.add_node(Node::new("In", GroupInputsNode::new())).unwrap();
        graph.add_node(Node::new("Loop", GroupNode::new("In"))).unwrap();

        let err = graph.link_group("Loop").unwrap_err();
        assert_eq!(err, EngineError::BoundaryNotFound { inputs: "In".into() });
        assert!(graph.cache().is_empty());
        assert_eq!(graph.node("Loop").unwrap().state, NodeState::Inactive);
    }

    #[test]
    fn link_to_a_non_boundary_node() {
        let mut graph = group_graph();
        graph.add_node(Node::new("Loop2", GroupNode::new("M"))).unwrap();
        assert!(matches!(
            graph.link_group("Loop2"),
            Err(EngineError::InvalidGroup { .. })
        ));
    }

    #[test]
    fn unlink_releases_everything() {
        let mut graph = group_graph();
        graph.add_node(Node::new("Seed", IntegerNode::new(1))).unwrap();
        graph.link_group("Loop").unwrap();
        graph.add_link("Seed", "Integer", "Loop", "Data1").unwrap();

        graph.unlink_group("Loop").unwrap();
        let node = graph.node("Loop").unwrap();
        assert!(node.inputs.is_empty());
        assert_eq!(node.state, NodeState::NotReady);
        assert!(graph.cache().is_empty());
        // the external link went with the socket
        let seed = graph.id_of("Seed").unwrap();
        assert!(graph.successors(seed).is_empty());
    }

    #[test]
    fn duplicate_starts_unlinked() {
        let mut graph = group_graph();
        graph.link_group("Loop").unwrap();
        let copy = graph.duplicate_node("Loop", "Loop.001").unwrap();

        assert!(!graph.cache().contains(copy));
        let duplicate = graph.node("Loop.001").unwrap();
        assert_eq!(duplicate.state, NodeState::NotReady);
        assert!(duplicate.inputs.is_empty());
    }

    #[test]
    fn removing_an_interior_node_recaptures() {
        let mut graph = group_graph();
        graph.add_node(Node::new("K", ScalarMathNode::add())).unwrap();
        graph.add_link("In", "Data2", "K", "A").unwrap();
        graph.add_link("K", "Result", "Out", "Data2").unwrap();
        graph.link_group("Loop").unwrap();

        let id = graph.id_of("Loop").unwrap();
        let m = graph.id_of("M").unwrap();
        let k = graph.id_of("K").unwrap();
        assert_eq!(graph.cache().peek(id).unwrap().update_list, vec![m, k]);
        let before = graph.cache().statistics().cache_invalidations;

        graph.remove_node("K").unwrap();
        assert!(graph.cache().statistics().cache_invalidations > before);
        assert_eq!(graph.cache().peek(id).unwrap().update_list, vec![m]);
    }

    #[test]
    fn relink_after_removing_boundary() {
        let mut graph = group_graph();
        graph.link_group("Loop").unwrap();
        graph.remove_node("Out").unwrap();

        let id = graph.id_of("Loop").unwrap();
        assert!(!graph.cache().contains(id));
        assert_eq!(graph.node("Loop").unwrap().state, NodeState::NotReady);
    }
}
