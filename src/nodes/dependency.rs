//! Dependency resolution
//!
//! Computes the ordered update list for a set of trigger nodes: every node
//! reachable downstream of a trigger, topologically sorted. Independent nodes
//! keep graph insertion order.
//!
//! Nodes captured by a linked composite node are sealed: from outside they
//! resolve to the composite that owns them, so their interior links never
//! take part in the outer ordering.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::graph::Graph;
use super::node::NodeId;
use crate::error::{EngineError, Result};

/// Ordered update list, by node name, for the given triggers
pub fn make_update_list(triggers: &[&str], graph: &Graph) -> Result<Vec<String>> {
    let ids = triggers
        .iter()
        .map(|name| {
            graph
                .id_of(name)
                .ok_or_else(|| EngineError::NodeNotFound(name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    let list = resolve(graph, &ids)?;
    Ok(list
        .into_iter()
        .filter_map(|id| graph.name_of(id).map(str::to_string))
        .collect())
}

/// Ordered update list, by id, for the given triggers
pub fn resolve(graph: &Graph, triggers: &[NodeId]) -> Result<Vec<NodeId>> {
    resolve_scoped(graph, triggers, None)
}

/// Like [`resolve`], but treats the nodes sealed by `scope` as ordinary
/// nodes. Used by a composite node to order its own interior.
pub fn resolve_within(graph: &Graph, triggers: &[NodeId], scope: NodeId) -> Result<Vec<NodeId>> {
    resolve_scoped(graph, triggers, Some(scope))
}

/// Update list covering the whole graph
pub fn full_update_list(graph: &Graph) -> Result<Vec<NodeId>> {
    resolve(graph, graph.node_ids())
}

/// The node standing in for `node` from the point of view of `scope`
fn representative(graph: &Graph, node: NodeId, scope: Option<NodeId>) -> NodeId {
    let mut current = node;
    let mut seen = HashSet::new();
    while Some(current) != scope && seen.insert(current) {
        match graph.cache().owner_of(current) {
            Some(owner) if Some(owner) != scope => current = owner,
            _ => break,
        }
    }
    current
}

/// Nodes from which `target` can be reached, `target` included. Sealed
/// nodes are seen through their owner, as in [`resolve_within`].
pub fn upstream_within(graph: &Graph, target: NodeId, scope: NodeId) -> HashSet<NodeId> {
    let (reps, edges) = condensed(graph, Some(scope));
    let mut reverse: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for (from, targets) in &edges {
        for to in targets {
            reverse.entry(*to).or_default().push(*from);
        }
    }

    let start = reps.get(&target).copied().unwrap_or(target);
    let mut upstream = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for prev in reverse.get(&node).into_iter().flatten() {
            if upstream.insert(*prev) {
                stack.push(*prev);
            }
        }
    }
    upstream
}

type Condensed = (HashMap<NodeId, NodeId>, HashMap<NodeId, Vec<NodeId>>);

/// Representatives of every node and the links between them; links inside a
/// sealed region collapse onto its owner
fn condensed(graph: &Graph, scope: Option<NodeId>) -> Condensed {
    let reps: HashMap<NodeId, NodeId> = graph
        .node_ids()
        .iter()
        .map(|id| (*id, representative(graph, *id, scope)))
        .collect();

    let mut edges: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for link in graph.links() {
        let (Some(from), Some(to)) = (reps.get(&link.from.node), reps.get(&link.to.node)) else {
            continue;
        };
        if from != to {
            edges.entry(*from).or_default().push(*to);
        }
    }
    (reps, edges)
}

/// Of the nodes left over by Kahn's algorithm, those lying on a cycle
/// rather than merely downstream of one
fn on_cycle(stuck: &HashSet<NodeId>, edges: &HashMap<NodeId, Vec<NodeId>>) -> Vec<NodeId> {
    let successors = |node: &NodeId| {
        edges
            .get(node)
            .into_iter()
            .flatten()
            .filter(|next| stuck.contains(next))
            .copied()
            .collect::<Vec<_>>()
    };
    stuck
        .iter()
        .filter(|node| {
            let mut seen = HashSet::new();
            let mut stack = successors(*node);
            while let Some(next) = stack.pop() {
                if next == **node {
                    return true;
                }
                if seen.insert(next) {
                    stack.extend(successors(&next));
                }
            }
            false
        })
        .copied()
        .collect()
}

fn resolve_scoped(graph: &Graph, triggers: &[NodeId], scope: Option<NodeId>) -> Result<Vec<NodeId>> {
    for id in triggers {
        if graph.node_by_id(*id).is_none() {
            return Err(EngineError::NodeNotFound(id.to_string()));
        }
    }

    let (reps, edges) = condensed(graph, scope);
    let rank_of: HashMap<NodeId, usize> = graph
        .node_ids()
        .iter()
        .enumerate()
        .map(|(rank, id)| (*id, rank))
        .collect();
    let rank = |id: &NodeId| rank_of.get(id).copied().unwrap_or(usize::MAX);

    // forward reachability
    let mut affected: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    for trigger in triggers {
        let rep = reps.get(trigger).copied().unwrap_or(*trigger);
        if affected.insert(rep) {
            queue.push_back(rep);
        }
    }
    while let Some(node) = queue.pop_front() {
        for next in edges.get(&node).into_iter().flatten() {
            if affected.insert(*next) {
                queue.push_back(*next);
            }
        }
    }

    // Kahn's algorithm over the affected set
    let mut in_degree: HashMap<NodeId, usize> = affected.iter().map(|id| (*id, 0)).collect();
    for (from, targets) in &edges {
        if !affected.contains(from) {
            continue;
        }
        for to in targets {
            if let Some(degree) = in_degree.get_mut(to) {
                *degree += 1;
            }
        }
    }

    let mut ready: BTreeSet<(usize, NodeId)> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| (rank(id), *id))
        .collect();
    let mut result = Vec::with_capacity(affected.len());
    while let Some((_, node)) = ready.pop_first() {
        result.push(node);
        for next in edges.get(&node).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert((rank(next), *next));
                }
            }
        }
    }

    if result.len() != affected.len() {
        let stuck: HashSet<NodeId> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(id, _)| id)
            .collect();
        let mut cycle = on_cycle(&stuck, &edges);
        cycle.sort_by_key(|id| rank(id));
        return Err(EngineError::CycleDetected {
            nodes: cycle
                .into_iter()
                .filter_map(|id| graph.name_of(id).map(str::to_string))
                .collect(),
        });
    }

    Ok(result)
}
