//! Growable socket sequences
//!
//! A node may declare that the tail of its input or output list grows with its
//! links: there is always exactly one unlinked sentinel at the end, and trailing
//! unlinked sockets are pruned back to `min_sockets`. Planning is a pure
//! function of the current link state; [`apply`] carries the plan out on a
//! graph after every structural edit.

use log::debug;
use serde::{Deserialize, Serialize};

use super::graph::Graph;
use super::node::NodeId;
use super::socket::{Socket, SocketDirection};
use super::value::DataKind;
use crate::error::{EngineError, Result};

/// Configuration of a growable socket sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiSocket {
    /// New sockets are named `{base_name}{n}`
    pub base_name: String,
    /// Kind given to freshly appended sockets
    pub kind: DataKind,
    /// The sequence never shrinks below this
    pub min_sockets: usize,
    /// Number of leading fixed sockets that are not part of the sequence
    pub start: usize,
    /// Re-create linked sockets with the kind of the socket they link to
    pub adapt_kind: bool,
}

impl MultiSocket {
    /// Creates a sequence starting at the first socket
    pub fn new(base_name: impl Into<String>, kind: DataKind, min_sockets: usize) -> Self {
        Self {
            base_name: base_name.into(),
            kind,
            min_sockets,
            start: 0,
            adapt_kind: false,
        }
    }

    /// Leave the first `start` sockets alone
    pub fn after(mut self, start: usize) -> Self {
        self.start = start;
        self
    }

    /// Follow the kind of linked partners
    pub fn adapting(mut self) -> Self {
        self.adapt_kind = true;
        self
    }

    /// Name of the socket at `position` within the sequence
    pub fn socket_name(&self, position: usize) -> String {
        format!("{}{}", self.base_name, position + 1)
    }
}

/// Link state of one socket in a sequence, as seen by the planner
#[derive(Debug, Clone, PartialEq)]
pub struct SocketSlot {
    pub name: String,
    pub kind: DataKind,
    /// Kinds on the far end of every link attached to this socket
    pub partner_kinds: Vec<DataKind>,
}

impl SocketSlot {
    pub fn is_linked(&self) -> bool {
        !self.partner_kinds.is_empty()
    }
}

/// What has to change for a sequence to satisfy its invariant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SocketPlan {
    /// Names of sockets to append, in order
    pub append: Vec<String>,
    /// Number of trailing sockets to remove
    pub prune: usize,
    /// Positions (within the sequence) to re-create with a new kind
    pub retype: Vec<(usize, DataKind)>,
}

impl SocketPlan {
    pub fn is_empty(&self) -> bool {
        self.append.is_empty() && self.prune == 0 && self.retype.is_empty()
    }
}

/// Number of sockets the sequence should hold: everything up to the last
/// linked socket, one sentinel after it, and never fewer than `min_sockets`.
pub fn desired_len(linked: &[bool], min_sockets: usize) -> usize {
    let needed = match linked.iter().rposition(|l| *l) {
        Some(last) => last + 2,
        None => 1,
    };
    needed.max(min_sockets)
}

/// Kind a linked socket should take, or `Err` with the conflicting kinds
fn negotiated_kind(slot: &SocketSlot) -> std::result::Result<Option<DataKind>, Vec<DataKind>> {
    let mut concrete: Vec<&DataKind> = slot.partner_kinds.iter().filter(|k| !k.is_any()).collect();
    concrete.dedup();
    match concrete.as_slice() {
        [] => Ok(None),
        [kind] if **kind == slot.kind => Ok(None),
        [kind] => Ok(Some((*kind).clone())),
        _ => {
            let mut kinds: Vec<DataKind> = concrete.into_iter().cloned().collect();
            kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            kinds.dedup();
            if kinds.len() == 1 {
                if kinds[0] == slot.kind {
                    Ok(None)
                } else {
                    Ok(kinds.pop())
                }
            } else {
                Err(kinds)
            }
        }
    }
}

/// Plan the changes for one sequence.
///
/// Fails only when a socket's links negotiate more than one concrete kind,
/// since no single re-created socket can satisfy them all.
pub fn plan(
    multi: &MultiSocket,
    slots: &[SocketSlot],
) -> std::result::Result<SocketPlan, (String, Vec<DataKind>)> {
    let linked: Vec<bool> = slots.iter().map(SocketSlot::is_linked).collect();
    let target = desired_len(&linked, multi.min_sockets);

    let mut plan = SocketPlan::default();
    if target > slots.len() {
        let existing: Vec<&str> = slots.iter().map(|s| s.name.as_str()).collect();
        let mut position = slots.len();
        while slots.len() + plan.append.len() < target {
            let mut name = multi.socket_name(position);
            while existing.contains(&name.as_str()) || plan.append.contains(&name) {
                position += 1;
                name = multi.socket_name(position);
            }
            plan.append.push(name);
            position += 1;
        }
    } else {
        plan.prune = slots.len() - target;
    }

    if multi.adapt_kind {
        for (position, slot) in slots.iter().enumerate().take(target) {
            match negotiated_kind(slot) {
                Ok(Some(kind)) => plan.retype.push((position, kind)),
                Ok(None) => {}
                Err(kinds) => return Err((slot.name.clone(), kinds)),
            }
        }
    }

    Ok(plan)
}

/// Snapshot a node's sequence for planning
fn slots(graph: &Graph, node_id: NodeId, direction: SocketDirection, start: usize) -> Vec<SocketSlot> {
    let Some(node) = graph.node_by_id(node_id) else {
        return Vec::new();
    };
    node.sockets(direction)
        .iter()
        .skip(start)
        .map(|socket| SocketSlot {
            name: socket.name.clone(),
            kind: socket.kind.clone(),
            partner_kinds: graph.partner_kinds(node_id, direction, &socket.name),
        })
        .collect()
}

/// Bring both of a node's sequences (if declared) in line with its links.
///
/// Returns whether any socket was added, removed or re-created.
pub fn apply(graph: &mut Graph, node_id: NodeId) -> Result<bool> {
    let mut changed = false;
    for direction in [SocketDirection::Input, SocketDirection::Output] {
        let Some(multi) = graph
            .node_by_id(node_id)
            .and_then(|n| n.multi_socket(direction))
            .cloned()
        else {
            continue;
        };

        let slots = slots(graph, node_id, direction, multi.start);
        let node_name = graph.name_of(node_id).unwrap_or_default().to_string();
        let plan = plan(&multi, &slots).map_err(|(socket, kinds)| EngineError::TypeMismatch {
            node: node_name.clone(),
            socket,
            expected: kinds
                .first()
                .map(|k| k.to_string())
                .unwrap_or_default(),
            found: kinds
                .iter()
                .skip(1)
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })?;
        if plan.is_empty() {
            continue;
        }

        let Some(node) = graph.node_by_id_mut(node_id) else {
            continue;
        };
        let sockets = node.sockets_mut(direction);

        for (position, kind) in &plan.retype {
            let index = multi.start + position;
            debug!(
                "Re-creating {} socket '{}' on '{}' as {}",
                direction.as_str(),
                sockets[index].name,
                node_name,
                kind
            );
            let replacement = sockets[index].retyped(kind.clone());
            sockets.remove(index);
            sockets.insert(index, replacement);
        }

        for _ in 0..plan.prune {
            if let Some(removed) = sockets.pop() {
                debug!("Pruned {} socket '{}' on '{}'", direction.as_str(), removed.name, node_name);
            }
        }

        for name in plan.append {
            debug!("Appended {} socket '{}' on '{}'", direction.as_str(), name, node_name);
            sockets.push(Socket::new(name, multi.kind.clone(), direction));
        }

        if direction == SocketDirection::Input {
            sockets
                .iter_mut()
                .skip(multi.start)
                .for_each(|socket| socket.optional = true);
        }
        changed = true;
    }
    Ok(changed)
}
