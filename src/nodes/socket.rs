//! Socket types for node connections

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::value::{DataKind, SocketValue};

/// Direction of a socket (input or output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketDirection {
    Input,
    Output,
}

impl SocketDirection {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            SocketDirection::Input => "input",
            SocketDirection::Output => "output",
        }
    }
}

/// A typed data endpoint owned by a node.
///
/// Sockets are addressed by name within their node and direction. Links live in
/// the graph, not on the socket, so re-creating a socket under the same name
/// keeps its links attached.
#[derive(Debug, Clone)]
pub struct Socket {
    pub name: String,
    pub kind: DataKind,
    pub direction: SocketDirection,
    /// Node property this input falls back to when unlinked
    pub prop_name: Option<String>,
    /// Value used when unlinked and no property is bound
    pub default: Option<SocketValue>,
    /// Optional inputs don't have to be linked for the node to be live
    pub optional: bool,
    /// Current output, written by `set`
    value: Option<Rc<SocketValue>>,
}

impl Socket {
    /// Creates a new socket
    pub fn new(name: impl Into<String>, kind: DataKind, direction: SocketDirection) -> Self {
        Self {
            name: name.into(),
            kind,
            direction,
            prop_name: None,
            default: None,
            optional: false,
            value: None,
        }
    }

    /// Creates an input socket
    pub fn input(name: impl Into<String>, kind: DataKind) -> Self {
        Self::new(name, kind, SocketDirection::Input)
    }

    /// Creates an output socket
    pub fn output(name: impl Into<String>, kind: DataKind) -> Self {
        Self::new(name, kind, SocketDirection::Output)
    }

    /// Binds a default value
    pub fn with_default(mut self, value: SocketValue) -> Self {
        self.default = Some(value);
        self
    }

    /// Binds the default to a node property
    pub fn with_property(mut self, prop_name: impl Into<String>) -> Self {
        self.prop_name = Some(prop_name.into());
        self
    }

    /// Marks the input as not required for liveness
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn is_input(&self) -> bool {
        matches!(self.direction, SocketDirection::Input)
    }

    pub fn is_output(&self) -> bool {
        matches!(self.direction, SocketDirection::Output)
    }

    /// An input that must be linked before its node can become active
    pub fn is_required(&self) -> bool {
        self.is_input() && !self.optional && self.default.is_none() && self.prop_name.is_none()
    }

    /// The value last stored by `set`
    pub fn value(&self) -> Option<&Rc<SocketValue>> {
        self.value.as_ref()
    }

    pub(crate) fn store(&mut self, value: Rc<SocketValue>) {
        self.value = Some(value);
    }

    pub(crate) fn clear(&mut self) {
        self.value = None;
    }

    /// A fresh socket with the same name, direction and bindings but a new kind.
    ///
    /// The stored value is dropped, since it belongs to the old kind.
    pub fn retyped(&self, kind: DataKind) -> Self {
        Self {
            name: self.name.clone(),
            kind,
            direction: self.direction,
            prop_name: self.prop_name.clone(),
            default: None,
            optional: self.optional,
            value: None,
        }
    }
}
