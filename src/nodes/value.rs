//! Data kinds and the values that flow between sockets
//!
//! Output sockets hold their value behind an `Rc` so readers can choose
//! between a shared read-only handle and an independent copy.

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use crate::constants::kinds;

/// Open, extensible data-kind tag declared by a socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataKind(String);

impl DataKind {
    /// Creates a kind from any tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn scalar_list() -> Self {
        Self::new(kinds::SCALAR_LIST)
    }

    pub fn vector_list() -> Self {
        Self::new(kinds::VECTOR_LIST)
    }

    pub fn matrix_list() -> Self {
        Self::new(kinds::MATRIX_LIST)
    }

    pub fn text_list() -> Self {
        Self::new(kinds::TEXT_LIST)
    }

    pub fn any() -> Self {
        Self::new(kinds::ANY)
    }

    /// The raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the wildcard kind
    pub fn is_any(&self) -> bool {
        self.0 == kinds::ANY
    }

    /// Check if a socket of this kind can be linked to one of `other`
    pub fn can_connect_to(&self, other: &DataKind) -> bool {
        self == other || self.is_any() || other.is_any()
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataKind {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// A value placed on an output socket or bound as a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SocketValue {
    /// Nested number lists, one inner list per object
    Scalars(Vec<Vec<f64>>),
    /// Nested vector lists, one inner list per object
    Vectors(Vec<Vec<DVec3>>),
    /// One matrix per object
    Matrices(Vec<DMat4>),
    /// Plain strings
    Text(Vec<String>),
    /// Anything else (curves, surfaces, imported documents), tagged with its kind
    Object {
        kind: DataKind,
        data: serde_json::Value,
    },
}

impl SocketValue {
    /// A single number wrapped the way list sockets carry it: `[[n]]`
    pub fn scalar(value: f64) -> Self {
        SocketValue::Scalars(vec![vec![value]])
    }

    /// The kind this value naturally belongs to
    pub fn kind(&self) -> DataKind {
        match self {
            SocketValue::Scalars(_) => DataKind::scalar_list(),
            SocketValue::Vectors(_) => DataKind::vector_list(),
            SocketValue::Matrices(_) => DataKind::matrix_list(),
            SocketValue::Text(_) => DataKind::text_list(),
            SocketValue::Object { kind, .. } => kind.clone(),
        }
    }

    pub fn as_scalars(&self) -> Option<&Vec<Vec<f64>>> {
        match self {
            SocketValue::Scalars(lists) => Some(lists),
            _ => None,
        }
    }

    pub fn as_vectors(&self) -> Option<&Vec<Vec<DVec3>>> {
        match self {
            SocketValue::Vectors(lists) => Some(lists),
            _ => None,
        }
    }

    pub fn as_matrices(&self) -> Option<&Vec<DMat4>> {
        match self {
            SocketValue::Matrices(matrices) => Some(matrices),
            _ => None,
        }
    }

    /// First number of the first list, the usual way single-value inputs are read
    pub fn first_scalar(&self) -> Option<f64> {
        self.as_scalars()
            .and_then(|lists| lists.first())
            .and_then(|list| list.first())
            .copied()
    }
}

/// Value returned by a socket read.
///
/// `Shared` points at the producer's stored value and must be treated as
/// read-only; `Owned` is an independent copy the caller may mutate.
#[derive(Debug, Clone)]
pub enum SocketData {
    Owned(SocketValue),
    Shared(Rc<SocketValue>),
}

impl SocketData {
    /// Whether the data aliases the producer's value
    pub fn is_shared(&self) -> bool {
        matches!(self, SocketData::Shared(_))
    }

    /// Extract an owned value, cloning only when shared
    pub fn into_owned(self) -> SocketValue {
        match self {
            SocketData::Owned(value) => value,
            SocketData::Shared(shared) => Rc::try_unwrap(shared).unwrap_or_else(|rc| (*rc).clone()),
        }
    }

    /// Convert to a shared handle, suitable for storing on another socket
    pub fn into_shared(self) -> Rc<SocketValue> {
        match self {
            SocketData::Owned(value) => Rc::new(value),
            SocketData::Shared(shared) => shared,
        }
    }
}

impl Deref for SocketData {
    type Target = SocketValue;

    fn deref(&self) -> &SocketValue {
        match self {
            SocketData::Owned(value) => value,
            SocketData::Shared(shared) => shared,
        }
    }
}
