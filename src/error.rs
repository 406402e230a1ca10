//! Engine error types
//!
//! Structural errors abort a run and surface to the caller. Evaluation errors
//! are raised by node `process` implementations and are contained by the
//! executor to the node that raised them.

use thiserror::Error;

/// Error raised by a node while evaluating.
///
/// The executor records it against the failing node, marks the node
/// [`NodeState::Failed`](crate::nodes::NodeState::Failed) and keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

impl EvaluationError {
    /// Creates an evaluation error with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// A linked input whose producer has not placed any data yet
    pub fn no_data(node: &str, socket: &str) -> Self {
        Self::new(format!("no data on socket '{}' of node '{}'", socket, node))
    }
}

/// Errors produced by the dependency resolver, the executor and structural edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Forward reachability from the triggers cannot be linearized.
    #[error("cycle detected between nodes: {}", nodes.join(", "))]
    CycleDetected { nodes: Vec<String> },

    /// A composite node was processed without a successful `link`.
    #[error("node '{node}' is missing a dependency: {reason}")]
    MissingDependency { node: String, reason: String },

    /// A socket could not be re-created with the kind its link negotiates.
    #[error("socket '{socket}' on node '{node}' expects '{expected}' but is linked to '{found}'")]
    TypeMismatch {
        node: String,
        socket: String,
        expected: String,
        found: String,
    },

    /// Raised by a node's `process`; contained by the executor.
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("a node named '{0}' already exists")]
    DuplicateNode(String),

    #[error("node '{node}' has no {direction} socket '{socket}'")]
    SocketNotFound {
        node: String,
        socket: String,
        direction: &'static str,
    },

    #[error("invalid link: {0}")]
    InvalidLink(String),

    /// No outputs boundary node is reachable from a group's inputs boundary.
    #[error("no group outputs node is reachable from '{inputs}'")]
    BoundaryNotFound { inputs: String },

    #[error("invalid group '{node}': {reason}")]
    InvalidGroup { node: String, reason: String },
}

impl EngineError {
    /// Whether the error is contained to a single node rather than aborting a run
    pub fn is_evaluation(&self) -> bool {
        matches!(self, EngineError::Evaluation(_))
    }
}

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_lists_nodes() {
        let err = EngineError::CycleDetected {
            nodes: vec!["B".to_string(), "C".to_string()],
        };
        assert_eq!(err.to_string(), "cycle detected between nodes: B, C");
    }

    #[test]
    fn evaluation_error_converts_into_engine_error() {
        fn fails() -> Result<()> {
            let raised: std::result::Result<(), EvaluationError> =
                Err(EvaluationError::new("division by zero"));
            raised?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(err.is_evaluation());
        assert!(err.to_string().contains("division by zero"));
    }

    #[test]
    fn structural_errors_are_not_evaluation() {
        let err = EngineError::MissingDependency {
            node: "Iter".to_string(),
            reason: "not linked".to_string(),
        };
        assert!(!err.is_evaluation());
    }
}
