//! Nodeflow - dataflow evaluation for node graphs
//!
//! Nodes with typed sockets are linked into a graph. Edits produce trigger
//! nodes, the dependency resolver turns triggers into an ordered update list,
//! and the executor runs it, containing node failures to the node that raised
//! them. Groups package a subgraph behind a composite node that can re-run it
//! several times with its outputs fed back into its inputs.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod nodes;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EvaluationError, Result};
pub use nodes::{Graph, Node, NodeGraphEngine, NodeProcessor, NodeState};
