//! Node system - graph, evaluation and the bundled node implementations

// Core node system modules
pub mod cache;
pub mod context;
pub mod dependency;
pub mod execution_engine;
pub mod graph;
pub mod multi_socket;
pub mod node;
pub mod socket;
pub mod value;

// Node implementations
pub mod group;
pub mod library;

// Re-export core types
pub use context::{EditContext, NodeContext};
pub use graph::{Graph, Link, SocketRef};
pub use node::{BoundaryRole, Node, NodeId, NodeProcessor, NodeState};
pub use socket::{Socket, SocketDirection};
pub use value::{DataKind, SocketData, SocketValue};

// Re-export resolution and execution
pub use dependency::{full_update_list, make_update_list};
pub use execution_engine::{
    execute, execute_with_cancel, CancelToken, EngineExecutionMode, ExecutionReport,
    ExecutionStats, NodeFailure, NodeGraphEngine,
};
