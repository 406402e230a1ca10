//! Engine-wide constants and default values
//!
//! Centralized location for hard-coded values shared by the config layer and
//! the node implementations

/// Data-kind tags understood by the bundled nodes
pub mod kinds {
    /// Nested lists of numbers
    pub const SCALAR_LIST: &str = "scalar-list";
    /// Nested lists of 3D vectors
    pub const VECTOR_LIST: &str = "vector-list";
    /// Lists of 4x4 matrices
    pub const MATRIX_LIST: &str = "matrix-list";
    /// Lists of strings
    pub const TEXT_LIST: &str = "text-list";
    /// Wildcard kind, connects to anything
    pub const ANY: &str = "any";
}

/// Group subsystem constants
pub mod group {
    /// Loop count an iteration node starts with
    pub const DEFAULT_ITERATIONS: usize = 10;

    /// Upper bound on a single group's loop count
    pub const MAX_ITERATIONS: usize = 10_000;

    /// Property holding an iteration node's loop count
    pub const COUNT_PROPERTY: &str = "count";

    /// Base name for the boundary nodes' growable sockets
    pub const BOUNDARY_SOCKET_BASE: &str = "Data";
}

/// Multi-socket constants
pub mod multi_socket {
    /// Minimum number of sockets a growable sequence keeps
    pub const DEFAULT_MIN_SOCKETS: usize = 1;
}

/// Reference node limits
pub mod range {
    /// Longest list a range node will generate
    pub const MAX_VALUES: usize = 1_000_000;
}

/// Config file location, relative to the platform config directory
pub const CONFIG_DIR_NAME: &str = "nodeflow";
pub const CONFIG_FILE_NAME: &str = "config.json";
