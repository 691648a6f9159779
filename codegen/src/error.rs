//! Error types for fusion emission.

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure class of an emission error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display)]
pub enum ErrorKind {
    /// The fusion uses a construct outside the supported subset.
    Unsupported,
    /// A structural property the lowering relies on does not hold.
    Precondition,
    /// The emitter broke one of its own invariants.
    Internal,
    /// The emitted kernel exceeds a device limit.
    ResourceExhausted,
}

/// Errors that can occur while emitting a fusion.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // ========================================================================
    // Unsupported constructs
    // ========================================================================
    #[snafu(display("Unsupported: {what}"))]
    Unsupported { what: String },

    // ========================================================================
    // Precondition violations
    // ========================================================================
    #[snafu(display("Precondition failed: {reason}"))]
    Precondition { reason: String },

    // ========================================================================
    // Internal consistency
    // ========================================================================
    #[snafu(display("Internal error: {reason}"))]
    Internal { reason: String },

    /// A node was emitted twice into the same scope.
    #[snafu(display("Node {node} already has an emitted value"))]
    DuplicateValue { node: String },

    /// A value was requested for a node that has not been emitted.
    #[snafu(display("Node {node} has no emitted value"))]
    MissingValue { node: String },

    /// The emitted program failed construction or verification.
    #[snafu(display("IR error: {source}"))]
    Ir { source: tilegen_ir::Error },

    // ========================================================================
    // Resources
    // ========================================================================
    #[snafu(display("Shared memory: {required} bytes required, {limit} available"))]
    ResourceExhausted { required: usize, limit: usize },

    // ========================================================================
    // Input graph
    // ========================================================================
    #[snafu(display("Graph error: {source}"))]
    Graph { source: tilegen_graph::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Graph { source: tilegen_graph::Error::UnresolvedSymbol { .. } } => ErrorKind::Unsupported,
            Self::Precondition { .. } | Self::Graph { .. } => ErrorKind::Precondition,
            Self::Internal { .. } | Self::DuplicateValue { .. } | Self::MissingValue { .. } | Self::Ir { .. } => {
                ErrorKind::Internal
            }
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }
}
