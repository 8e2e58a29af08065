//! AST construction error types

use thiserror::Error;

use crate::ast::NodeId;

/// Result type for AST construction
pub type AstResult<T> = Result<T, AstError>;

/// AST construction error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AstError {
    #[error("Unknown node id: {0}")]
    InvalidNode(NodeId),

    #[error("Node {node} ({kind}) expects {expected} children, got {actual}")]
    Arity {
        node: NodeId,
        kind: String,
        expected: String,
        actual: usize,
    },

    #[error("Node {0} is attached to more than one parent")]
    SharedNode(NodeId),

    #[error("Chain {0} has no segments")]
    EmptyChain(NodeId),
}

impl AstError {
    /// Create an arity error
    pub fn arity(
        node: NodeId,
        kind: impl Into<String>,
        expected: impl Into<String>,
        actual: usize,
    ) -> Self {
        AstError::Arity {
            node,
            kind: kind.into(),
            expected: expected.into(),
            actual,
        }
    }
}
