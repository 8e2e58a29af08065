//! Runtime error types

use std::fmt;

use navex_ast::NodeId;
use thiserror::Error;

use crate::context::ContextSnapshot;
use crate::host::HostError;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// What went wrong during evaluation
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Cannot convert {value} to {target}")]
    TypeCoercion { value: String, target: String },

    #[error("No property '{name}' on {type_name}")]
    NoSuchProperty { type_name: String, name: String },

    #[error("No method {type_name}.{name} taking {arity} argument(s)")]
    NoSuchMethod {
        type_name: String,
        name: String,
        arity: usize,
    },

    #[error("Unknown class: {0}")]
    NoSuchClass(String),

    #[error("Access to {0} denied")]
    MemberAccessDenied(String),

    #[error("Null target: {0}")]
    NullTarget(String),

    #[error("Length mismatch: target has {expected} elements, replacement has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Index out of bounds: {index} (length: {length})")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Expression is not settable: {0}")]
    NotSettable(String),

    #[error("Invocation of {member} failed: {source}")]
    HostInvocationFailure {
        member: String,
        #[source]
        source: HostError,
    },

    #[error("Resolving {member} failed: {source}")]
    ResolutionFailed {
        member: String,
        #[source]
        source: HostError,
    },

    #[error("Cannot compile: {0}")]
    UnsupportedCompilation(String),

    #[error("Evaluation exceeded the maximum depth of {0}")]
    StackOverflow(usize),
}

/// Where an error surfaced: the innermost node being evaluated
#[derive(Debug, Clone)]
pub struct ErrorLocation {
    pub node: NodeId,
    /// The failing subtree rendered back to expression text
    pub expression: String,
    pub snapshot: ContextSnapshot,
}

/// Evaluation error
#[derive(Debug)]
pub struct EvalError {
    kind: ErrorKind,
    location: Option<Box<ErrorLocation>>,
}

impl EvalError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            location: None,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn location(&self) -> Option<&ErrorLocation> {
        self.location.as_deref()
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    /// Attach a location unless an inner node already did
    pub fn located(mut self, location: impl FnOnce() -> ErrorLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(Box::new(location()));
        }
        self
    }

    /// Create a type coercion error
    pub fn coercion(value: impl fmt::Display, target: impl Into<String>) -> Self {
        ErrorKind::TypeCoercion {
            value: value.to_string(),
            target: target.into(),
        }
        .into()
    }

    /// Create a missing property error
    pub fn no_such_property(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        ErrorKind::NoSuchProperty {
            type_name: type_name.into(),
            name: name.into(),
        }
        .into()
    }

    /// Create a missing method error
    pub fn no_such_method(type_name: impl Into<String>, name: impl Into<String>, arity: usize) -> Self {
        ErrorKind::NoSuchMethod {
            type_name: type_name.into(),
            name: name.into(),
            arity,
        }
        .into()
    }

    pub fn null_target(message: impl Into<String>) -> Self {
        ErrorKind::NullTarget(message.into()).into()
    }

    pub fn not_settable(expression: impl fmt::Display) -> Self {
        ErrorKind::NotSettable(expression.to_string()).into()
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        ErrorKind::UnsupportedCompilation(message.into()).into()
    }
}

impl From<ErrorKind> for EvalError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} (in `{}`)", self.kind, location.expression),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_innermost_location_wins() {
        let snapshot = ContextSnapshot::default();
        let err = EvalError::null_target("address")
            .located(|| ErrorLocation {
                node: navex_ast::AstBuilder::new().push(navex_ast::NodeKind::RootVarRef, vec![]),
                expression: "address".into(),
                snapshot: snapshot.clone(),
            })
            .located(|| ErrorLocation {
                node: navex_ast::AstBuilder::new().push(navex_ast::NodeKind::ThisVarRef, vec![]),
                expression: "person.address".into(),
                snapshot,
            });
        assert_eq!(err.to_string(), "Null target: address (in `address`)");
    }

    #[test]
    fn test_source_chain() {
        let err: EvalError = ErrorKind::HostInvocationFailure {
            member: "invoke.Person.getName".into(),
            source: HostError::new("boom"),
        }
        .into();
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
