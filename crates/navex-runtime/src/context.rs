//! Per-evaluation state

use std::collections::HashMap;

use navex_ast::NodeId;
use serde::Serialize;

use crate::error::{ErrorKind, EvalResult};
use crate::value::{TypeKey, Value};

/// Mutable state for one evaluation: the root object, named variables, and
/// the transient bookkeeping the evaluator and accessors update as they go.
///
/// A context belongs to a single evaluation at a time. The tree it evaluates
/// may be shared across threads, the context may not.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    root: Value,
    variables: HashMap<String, Value>,

    current_object: Option<Value>,
    current_type: Option<TypeKey>,
    current_accessor: Option<TypeKey>,
    /// Accessor source generated so far for the chain being compiled
    current_chain: Option<String>,
    current_node: Option<NodeId>,
    chain_position: Option<usize>,
    depth: usize,
}

/// Copy of the transient state, captured when an error is raised
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub current_object: Option<String>,
    pub current_type: Option<String>,
    pub current_accessor: Option<String>,
    pub current_chain: Option<String>,
    pub chain_position: Option<usize>,
    pub depth: usize,
}

impl EvalContext {
    pub fn new(root: impl Into<Value>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_variables(root: impl Into<Value>, variables: HashMap<String, Value>) -> Self {
        Self {
            root: root.into(),
            variables,
            ..Self::default()
        }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn set_root(&mut self, root: Value) {
        self.root = root;
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn remove_variable(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn current_object(&self) -> Option<&Value> {
        self.current_object.as_ref()
    }

    pub fn set_current_object(&mut self, value: Option<Value>) {
        self.current_object = value;
    }

    /// Type of the last value produced, tracked for generated source
    pub fn current_type(&self) -> Option<&TypeKey> {
        self.current_type.as_ref()
    }

    pub fn set_current_type(&mut self, ty: Option<TypeKey>) {
        self.current_type = ty;
    }

    /// Type whose accessor last ran
    pub fn current_accessor(&self) -> Option<&TypeKey> {
        self.current_accessor.as_ref()
    }

    pub fn set_current_accessor(&mut self, ty: Option<TypeKey>) {
        self.current_accessor = ty;
    }

    pub fn current_chain(&self) -> Option<&str> {
        self.current_chain.as_deref()
    }

    pub fn set_current_chain(&mut self, chain: Option<String>) {
        self.current_chain = chain;
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.current_node
    }

    pub(crate) fn replace_current_node(&mut self, node: Option<NodeId>) -> Option<NodeId> {
        std::mem::replace(&mut self.current_node, node)
    }

    pub fn chain_position(&self) -> Option<usize> {
        self.chain_position
    }

    pub(crate) fn replace_chain_position(&mut self, position: Option<usize>) -> Option<usize> {
        std::mem::replace(&mut self.chain_position, position)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn enter(&mut self, max_depth: usize) -> EvalResult<()> {
        if self.depth >= max_depth {
            return Err(ErrorKind::StackOverflow(max_depth).into());
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Clear transient state left by a previous evaluation. Root and
    /// variables are kept.
    pub fn reset(&mut self) {
        self.current_object = None;
        self.current_type = None;
        self.current_accessor = None;
        self.current_chain = None;
        self.current_node = None;
        self.chain_position = None;
        self.depth = 0;
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            current_object: self.current_object.as_ref().map(|v| v.to_string()),
            current_type: self.current_type.as_ref().map(|t| t.to_string()),
            current_accessor: self.current_accessor.as_ref().map(|t| t.to_string()),
            current_chain: self.current_chain.clone(),
            chain_position: self.chain_position,
            depth: self.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_guard() {
        let mut ctx = EvalContext::new(Value::Null);
        ctx.enter(2).unwrap();
        ctx.enter(2).unwrap();
        let err = ctx.enter(2).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StackOverflow(2)));
        ctx.exit();
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn test_reset_keeps_root_and_variables() {
        let mut ctx = EvalContext::new(Value::Int(1));
        ctx.set_variable("x", Value::from("y"));
        ctx.set_current_type(Some(TypeKey::new("Int")));
        ctx.set_current_chain(Some(".getName()".into()));
        ctx.reset();
        assert_eq!(ctx.root(), &Value::Int(1));
        assert_eq!(ctx.variable("x"), Some(&Value::from("y")));
        assert_eq!(ctx.snapshot(), ContextSnapshot::default());
    }
}
