//! Tree-walking evaluator

use std::sync::Arc;

use indexmap::IndexMap;
use navex_ast::{Ast, BinaryOp, NaryOp, NodeId, NodeKind, UnaryOp};

use crate::accessor::{Accessors, PropertyAccessor};
use crate::cache::MemberCache;
use crate::compiler::ExpressionCompiler;
use crate::config::EvaluatorConfig;
use crate::context::EvalContext;
use crate::error::{ErrorLocation, EvalError, EvalResult};
use crate::ops;
use crate::resolver::MemberResolver;
use crate::value::{TypeKey, Value};

/// Expression evaluator.
///
/// An evaluator holds only shared, thread-safe state (the member cache and
/// the accessor table), so one instance can serve many threads at once, each
/// with its own [`EvalContext`].
pub struct Evaluator {
    cache: Arc<MemberCache>,
    accessors: Accessors,
    compiler: Option<Arc<dyn ExpressionCompiler>>,
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Create an evaluator with a fresh member cache over `resolver`
    pub fn new(resolver: Arc<dyn MemberResolver>) -> Self {
        Self::with_cache(Arc::new(MemberCache::new(resolver)))
    }

    /// Create an evaluator sharing an existing member cache
    pub fn with_cache(cache: Arc<MemberCache>) -> Self {
        Self {
            accessors: Accessors::new(cache.clone()),
            cache,
            compiler: None,
            config: EvaluatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvaluatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Install a backend that turns generated source into native accessors
    pub fn with_compiler(mut self, compiler: Arc<dyn ExpressionCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<MemberCache> {
        &self.cache
    }

    pub(crate) fn accessors(&self) -> &Accessors {
        &self.accessors
    }

    pub(crate) fn compiler(&self) -> Option<&Arc<dyn ExpressionCompiler>> {
        self.compiler.as_ref()
    }

    /// Use `accessor` for every target whose type name is `type_name`
    pub fn set_property_accessor(&self, type_name: &str, accessor: Arc<dyn PropertyAccessor>) {
        self.accessors.register(TypeKey::new(type_name), accessor);
    }

    /// Forget resolved members of one type, or of all types
    pub fn clear_cache(&self, ty: Option<&TypeKey>) {
        self.cache.invalidate(ty);
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Evaluate `ast` against the context's root
    pub fn get_value(&self, ast: &Ast, ctx: &mut EvalContext) -> EvalResult<Value> {
        let root = ctx.root().clone();
        self.get_value_from(ast, ctx, &root)
    }

    /// Evaluate `ast` against an explicit source object
    pub fn get_value_from(&self, ast: &Ast, ctx: &mut EvalContext, source: &Value) -> EvalResult<Value> {
        tracing::debug!(expression = %ast, "get value");
        ctx.reset();
        self.eval_node(ast, ast.root(), ctx, source)
    }

    /// Assign `value` to the location `ast` denotes, starting from the root
    pub fn set_value(&self, ast: &Ast, ctx: &mut EvalContext, value: Value) -> EvalResult<()> {
        let root = ctx.root().clone();
        self.set_value_on(ast, ctx, &root, value)
    }

    pub fn set_value_on(&self, ast: &Ast, ctx: &mut EvalContext, target: &Value, value: Value) -> EvalResult<()> {
        tracing::debug!(expression = %ast, "set value");
        ctx.reset();
        self.set_node(ast, ast.root(), ctx, target, value)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Evaluate one node against `source`
    pub fn eval_node(&self, ast: &Ast, id: NodeId, ctx: &mut EvalContext, source: &Value) -> EvalResult<Value> {
        if let Err(e) = ctx.enter(self.config.max_depth) {
            return Err(self.locate(e, ast, id, ctx));
        }
        let parent = ctx.replace_current_node(Some(id));
        let result = self
            .eval_kind(ast, id, ctx, source)
            .map_err(|e| self.locate(e, ast, id, ctx));
        ctx.replace_current_node(parent);
        ctx.exit();
        result
    }

    fn eval_kind(&self, ast: &Ast, id: NodeId, ctx: &mut EvalContext, source: &Value) -> EvalResult<Value> {
        let children = ast.children(id);
        match ast.kind(id) {
            NodeKind::Const(lit) => Ok(Value::from(lit)),
            NodeKind::VarRef(name) => Ok(self.read_variable(ctx, name, source)),
            NodeKind::RootVarRef => Ok(ctx.root().clone()),
            NodeKind::ThisVarRef => Ok(source.clone()),
            NodeKind::Property { indexed } => {
                let name = self.eval_key(ast, children[0], ctx)?;
                if source.is_null() {
                    return Ok(Value::Null);
                }
                let value = self
                    .accessors
                    .select(source)
                    .get_property(ctx, source, &name, *indexed)?;
                track(ctx, &value);
                Ok(value)
            }
            NodeKind::Method { name } => {
                let args = self.eval_args(ast, children, ctx)?;
                let value = self.call_method(source, name, &args)?;
                track(ctx, &value);
                Ok(value)
            }
            NodeKind::StaticMethod { class, name } => {
                let args = self.eval_args(ast, children, ctx)?;
                self.call_static(class, name, &args)
            }
            NodeKind::StaticField { class, name } => self.read_static_field(class, name),
            NodeKind::Ctor { class } => {
                let args = self.eval_args(ast, children, ctx)?;
                self.construct(class, &args)
            }
            NodeKind::Chain => self.eval_chain(ast, children, ctx, source),
            NodeKind::List => {
                let items = children
                    .iter()
                    .map(|&child| self.eval_node(ast, child, ctx, source))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            NodeKind::Map => {
                let mut entries = IndexMap::with_capacity(children.len() / 2);
                for pair in children.chunks(2) {
                    let key = self.eval_node(ast, pair[0], ctx, source)?;
                    let value = self.eval_node(ast, pair[1], ctx, source)?;
                    entries.insert(key, value);
                }
                Ok(Value::map(entries))
            }
            NodeKind::Sequence => {
                let mut result = Value::Null;
                for &child in children {
                    result = self.eval_node(ast, child, ctx, source)?;
                }
                Ok(result)
            }
            NodeKind::Assign => {
                let value = self.eval_node(ast, children[1], ctx, source)?;
                self.set_node(ast, children[0], ctx, source, value.clone())?;
                Ok(value)
            }
            NodeKind::Test => {
                let condition = self.eval_node(ast, children[0], ctx, source)?;
                let branch = if ops::boolean_value(&condition) {
                    children[1]
                } else {
                    children[2]
                };
                self.eval_node(ast, branch, ctx, source)
            }
            NodeKind::Nary(op) => self.eval_nary(ast, *op, children, ctx, source),
            NodeKind::Binary(op) => {
                let left = self.eval_node(ast, children[0], ctx, source)?;
                let right = self.eval_node(ast, children[1], ctx, source)?;
                binary(*op, &left, &right)
            }
            NodeKind::Unary(op) => {
                let operand = self.eval_node(ast, children[0], ctx, source)?;
                unary(*op, &operand)
            }
        }
    }

    fn read_variable(&self, ctx: &EvalContext, name: &str, source: &Value) -> Value {
        if name == self.config.root_variable {
            ctx.root().clone()
        } else if name == self.config.this_variable {
            source.clone()
        } else {
            ctx.variable(name).cloned().unwrap_or_default()
        }
    }

    /// Property names and index expressions are evaluated against the root
    pub(crate) fn eval_key(&self, ast: &Ast, key: NodeId, ctx: &mut EvalContext) -> EvalResult<Value> {
        let root = ctx.root().clone();
        self.eval_node(ast, key, ctx, &root)
    }

    /// Call arguments are evaluated against the root
    fn eval_args(&self, ast: &Ast, args: &[NodeId], ctx: &mut EvalContext) -> EvalResult<Vec<Value>> {
        let root = ctx.root().clone();
        args.iter()
            .map(|&arg| self.eval_node(ast, arg, ctx, &root))
            .collect()
    }

    fn eval_chain(&self, ast: &Ast, segments: &[NodeId], ctx: &mut EvalContext, source: &Value) -> EvalResult<Value> {
        let previous = ctx.chain_position();
        let last = segments.len() - 1;
        let mut current = source.clone();
        for (i, &segment) in segments.iter().enumerate() {
            ctx.replace_chain_position(Some(i));
            current = self.eval_node(ast, segment, ctx, &current)?;
            if current.is_null() && i < last {
                tracing::trace!(segment = %ast.display(segment), "null intermediate ends chain");
                break;
            }
        }
        ctx.replace_chain_position(previous);
        Ok(current)
    }

    fn eval_nary(
        &self,
        ast: &Ast,
        op: NaryOp,
        operands: &[NodeId],
        ctx: &mut EvalContext,
        source: &Value,
    ) -> EvalResult<Value> {
        let Some(combine) = arithmetic(op) else {
            // The deciding operand is the result, not a coerced boolean
            let stop_on = op == NaryOp::Or;
            let mut result = Value::Null;
            for &operand in operands {
                result = self.eval_node(ast, operand, ctx, source)?;
                if ops::boolean_value(&result) == stop_on {
                    break;
                }
            }
            return Ok(result);
        };

        let mut result = self.eval_node(ast, operands[0], ctx, source)?;
        for &operand in &operands[1..] {
            let next = self.eval_node(ast, operand, ctx, source)?;
            result = combine(&result, &next)?;
        }
        Ok(result)
    }

    // =========================================================================
    // Member calls
    // =========================================================================

    pub(crate) fn call_method(&self, target: &Value, name: &str, args: &[Value]) -> EvalResult<Value> {
        if target.is_null() {
            return Err(EvalError::null_target(format!("cannot invoke {}() on null", name)));
        }
        let ty = target.type_key();
        let method = self
            .cache
            .resolve_method(&ty, name, args.len(), false)?
            .ok_or_else(|| EvalError::no_such_method(ty.as_str(), name, args.len()))?;
        self.cache.invoke(&method, target, args)
    }

    pub(crate) fn call_static(&self, class: &str, name: &str, args: &[Value]) -> EvalResult<Value> {
        let ty = self.cache.require_class(class)?;
        let method = self
            .cache
            .resolve_method(&ty, name, args.len(), true)?
            .ok_or_else(|| EvalError::no_such_method(ty.as_str(), name, args.len()))?;
        self.cache.invoke(&method, &Value::Null, args)
    }

    pub(crate) fn read_static_field(&self, class: &str, name: &str) -> EvalResult<Value> {
        let ty = self.cache.require_class(class)?;
        let field = self
            .cache
            .resolve_field(&ty, name)?
            .filter(|field| field.is_static())
            .ok_or_else(|| EvalError::no_such_property(ty.as_str(), name))?;
        self.cache.read_field(&field, &Value::Null)
    }

    pub(crate) fn construct(&self, class: &str, args: &[Value]) -> EvalResult<Value> {
        let ty = self.cache.require_class(class)?;
        let ctor = self
            .cache
            .resolve_constructor(&ty, args.len())?
            .ok_or_else(|| EvalError::no_such_method(ty.as_str(), "<init>", args.len()))?;
        self.cache.construct(&ctor, args)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Assign `value` to the location node `id` denotes, relative to `target`
    pub fn set_node(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
        value: Value,
    ) -> EvalResult<()> {
        if let Err(e) = ctx.enter(self.config.max_depth) {
            return Err(self.locate(e, ast, id, ctx));
        }
        let parent = ctx.replace_current_node(Some(id));
        let result = self
            .set_kind(ast, id, ctx, target, value)
            .map_err(|e| self.locate(e, ast, id, ctx));
        ctx.replace_current_node(parent);
        ctx.exit();
        result
    }

    fn set_kind(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
        value: Value,
    ) -> EvalResult<()> {
        let children = ast.children(id);
        match ast.kind(id) {
            NodeKind::VarRef(name) if *name == self.config.root_variable => {
                ctx.set_root(value);
                Ok(())
            }
            NodeKind::VarRef(name) if *name == self.config.this_variable => {
                Err(EvalError::not_settable(ast.display(id)))
            }
            NodeKind::VarRef(name) => {
                ctx.set_variable(name.clone(), value);
                Ok(())
            }
            NodeKind::RootVarRef => {
                ctx.set_root(value);
                Ok(())
            }
            NodeKind::Property { indexed } => {
                let name = self.eval_key(ast, children[0], ctx)?;
                if target.is_null() {
                    return Err(EvalError::null_target(format!("cannot set {} on null", name)));
                }
                self.accessors
                    .select(target)
                    .set_property(ctx, target, &name, value, *indexed)
            }
            NodeKind::Chain => {
                let Some((&last, init)) = children.split_last() else {
                    return Err(EvalError::not_settable(ast.display(id)));
                };
                let previous = ctx.chain_position();
                let mut current = target.clone();
                for (i, &segment) in init.iter().enumerate() {
                    ctx.replace_chain_position(Some(i));
                    current = self.eval_node(ast, segment, ctx, &current)?;
                    if current.is_null() {
                        return Err(EvalError::null_target(format!(
                            "`{}` is null",
                            ast.display(segment)
                        )));
                    }
                }
                ctx.replace_chain_position(Some(init.len()));
                self.set_node(ast, last, ctx, &current, value)?;
                ctx.replace_chain_position(previous);
                Ok(())
            }
            NodeKind::Sequence => {
                let Some((&last, init)) = children.split_last() else {
                    return Err(EvalError::not_settable(ast.display(id)));
                };
                for &child in init {
                    self.eval_node(ast, child, ctx, target)?;
                }
                self.set_node(ast, last, ctx, target, value)
            }
            NodeKind::Nary(op @ (NaryOp::And | NaryOp::Or)) => {
                // Assign through the last operand only if the others let
                // evaluation reach it
                let Some((&last, init)) = children.split_last() else {
                    return Err(EvalError::not_settable(ast.display(id)));
                };
                let stop_on = *op == NaryOp::Or;
                for &operand in init {
                    let v = self.eval_node(ast, operand, ctx, target)?;
                    if ops::boolean_value(&v) == stop_on {
                        return Ok(());
                    }
                }
                self.set_node(ast, last, ctx, target, value)
            }
            _ => Err(EvalError::not_settable(ast.display(id))),
        }
    }

    fn locate(&self, err: EvalError, ast: &Ast, id: NodeId, ctx: &EvalContext) -> EvalError {
        err.located(|| ErrorLocation {
            node: id,
            expression: ast.display(id).to_string(),
            snapshot: ctx.snapshot(),
        })
    }
}

/// Record the last produced value for later type hints
fn track(ctx: &mut EvalContext, value: &Value) {
    ctx.set_current_type(Some(value.type_key()));
    ctx.set_current_object(Some(value.clone()));
}

/// Fold function of an arithmetic or bitwise n-ary operator; `None` for the
/// short-circuiting logical operators
pub(crate) fn arithmetic(op: NaryOp) -> Option<fn(&Value, &Value) -> EvalResult<Value>> {
    match op {
        NaryOp::And | NaryOp::Or => None,
        NaryOp::Add => Some(ops::add),
        NaryOp::Multiply => Some(ops::multiply),
        NaryOp::BitAnd => Some(ops::bit_and),
        NaryOp::BitOr => Some(ops::bit_or),
        NaryOp::Xor => Some(ops::xor),
    }
}

pub(crate) fn unary(op: UnaryOp, operand: &Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Negate => ops::negate(operand),
        UnaryOp::Not => Ok(Value::Boolean(!ops::boolean_value(operand))),
        UnaryOp::BitNegate => ops::bit_negate(operand),
    }
}

pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<Value> {
    let result = match op {
        BinaryOp::Subtract => return ops::subtract(left, right),
        BinaryOp::Divide => return ops::divide(left, right),
        BinaryOp::Remainder => return ops::remainder(left, right),
        BinaryOp::ShiftLeft => return ops::shift_left(left, right),
        BinaryOp::ShiftRight => return ops::shift_right(left, right),
        BinaryOp::UnsignedShiftRight => return ops::unsigned_shift_right(left, right),
        BinaryOp::Eq => ops::equal(left, right),
        BinaryOp::NotEq => !ops::equal(left, right),
        BinaryOp::Less => ops::less(left, right)?,
        BinaryOp::LessEq => !ops::greater(left, right)?,
        BinaryOp::Greater => ops::greater(left, right)?,
        BinaryOp::GreaterEq => !ops::less(left, right)?,
        BinaryOp::In => ops::contains(right, left)?,
        BinaryOp::NotIn => !ops::contains(right, left)?,
    };
    Ok(Value::Boolean(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::registry::ClassRegistry;
    use navex_ast::AstBuilder;

    fn evaluator() -> Evaluator {
        Evaluator::new(Arc::new(ClassRegistry::new()))
    }

    #[test]
    fn test_and_or_return_deciding_operand() {
        let mut b = AstBuilder::new();
        let zero = b.constant(0);
        let text = b.string("x");
        let and = b.and(zero, text);
        let ast = b.finish(and).unwrap();
        let mut ctx = EvalContext::default();
        assert_eq!(evaluator().get_value(&ast, &mut ctx).unwrap(), Value::Int(0));

        let mut b = AstBuilder::new();
        let null = b.null();
        let text = b.string("x");
        let or = b.or(null, text);
        let ast = b.finish(or).unwrap();
        assert_eq!(evaluator().get_value(&ast, &mut ctx).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_short_circuit_skips_failing_operand() {
        let mut b = AstBuilder::new();
        let yes = b.constant(true);
        let one = b.constant(1);
        let zero = b.constant(0);
        let boom = b.binary(BinaryOp::Divide, one, zero);
        let or = b.or(yes, boom);
        let ast = b.finish(or).unwrap();
        let mut ctx = EvalContext::default();
        assert_eq!(evaluator().get_value(&ast, &mut ctx).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_depth_limit() {
        let mut b = AstBuilder::new();
        let mut node = b.constant(1);
        for _ in 0..10 {
            node = b.unary(UnaryOp::Negate, node);
        }
        let ast = b.finish(node).unwrap();
        let config = EvaluatorConfig {
            max_depth: 5,
            ..EvaluatorConfig::default()
        };
        let mut ctx = EvalContext::default();
        let err = evaluator().with_config(config).get_value(&ast, &mut ctx).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::StackOverflow(5)));
        assert!(err.location().is_some());
    }

    #[test]
    fn test_variables_and_reserved_names() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let root = b.var("root");
        let sum = b.add(x, root);
        let ast = b.finish(sum).unwrap();

        let mut ctx = EvalContext::new(Value::Int(40));
        ctx.set_variable("x", Value::Int(2));
        assert_eq!(evaluator().get_value(&ast, &mut ctx).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_assign_variable_and_root() {
        let mut b = AstBuilder::new();
        let target = b.var("total");
        let five = b.constant(5);
        let assign = b.assign(target, five);
        let root_ref = b.root_ref();
        let seven = b.constant(7);
        let assign_root = b.assign(root_ref, seven);
        let seq = b.sequence(vec![assign, assign_root]);
        let ast = b.finish(seq).unwrap();

        let mut ctx = EvalContext::default();
        assert_eq!(evaluator().get_value(&ast, &mut ctx).unwrap(), Value::Int(7));
        assert_eq!(ctx.variable("total"), Some(&Value::Int(5)));
        assert_eq!(ctx.root(), &Value::Int(7));
    }

    #[test]
    fn test_constant_is_not_settable() {
        let mut b = AstBuilder::new();
        let one = b.constant(1);
        let ast = b.finish(one).unwrap();
        let mut ctx = EvalContext::default();
        let err = evaluator().set_value(&ast, &mut ctx, Value::Int(2)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotSettable(_)));
    }

    #[test]
    fn test_set_through_and() {
        let mut b = AstBuilder::new();
        let flag = b.var("flag");
        let target = b.var("out");
        let and = b.and(flag, target);
        let ast = b.finish(and).unwrap();
        let eval = evaluator();

        let mut ctx = EvalContext::default();
        ctx.set_variable("flag", Value::Boolean(false));
        eval.set_value(&ast, &mut ctx, Value::Int(1)).unwrap();
        assert_eq!(ctx.variable("out"), None);

        ctx.set_variable("flag", Value::Boolean(true));
        eval.set_value(&ast, &mut ctx, Value::Int(1)).unwrap();
        assert_eq!(ctx.variable("out"), Some(&Value::Int(1)));
    }
}
