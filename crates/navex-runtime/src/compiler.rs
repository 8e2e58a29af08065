//! Compilation hook
//!
//! The evaluator can render an expression as source fragments for a native
//! backend. Fragments use three placeholders:
//!
//! - `$this` is the object the expression is evaluated against
//! - `$root` is the context root
//! - `$ctx` is the variable table, `$value` the value being assigned
//!
//! Generating source also evaluates the expression against the context, so
//! that accessors can be chosen for the actual runtime types. Interpretation
//! stays the reference semantics: a [`CompiledExpression`] without a native
//! accessor simply interprets.

use std::sync::Arc;

use navex_ast::{Ast, BinaryOp, NaryOp, NodeId, NodeKind, UnaryOp};

use crate::accessor::source_literal;
use crate::context::EvalContext;
use crate::error::{ErrorKind, EvalError, EvalResult};
use crate::evaluator::{arithmetic, binary, unary, Evaluator};
use crate::ops;
use crate::value::{TypeKey, Value};

/// A piece of generated source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    pub code: String,
    /// Static type of the fragment's result, when known
    pub result_type: Option<TypeKey>,
}

impl SourceFragment {
    fn new(code: impl Into<String>, result_type: Option<TypeKey>) -> Self {
        Self {
            code: code.into(),
            result_type,
        }
    }

    /// A fragment whose result type is taken from a sample value
    fn typed(code: impl Into<String>, sample: &Value) -> Self {
        let result_type = (!sample.is_null()).then(|| sample.type_key());
        Self::new(code, result_type)
    }

    /// Accessor fragments (`.name`, `[0]`) are relative to a target
    fn is_relative(&self) -> bool {
        self.code.is_empty() || self.code.starts_with('.') || self.code.starts_with('[')
    }

    /// Anchor a relative fragment on `$this`
    fn anchored(mut self) -> Self {
        if self.is_relative() {
            self.code.insert_str(0, "$this");
        }
        self
    }

    /// Anchored, and parenthesized if the fragment is an operator expression
    fn operand(self, ast: &Ast, id: NodeId) -> String {
        let fragment = self.anchored();
        match ast.kind(id) {
            NodeKind::Nary(_) | NodeKind::Binary(_) | NodeKind::Unary(_) | NodeKind::Test => {
                format!("({})", fragment.code)
            }
            _ => fragment.code,
        }
    }
}

/// Everything a backend receives to build a native accessor
pub struct CompileRequest<'a> {
    pub ast: &'a Ast,
    pub getter: &'a SourceFragment,
    /// Absent when the expression is not assignable
    pub setter: Option<&'a SourceFragment>,
    pub root_type: TypeKey,
}

/// Backend that turns generated source into executable accessors
pub trait ExpressionCompiler: Send + Sync {
    fn compile(&self, request: &CompileRequest<'_>) -> EvalResult<Arc<dyn CompiledAccessor>>;
}

/// A natively compiled expression
pub trait CompiledAccessor: Send + Sync {
    fn get(&self, ctx: &mut EvalContext, root: &Value) -> EvalResult<Value>;

    fn set(&self, ctx: &mut EvalContext, root: &Value, value: Value) -> EvalResult<()>;
}

/// An expression with its generated source and, if a backend was
/// configured, a native accessor
pub struct CompiledExpression {
    ast: Arc<Ast>,
    getter: Option<SourceFragment>,
    setter: Option<SourceFragment>,
    accessor: Option<Arc<dyn CompiledAccessor>>,
}

impl std::fmt::Debug for CompiledExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpression")
            .field("expression", &self.ast.to_string())
            .field("getter", &self.getter)
            .field("setter", &self.setter)
            .field("native", &self.accessor.is_some())
            .finish()
    }
}

impl CompiledExpression {
    /// An expression that is always interpreted
    pub fn interpreted(ast: Arc<Ast>) -> Self {
        Self {
            ast,
            getter: None,
            setter: None,
            accessor: None,
        }
    }

    pub fn ast(&self) -> &Arc<Ast> {
        &self.ast
    }

    pub fn getter_source(&self) -> Option<&SourceFragment> {
        self.getter.as_ref()
    }

    pub fn setter_source(&self) -> Option<&SourceFragment> {
        self.setter.as_ref()
    }

    pub fn is_native(&self) -> bool {
        self.accessor.is_some()
    }

    pub fn get_value(&self, evaluator: &Evaluator, ctx: &mut EvalContext) -> EvalResult<Value> {
        match &self.accessor {
            Some(accessor) => {
                let root = ctx.root().clone();
                accessor.get(ctx, &root)
            }
            None => evaluator.get_value(&self.ast, ctx),
        }
    }

    pub fn set_value(&self, evaluator: &Evaluator, ctx: &mut EvalContext, value: Value) -> EvalResult<()> {
        match &self.accessor {
            Some(accessor) if self.setter.is_some() => {
                let root = ctx.root().clone();
                accessor.set(ctx, &root, value)
            }
            _ => evaluator.set_value(&self.ast, ctx, value),
        }
    }
}

fn unsupported_kind(ast: &Ast, id: NodeId) -> EvalError {
    EvalError::unsupported(format!(
        "{} expression `{}` cannot be compiled",
        ast.kind(id).name(),
        ast.display(id)
    ))
}

fn two_operands(op: NaryOp, operands: &[NodeId]) -> EvalResult<(NodeId, NodeId)> {
    match operands {
        [first, second] => Ok((*first, *second)),
        _ => Err(EvalError::unsupported(format!(
            "can only compile `{}` with two operands, found {}",
            op.symbol(),
            operands.len()
        ))),
    }
}

/// Logical `and`/`or` as a conditional on the first operand
fn logical_code(op: NaryOp, left: &str, right: &str) -> String {
    if op == NaryOp::And {
        format!("booleanValue({left}) ? {right} : {left}")
    } else {
        format!("booleanValue({left}) ? {left} : {right}")
    }
}

/// A setter the accessor cannot generate leaves the expression read-only
fn assignable(setter: EvalResult<String>) -> EvalResult<Option<String>> {
    match setter {
        Ok(code) => Ok(Some(code)),
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::UnsupportedCompilation(_) | ErrorKind::NoSuchProperty { .. }
            ) =>
        {
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl Evaluator {
    /// Generate source and hand it to the configured backend.
    ///
    /// The expression is evaluated once against the context's root while
    /// source is generated. Without a backend the result carries the source
    /// but interprets.
    pub fn compile(&self, ast: Arc<Ast>, ctx: &mut EvalContext) -> EvalResult<CompiledExpression> {
        let root = ctx.root().clone();
        ctx.reset();
        let (getter, setter) = self.sources(&ast, ast.root(), ctx, &root)?;
        ctx.reset();
        let getter = getter.anchored();
        let setter = setter.map(|code| SourceFragment::new(code, None).anchored());

        let accessor = match self.compiler() {
            Some(compiler) => Some(compiler.compile(&CompileRequest {
                ast: &ast,
                getter: &getter,
                setter: setter.as_ref(),
                root_type: root.type_key(),
            })?),
            None => None,
        };
        tracing::debug!(
            expression = %ast,
            getter = %getter.code,
            native = accessor.is_some(),
            "compiled expression"
        );

        Ok(CompiledExpression {
            ast,
            getter: Some(getter),
            setter,
            accessor,
        })
    }

    /// Source reading node `id` relative to `target`
    pub fn to_get_source(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
    ) -> EvalResult<SourceFragment> {
        self.get_source(ast, id, ctx, target).map(|(fragment, _)| fragment)
    }

    /// Source writing `$value` to the location node `id` denotes
    pub fn to_set_source(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
    ) -> EvalResult<SourceFragment> {
        match self.sources(ast, id, ctx, target)? {
            (_, Some(code)) => Ok(SourceFragment::new(code, None).anchored()),
            (_, None) => Err(unsupported_kind(ast, id)),
        }
    }

    /// Getter and, if the node denotes an assignable location, setter code.
    /// Both come out of one pass, so every node is evaluated at most once.
    fn sources(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
    ) -> EvalResult<(SourceFragment, Option<String>)> {
        let children = ast.children(id);
        match ast.kind(id) {
            NodeKind::VarRef(name) if *name == self.config().root_variable => Ok((
                SourceFragment::typed("$root", ctx.root()),
                Some("$root = $value".to_string()),
            )),
            NodeKind::RootVarRef => Ok((
                SourceFragment::typed("$root", ctx.root()),
                Some("$root = $value".to_string()),
            )),
            NodeKind::VarRef(name) if *name != self.config().this_variable => {
                let value = ctx.variable(name).cloned().unwrap_or_default();
                Ok((
                    SourceFragment::typed(format!("$ctx.get({:?})", name), &value),
                    Some(format!("$ctx.put({:?}, $value)", name)),
                ))
            }
            NodeKind::Property { indexed } => {
                let name = self.eval_key(ast, children[0], ctx)?;
                let (getter, _) = self.property_source(ctx, target, &name, *indexed)?;
                let setter = self
                    .accessors()
                    .select(target)
                    .source_setter(ctx, target, &name, *indexed);
                Ok((getter, assignable(setter)?))
            }
            NodeKind::Chain => {
                let Some((&last, init)) = children.split_last() else {
                    return Err(unsupported_kind(ast, id));
                };
                if init.is_empty() {
                    return self.sources(ast, last, ctx, target);
                }
                let previous = ctx.current_chain().map(str::to_string);
                let (prefix, current) = self.chain_source(ast, init, ctx, target)?;
                if current.is_null() {
                    return Err(EvalError::unsupported(format!(
                        "`{}` is null, no accessor can follow it",
                        ast.display(init[init.len() - 1])
                    )));
                }
                ctx.set_current_chain(Some(prefix.code.clone()));
                let (last_getter, last_setter) = self.sources(ast, last, ctx, &current)?;
                ctx.set_current_chain(previous);
                if !last_getter.is_relative() {
                    return Err(unsupported_kind(ast, last));
                }

                let setter = last_setter
                    .filter(|code| SourceFragment::new(code.as_str(), None).is_relative())
                    .map(|code| format!("{}{}", prefix.clone().anchored().code, code));
                let getter = SourceFragment::new(
                    format!("{}{}", prefix.code, last_getter.code),
                    last_getter.result_type,
                );
                Ok((getter, setter))
            }
            NodeKind::Nary(op @ (NaryOp::And | NaryOp::Or)) => {
                let (first, second) = two_operands(*op, children)?;
                let (left, _) = self.get_source(ast, first, ctx, target)?;
                let (right, right_setter) = self.sources(ast, second, ctx, target)?;
                let condition = left.clone().anchored().code;
                let getter = logical_code(*op, &left.operand(ast, first), &right.operand(ast, second));
                let negation = if *op == NaryOp::Or { "!" } else { "" };
                let setter = right_setter.map(|code| {
                    let code = SourceFragment::new(code, None).anchored().code;
                    format!("if ({}booleanValue({})) {{ {}; }}", negation, condition, code)
                });
                Ok((SourceFragment::new(getter, None), setter))
            }
            _ => Ok((self.get_source(ast, id, ctx, target)?.0, None)),
        }
    }

    /// Getter source plus the value the node evaluates to, which becomes the
    /// target of the next chain segment
    fn get_source(
        &self,
        ast: &Ast,
        id: NodeId,
        ctx: &mut EvalContext,
        target: &Value,
    ) -> EvalResult<(SourceFragment, Value)> {
        let children = ast.children(id);
        let generated = match ast.kind(id) {
            NodeKind::Const(lit) => {
                let value = Value::from(lit);
                if let Value::Subscript(subscript) = value {
                    return Err(EvalError::unsupported(format!(
                        "{} is only meaningful as an index",
                        subscript
                    )));
                }
                (SourceFragment::typed(source_literal(&value), &value), value)
            }
            NodeKind::VarRef(name) if *name == self.config().root_variable => {
                (SourceFragment::typed("$root", ctx.root()), ctx.root().clone())
            }
            NodeKind::VarRef(name) if *name == self.config().this_variable => {
                (SourceFragment::typed("$this", target), target.clone())
            }
            NodeKind::VarRef(name) => {
                let value = ctx.variable(name).cloned().unwrap_or_default();
                (SourceFragment::typed(format!("$ctx.get({:?})", name), &value), value)
            }
            NodeKind::RootVarRef => (SourceFragment::typed("$root", ctx.root()), ctx.root().clone()),
            NodeKind::ThisVarRef => (SourceFragment::typed("$this", target), target.clone()),
            NodeKind::Property { indexed } => {
                let name = self.eval_key(ast, children[0], ctx)?;
                self.property_source(ctx, target, &name, *indexed)?
            }
            NodeKind::Method { name } => {
                let (args, values) = self.args_source(ast, children, ctx)?;
                let value = self.call_method(target, name, &values)?;
                (SourceFragment::typed(format!(".{}({})", name, args), &value), value)
            }
            NodeKind::StaticMethod { class, name } => {
                let (args, values) = self.args_source(ast, children, ctx)?;
                let value = self.call_static(class, name, &values)?;
                (SourceFragment::typed(format!("{}.{}({})", class, name, args), &value), value)
            }
            NodeKind::StaticField { class, name } => {
                let value = self.read_static_field(class, name)?;
                (SourceFragment::typed(format!("{}.{}", class, name), &value), value)
            }
            NodeKind::Ctor { class } => {
                let (args, values) = self.args_source(ast, children, ctx)?;
                let value = self.construct(class, &values)?;
                (SourceFragment::typed(format!("new {}({})", class, args), &value), value)
            }
            NodeKind::Chain => self.chain_source(ast, children, ctx, target)?,
            NodeKind::Test => {
                let (condition, condition_value) = self.get_source(ast, children[0], ctx, target)?;
                let (then, then_value) = self.get_source(ast, children[1], ctx, target)?;
                let (otherwise, otherwise_value) = self.get_source(ast, children[2], ctx, target)?;
                let code = format!(
                    "booleanValue({}) ? {} : {}",
                    condition.anchored().code,
                    then.operand(ast, children[1]),
                    otherwise.operand(ast, children[2])
                );
                let value = if ops::boolean_value(&condition_value) {
                    then_value
                } else {
                    otherwise_value
                };
                (SourceFragment::typed(code, &value), value)
            }
            NodeKind::Nary(op @ (NaryOp::And | NaryOp::Or)) => {
                let (first, second) = two_operands(*op, children)?;
                let (left, left_value) = self.get_source(ast, first, ctx, target)?;
                let (right, right_value) = self.get_source(ast, second, ctx, target)?;
                let code = logical_code(*op, &left.operand(ast, first), &right.operand(ast, second));
                let value = if ops::boolean_value(&left_value) == (*op == NaryOp::Or) {
                    left_value
                } else {
                    right_value
                };
                (SourceFragment::new(code, None), value)
            }
            NodeKind::Nary(op) => {
                let combine = arithmetic(*op).ok_or_else(|| unsupported_kind(ast, id))?;
                let mut parts = Vec::with_capacity(children.len());
                let mut widest: Option<TypeKey> = None;
                let mut value: Option<Value> = None;
                for &operand in children {
                    let (fragment, operand_value) = self.get_source(ast, operand, ctx, target)?;
                    if let Some(ty) = &fragment.result_type {
                        let wider = match &widest {
                            Some(current) => ops::is_wider(ty.as_str(), current.as_str()),
                            None => true,
                        };
                        if wider {
                            widest = Some(ty.clone());
                        }
                    }
                    value = Some(match value {
                        Some(acc) => combine(&acc, &operand_value)?,
                        None => operand_value,
                    });
                    parts.push(fragment.operand(ast, operand));
                }
                if let Some(ty) = &widest {
                    ast.node(id).record_type_hint(ty.as_str());
                }
                let code = parts.join(&format!(" {} ", op.symbol()));
                (SourceFragment::new(code, widest), value.unwrap_or_default())
            }
            NodeKind::Binary(op) => {
                let (left, left_value) = self.get_source(ast, children[0], ctx, target)?;
                let (right, right_value) = self.get_source(ast, children[1], ctx, target)?;
                let result_type = match op {
                    BinaryOp::Subtract
                    | BinaryOp::Divide
                    | BinaryOp::Remainder
                    | BinaryOp::ShiftLeft
                    | BinaryOp::ShiftRight
                    | BinaryOp::UnsignedShiftRight => match (&left.result_type, &right.result_type) {
                        (Some(l), Some(r)) if ops::is_wider(r.as_str(), l.as_str()) => Some(r.clone()),
                        (Some(l), _) => Some(l.clone()),
                        (None, r) => r.clone(),
                    },
                    _ => Some(TypeKey::new("Boolean")),
                };
                let code = format!(
                    "{} {} {}",
                    left.operand(ast, children[0]),
                    op.symbol(),
                    right.operand(ast, children[1])
                );
                let value = binary(*op, &left_value, &right_value)?;
                (SourceFragment::new(code, result_type), value)
            }
            NodeKind::Unary(op) => {
                let (operand, operand_value) = self.get_source(ast, children[0], ctx, target)?;
                let result_type = match op {
                    UnaryOp::Not => Some(TypeKey::new("Boolean")),
                    UnaryOp::Negate | UnaryOp::BitNegate => operand.result_type.clone(),
                };
                let code = format!("{}{}", op.symbol(), operand.operand(ast, children[0]));
                let value = unary(*op, &operand_value)?;
                (SourceFragment::new(code, result_type), value)
            }
            NodeKind::List | NodeKind::Map | NodeKind::Sequence | NodeKind::Assign => {
                return Err(unsupported_kind(ast, id));
            }
        };
        Ok(generated)
    }

    fn property_source(
        &self,
        ctx: &mut EvalContext,
        target: &Value,
        name: &Value,
        indexed: bool,
    ) -> EvalResult<(SourceFragment, Value)> {
        if target.is_null() {
            return Err(EvalError::unsupported(format!(
                "cannot generate an accessor for {} on null",
                name
            )));
        }
        let accessor = self.accessors().select(target);
        let code = accessor.source_accessor(ctx, target, name, indexed)?;
        let value = accessor.get_property(ctx, target, name, indexed)?;
        Ok((SourceFragment::typed(code, &value), value))
    }

    /// Argument source and values; arguments are evaluated against the root
    fn args_source(&self, ast: &Ast, args: &[NodeId], ctx: &mut EvalContext) -> EvalResult<(String, Vec<Value>)> {
        let root = ctx.root().clone();
        let mut parts = Vec::with_capacity(args.len());
        let mut values = Vec::with_capacity(args.len());
        for &arg in args {
            let (fragment, value) = self.get_source(ast, arg, ctx, &root)?;
            let code = if fragment.is_relative() {
                format!("$root{}", fragment.code)
            } else {
                fragment.code
            };
            parts.push(code);
            values.push(value);
        }
        Ok((parts.join(", "), values))
    }

    fn chain_source(
        &self,
        ast: &Ast,
        segments: &[NodeId],
        ctx: &mut EvalContext,
        target: &Value,
    ) -> EvalResult<(SourceFragment, Value)> {
        let previous = ctx.current_chain().map(str::to_string);
        let mut code = String::new();
        let mut result_type = None;
        let mut current = target.clone();
        for (i, &segment) in segments.iter().enumerate() {
            if i > 0 && current.is_null() {
                return Err(EvalError::unsupported(format!(
                    "`{}` is null, no accessor can follow it",
                    ast.display(segments[i - 1])
                )));
            }
            let (fragment, value) = self.get_source(ast, segment, ctx, &current)?;
            if i == 0 {
                code = fragment.code;
            } else if fragment.is_relative() {
                code.push_str(&fragment.code);
            } else {
                return Err(unsupported_kind(ast, segment));
            }
            ctx.set_current_chain(Some(code.clone()));
            current = value;
            result_type = fragment.result_type;
        }
        ctx.set_current_chain(previous);
        Ok((SourceFragment::new(code, result_type), current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::registry::{ClassBuilder, ClassRegistry};
    use crate::value::MapRef;
    use navex_ast::AstBuilder;

    fn evaluator() -> Evaluator {
        Evaluator::new(Arc::new(ClassRegistry::new()))
    }

    #[test]
    fn test_add_records_widest_type() {
        let mut b = AstBuilder::new();
        let int = b.constant(2);
        let double = b.constant(3.5);
        let sum = b.add(int, double);
        let ast = b.finish(sum).unwrap();
        let mut ctx = EvalContext::default();

        let fragment = evaluator().to_get_source(&ast, ast.root(), &mut ctx, &Value::Null).unwrap();
        assert_eq!(fragment.code, "2 + 3.5");
        assert_eq!(fragment.result_type, Some(TypeKey::new("Double")));
        assert_eq!(ast.node(ast.root()).type_hint(), Some("Double"));
    }

    #[test]
    fn test_logical_needs_two_operands() {
        let mut b = AstBuilder::new();
        let x = b.var("x");
        let y = b.var("y");
        let z = b.var("z");
        let and = b.nary(NaryOp::And, vec![x, y, z]);
        let ast = b.finish(and).unwrap();
        let mut ctx = EvalContext::default();

        let err = evaluator().to_get_source(&ast, ast.root(), &mut ctx, &Value::Null).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedCompilation(_)));
    }

    #[test]
    fn test_map_getter_and_setter() {
        let mut b = AstBuilder::new();
        let key = b.string("x");
        let index = b.index(key);
        let ast = b.finish(index).unwrap();
        let root = Value::map_from([("x", Value::Int(1))]);
        let mut ctx = EvalContext::new(root);

        let compiled = evaluator().compile(Arc::new(ast), &mut ctx).unwrap();
        assert_eq!(compiled.getter_source().unwrap().code, "$this.get(\"x\")");
        assert_eq!(compiled.setter_source().unwrap().code, "$this.put(\"x\", $value)");
        assert!(!compiled.is_native());
    }

    #[test]
    fn test_compile_invokes_each_method_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut registry = ClassRegistry::new();
        registry.register(
            ClassBuilder::new("Map", Value::as_map)
                .method("next", 0, |_: &MapRef, _: &[Value]| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::map_from([("k", Value::Int(1))]))
                })
                .build(),
        );
        let evaluator = Evaluator::new(Arc::new(registry));

        let mut b = AstBuilder::new();
        let next = b.method("next", vec![]);
        let key = b.string("k");
        let index = b.index(key);
        let chain = b.chain(vec![next, index]);
        let ast = b.finish(chain).unwrap();
        let mut ctx = EvalContext::new(Value::map_from([("a", Value::Int(0))]));

        let compiled = evaluator.compile(Arc::new(ast), &mut ctx).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert_eq!(compiled.getter_source().unwrap().code, "$this.next().get(\"k\")");
        assert_eq!(
            compiled.setter_source().unwrap().code,
            "$this.next().put(\"k\", $value)"
        );
    }

    #[test]
    fn test_list_literal_not_compilable() {
        let mut b = AstBuilder::new();
        let one = b.constant(1);
        let list = b.list(vec![one]);
        let ast = b.finish(list).unwrap();
        let mut ctx = EvalContext::default();

        let err = evaluator().compile(Arc::new(ast), &mut ctx).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedCompilation(_)));
    }
}
