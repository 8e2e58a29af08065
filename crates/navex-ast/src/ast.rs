//! Abstract Syntax Tree definitions for navex expressions

use std::fmt;
use std::sync::{Arc, OnceLock};

use num_bigint::BigInt;
use rust_decimal::Decimal;

/// Index of a node inside an [`Ast`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Symbolic position inside an array-like target, resolved against the
/// target's length when the expression runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DynamicSubscript {
    First,
    Mid,
    Last,
    All,
}

impl DynamicSubscript {
    /// Resolve to a concrete index for a sequence of `len` elements.
    ///
    /// Returns `None` for an empty sequence and for [`DynamicSubscript::All`],
    /// which does not denote a single element.
    pub fn resolve(self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self {
            DynamicSubscript::First => Some(0),
            DynamicSubscript::Mid => Some(len / 2),
            DynamicSubscript::Last => Some(len - 1),
            DynamicSubscript::All => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            DynamicSubscript::First => "#first",
            DynamicSubscript::Mid => "#mid",
            DynamicSubscript::Last => "#last",
            DynamicSubscript::All => "#all",
        }
    }
}

impl fmt::Display for DynamicSubscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Constant embedded in the tree
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    BigInteger(BigInt),
    BigDecimal(Decimal),
    String(Arc<str>),
    Subscript(DynamicSubscript),
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(Arc::from(s))
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Int(i)
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Double(f)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Boolean(b)
    }
}

impl From<DynamicSubscript> for Literal {
    fn from(s: DynamicSubscript) -> Self {
        Literal::Subscript(s)
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Associative operators stored as a single n-ary node after flattening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NaryOp {
    Add,
    Multiply,
    And,
    Or,
    BitAnd,
    BitOr,
    Xor,
}

impl NaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            NaryOp::Add => "+",
            NaryOp::Multiply => "*",
            NaryOp::And => "&&",
            NaryOp::Or => "||",
            NaryOp::BitAnd => "&",
            NaryOp::BitOr => "|",
            NaryOp::Xor => "^",
        }
    }

    /// Whether the operator is a logical (short-circuiting) one
    pub fn is_logical(self) -> bool {
        matches!(self, NaryOp::And | NaryOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Subtract,
    Divide,
    Remainder,
    ShiftLeft,
    ShiftRight,
    UnsignedShiftRight,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Subtract => "-",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::UnsignedShiftRight => ">>>",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Not,
    BitNegate,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNegate => "~",
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Node kind tag. Children live in [`Node::children`]; the comment on each
/// variant lists what they are.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// No children
    Const(Literal),
    /// `#name`, no children
    VarRef(String),
    /// `#root`, no children
    RootVarRef,
    /// `#this`, no children
    ThisVarRef,
    /// `name` or `[index]`; one child computing the name or index
    Property { indexed: bool },
    /// `name(args)`; children are the arguments
    Method { name: String },
    /// `@Class@name(args)`; children are the arguments
    StaticMethod { class: String, name: String },
    /// `@Class@name`, no children
    StaticField { class: String, name: String },
    /// `new Class(args)`; children are the arguments
    Ctor { class: String },
    /// `a.b[c].d()`; children are the segments
    Chain,
    /// `{a, b}`
    List,
    /// `#{k: v}`; children alternate key, value
    Map,
    /// `a, b`; yields the last child
    Sequence,
    /// `target = value`
    Assign,
    /// `cond ? then : else`
    Test,
    Nary(NaryOp),
    Binary(BinaryOp),
    Unary(UnaryOp),
}

impl NodeKind {
    /// Short name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Const(_) => "Const",
            NodeKind::VarRef(_) => "VarRef",
            NodeKind::RootVarRef => "RootVarRef",
            NodeKind::ThisVarRef => "ThisVarRef",
            NodeKind::Property { .. } => "Property",
            NodeKind::Method { .. } => "Method",
            NodeKind::StaticMethod { .. } => "StaticMethod",
            NodeKind::StaticField { .. } => "StaticField",
            NodeKind::Ctor { .. } => "Ctor",
            NodeKind::Chain => "Chain",
            NodeKind::List => "List",
            NodeKind::Map => "Map",
            NodeKind::Sequence => "Sequence",
            NodeKind::Assign => "Assign",
            NodeKind::Test => "Test",
            NodeKind::Nary(_) => "Nary",
            NodeKind::Binary(_) => "Binary",
            NodeKind::Unary(_) => "Unary",
        }
    }

    /// Operator text placed between operands, if this is an operator node
    pub fn expression_operator(&self) -> Option<&'static str> {
        match self {
            NodeKind::Nary(op) => Some(op.symbol()),
            NodeKind::Binary(op) => Some(op.symbol()),
            NodeKind::Unary(op) => Some(op.symbol()),
            NodeKind::Sequence => Some(","),
            NodeKind::Assign => Some("="),
            _ => None,
        }
    }

    /// Whether the flattening pass merges nested nodes of this kind
    pub fn is_associative(&self) -> bool {
        matches!(self, NodeKind::Nary(_) | NodeKind::Sequence)
    }

    /// Whether rendering needs parentheses when nested in an operator
    pub(crate) fn is_operator(&self) -> bool {
        matches!(
            self,
            NodeKind::Nary(_)
                | NodeKind::Binary(_)
                | NodeKind::Sequence
                | NodeKind::Assign
                | NodeKind::Test
        )
    }
}

/// A node in the arena
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    /// Result type observed for this node, recorded by the compilation hook
    type_hint: OnceLock<Arc<str>>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, children: Vec<NodeId>) -> Self {
        Self {
            kind,
            children,
            type_hint: OnceLock::new(),
        }
    }

    /// Cached result-type name, if one has been recorded
    pub fn type_hint(&self) -> Option<&str> {
        self.type_hint.get().map(|s| s.as_ref())
    }

    /// Record the result-type name. The first recorded hint wins.
    pub fn record_type_hint(&self, type_name: &str) {
        let _ = self.type_hint.set(Arc::from(type_name));
    }
}

/// A finished expression tree.
///
/// Nodes never point at their parent; parent lookups go through a side table
/// built once by [`AstBuilder::finish`](crate::AstBuilder::finish).
#[derive(Debug, Clone)]
pub struct Ast {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) parents: Vec<Option<NodeId>>,
}

impl Ast {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.node(id).children.get(index).copied()
    }

    /// Parent of `id`, or `None` for the root
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.index()).copied().flatten()
    }

    pub fn is_root(&self, id: NodeId) -> bool {
        id == self.root
    }

    /// Number of nodes reachable from the root
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.children(id).iter().copied());
        }
        count
    }

    /// Render a subtree as expression text
    pub fn display(&self, id: NodeId) -> crate::display::NodeDisplay<'_> {
        crate::display::NodeDisplay::new(self, id)
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display(self.root))
    }
}
