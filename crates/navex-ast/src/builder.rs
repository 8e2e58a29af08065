//! Tree construction
//!
//! A parser (or a host assembling expressions by hand) pushes nodes bottom-up
//! and calls [`AstBuilder::finish`] once. `finish` validates the tree shape,
//! collapses nested associative operators into single n-ary nodes, and builds
//! the parent side table.

use std::sync::Arc;

use crate::ast::{
    Ast, BinaryOp, DynamicSubscript, Literal, NaryOp, Node, NodeId, NodeKind, UnaryOp,
};
use crate::error::{AstError, AstResult};

/// Bottom-up builder for an [`Ast`]
#[derive(Debug, Default)]
pub struct AstBuilder {
    nodes: Vec<Node>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a node with the given children and return its id
    pub fn push(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::new(kind, children));
        id
    }

    pub fn constant(&mut self, literal: impl Into<Literal>) -> NodeId {
        self.push(NodeKind::Const(literal.into()), Vec::new())
    }

    pub fn null(&mut self) -> NodeId {
        self.constant(Literal::Null)
    }

    pub fn string(&mut self, s: &str) -> NodeId {
        self.constant(Literal::String(Arc::from(s)))
    }

    pub fn var(&mut self, name: &str) -> NodeId {
        self.push(NodeKind::VarRef(name.to_string()), Vec::new())
    }

    pub fn root_ref(&mut self) -> NodeId {
        self.push(NodeKind::RootVarRef, Vec::new())
    }

    pub fn this_ref(&mut self) -> NodeId {
        self.push(NodeKind::ThisVarRef, Vec::new())
    }

    /// `name` property access
    pub fn property(&mut self, name: &str) -> NodeId {
        let key = self.string(name);
        self.push(NodeKind::Property { indexed: false }, vec![key])
    }

    /// `[index]` access with an arbitrary index expression
    pub fn index(&mut self, index: NodeId) -> NodeId {
        self.push(NodeKind::Property { indexed: true }, vec![index])
    }

    /// `[#first]`, `[#mid]`, `[#last]` or `[#all]`
    pub fn subscript(&mut self, subscript: DynamicSubscript) -> NodeId {
        let key = self.constant(subscript);
        self.index(key)
    }

    pub fn method(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        self.push(
            NodeKind::Method {
                name: name.to_string(),
            },
            args,
        )
    }

    pub fn static_method(&mut self, class: &str, name: &str, args: Vec<NodeId>) -> NodeId {
        self.push(
            NodeKind::StaticMethod {
                class: class.to_string(),
                name: name.to_string(),
            },
            args,
        )
    }

    pub fn static_field(&mut self, class: &str, name: &str) -> NodeId {
        self.push(
            NodeKind::StaticField {
                class: class.to_string(),
                name: name.to_string(),
            },
            Vec::new(),
        )
    }

    pub fn ctor(&mut self, class: &str, args: Vec<NodeId>) -> NodeId {
        self.push(
            NodeKind::Ctor {
                class: class.to_string(),
            },
            args,
        )
    }

    pub fn chain(&mut self, segments: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Chain, segments)
    }

    /// Chain of plain property names, e.g. `["person", "address", "city"]`
    pub fn path(&mut self, names: &[&str]) -> NodeId {
        let segments = names.iter().map(|name| self.property(name)).collect();
        self.chain(segments)
    }

    pub fn list(&mut self, items: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::List, items)
    }

    pub fn map(&mut self, entries: Vec<(NodeId, NodeId)>) -> NodeId {
        let children = entries.into_iter().flat_map(|(k, v)| [k, v]).collect();
        self.push(NodeKind::Map, children)
    }

    pub fn sequence(&mut self, items: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Sequence, items)
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.push(NodeKind::Assign, vec![target, value])
    }

    pub fn test(&mut self, condition: NodeId, then: NodeId, otherwise: NodeId) -> NodeId {
        self.push(NodeKind::Test, vec![condition, then, otherwise])
    }

    pub fn nary(&mut self, op: NaryOp, operands: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::Nary(op), operands)
    }

    pub fn add(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.nary(NaryOp::Add, vec![left, right])
    }

    pub fn multiply(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.nary(NaryOp::Multiply, vec![left, right])
    }

    pub fn and(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.nary(NaryOp::And, vec![left, right])
    }

    pub fn or(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.nary(NaryOp::Or, vec![left, right])
    }

    pub fn binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        self.push(NodeKind::Binary(op), vec![left, right])
    }

    pub fn unary(&mut self, op: UnaryOp, operand: NodeId) -> NodeId {
        self.push(NodeKind::Unary(op), vec![operand])
    }

    /// Validate, flatten and seal the tree rooted at `root`
    pub fn finish(self, root: NodeId) -> AstResult<Ast> {
        let mut nodes = self.nodes;
        validate(&nodes, root)?;
        flatten(&mut nodes, root);

        let mut parents = vec![None; nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for &child in &nodes[id.index()].children {
                parents[child.index()] = Some(id);
                stack.push(child);
            }
        }

        Ok(Ast {
            nodes,
            root,
            parents,
        })
    }
}

fn validate(nodes: &[Node], root: NodeId) -> AstResult<()> {
    if root.index() >= nodes.len() {
        return Err(AstError::InvalidNode(root));
    }

    let mut seen = vec![false; nodes.len()];
    seen[root.index()] = true;
    let mut stack = vec![root];

    while let Some(id) = stack.pop() {
        let node = &nodes[id.index()];
        check_arity(id, node)?;
        for &child in &node.children {
            let slot = seen
                .get_mut(child.index())
                .ok_or(AstError::InvalidNode(child))?;
            if *slot {
                return Err(AstError::SharedNode(child));
            }
            *slot = true;
            stack.push(child);
        }
    }
    Ok(())
}

fn check_arity(id: NodeId, node: &Node) -> AstResult<()> {
    let actual = node.children.len();
    let expect = |ok: bool, expected: &str| {
        if ok {
            Ok(())
        } else {
            Err(AstError::arity(id, node.kind.name(), expected, actual))
        }
    };

    match &node.kind {
        NodeKind::Const(_)
        | NodeKind::VarRef(_)
        | NodeKind::RootVarRef
        | NodeKind::ThisVarRef
        | NodeKind::StaticField { .. } => expect(actual == 0, "0"),
        NodeKind::Property { .. } | NodeKind::Unary(_) => expect(actual == 1, "1"),
        NodeKind::Assign | NodeKind::Binary(_) => expect(actual == 2, "2"),
        NodeKind::Test => expect(actual == 3, "3"),
        NodeKind::Nary(_) => expect(actual >= 2, "at least 2"),
        NodeKind::Map => expect(actual % 2 == 0, "an even number of"),
        NodeKind::Chain => {
            if actual == 0 {
                Err(AstError::EmptyChain(id))
            } else {
                Ok(())
            }
        }
        NodeKind::Sequence => expect(actual >= 1, "at least 1"),
        NodeKind::Method { .. }
        | NodeKind::StaticMethod { .. }
        | NodeKind::Ctor { .. }
        | NodeKind::List => Ok(()),
    }
}

/// Collapse `a + (b + c)` into one `+` node with three children, bottom-up.
fn flatten(nodes: &mut [Node], id: NodeId) {
    let children = nodes[id.index()].children.clone();
    for &child in &children {
        flatten(nodes, child);
    }

    if !nodes[id.index()].kind.is_associative() {
        return;
    }

    let kind = nodes[id.index()].kind.clone();
    let mut merged = Vec::with_capacity(children.len());
    for child in children {
        if nodes[child.index()].kind == kind {
            merged.extend(nodes[child.index()].children.iter().copied());
        } else {
            merged.push(child);
        }
    }
    nodes[id.index()].children = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested_add() {
        let mut b = AstBuilder::new();
        let a = b.property("a");
        let bb = b.property("b");
        let c = b.property("c");
        let inner = b.add(a, bb);
        let outer = b.add(inner, c);
        let ast = b.finish(outer).unwrap();

        assert_eq!(ast.children(outer), &[a, bb, c]);
        assert_eq!(ast.parent(a), Some(outer));
        assert_eq!(ast.parent(c), Some(outer));
        assert_eq!(ast.parent(outer), None);
        assert!(ast.is_root(outer));
    }

    #[test]
    fn test_flatten_keeps_different_operators() {
        let mut b = AstBuilder::new();
        let x = b.property("x");
        let y = b.property("y");
        let z = b.property("z");
        let product = b.multiply(x, y);
        let sum = b.add(product, z);
        let ast = b.finish(sum).unwrap();

        assert_eq!(ast.children(sum), &[product, z]);
        assert_eq!(ast.children(product), &[x, y]);
        assert_eq!(ast.parent(x), Some(product));
    }

    #[test]
    fn test_flatten_and_chain() {
        let mut b = AstBuilder::new();
        let p = b.var("p");
        let q = b.var("q");
        let r = b.var("r");
        let s = b.var("s");
        let left = b.and(p, q);
        let right = b.and(r, s);
        let all = b.and(left, right);
        let ast = b.finish(all).unwrap();

        assert_eq!(ast.children(all), &[p, q, r, s]);
        assert_eq!(ast.node_count(), 5);
    }

    #[test]
    fn test_rejects_shared_node() {
        let mut b = AstBuilder::new();
        let a = b.property("a");
        let sum = b.add(a, a);
        assert_eq!(b.finish(sum).unwrap_err(), AstError::SharedNode(a));
    }

    #[test]
    fn test_rejects_bad_arity() {
        let mut b = AstBuilder::new();
        let a = b.property("a");
        let test = b.push(NodeKind::Test, vec![a]);
        assert!(matches!(
            b.finish(test),
            Err(AstError::Arity { actual: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_chain() {
        let mut b = AstBuilder::new();
        let chain = b.chain(Vec::new());
        assert_eq!(b.finish(chain).unwrap_err(), AstError::EmptyChain(chain));
    }

    #[test]
    fn test_rejects_unknown_root() {
        let b = AstBuilder::new();
        assert!(matches!(
            b.finish(NodeId::new(3)),
            Err(AstError::InvalidNode(_))
        ));
    }
}
