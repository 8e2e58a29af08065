//! Rendering of trees back to expression text

use std::fmt;

use crate::ast::{Ast, Literal, NodeId, NodeKind};

/// Displays the subtree rooted at a node
pub struct NodeDisplay<'a> {
    ast: &'a Ast,
    id: NodeId,
}

impl<'a> NodeDisplay<'a> {
    pub(crate) fn new(ast: &'a Ast, id: NodeId) -> Self {
        Self { ast, id }
    }

    fn child(&self, id: NodeId) -> NodeDisplay<'a> {
        NodeDisplay::new(self.ast, id)
    }

    /// Render an operand, parenthesized when it is itself an operator
    fn operand(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        if self.ast.kind(id).is_operator() {
            write!(f, "({})", self.child(id))
        } else {
            write!(f, "{}", self.child(id))
        }
    }

    fn joined(&self, f: &mut fmt::Formatter<'_>, ids: &[NodeId], sep: &str) -> fmt::Result {
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                f.write_str(sep)?;
            }
            write!(f, "{}", self.child(id))?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let children = self.ast.children(self.id);
        match self.ast.kind(self.id) {
            NodeKind::Const(lit) => write_literal(f, lit),
            NodeKind::VarRef(name) => write!(f, "#{}", name),
            NodeKind::RootVarRef => f.write_str("#root"),
            NodeKind::ThisVarRef => f.write_str("#this"),
            NodeKind::Property { indexed } => {
                let key = children[0];
                match (indexed, self.ast.kind(key)) {
                    (false, NodeKind::Const(Literal::String(name))) => f.write_str(name),
                    (false, _) => write!(f, "{}", self.child(key)),
                    (true, _) => write!(f, "[{}]", self.child(key)),
                }
            }
            NodeKind::Method { name } => {
                write!(f, "{}(", name)?;
                self.joined(f, children, ", ")?;
                f.write_str(")")
            }
            NodeKind::StaticMethod { class, name } => {
                write!(f, "@{}@{}(", class, name)?;
                self.joined(f, children, ", ")?;
                f.write_str(")")
            }
            NodeKind::StaticField { class, name } => write!(f, "@{}@{}", class, name),
            NodeKind::Ctor { class } => {
                write!(f, "new {}(", class)?;
                self.joined(f, children, ", ")?;
                f.write_str(")")
            }
            NodeKind::Chain => {
                for (i, &segment) in children.iter().enumerate() {
                    let indexed = matches!(
                        self.ast.kind(segment),
                        NodeKind::Property { indexed: true }
                    );
                    if i > 0 && !indexed {
                        f.write_str(".")?;
                    }
                    self.operand(f, segment)?;
                }
                Ok(())
            }
            NodeKind::List => {
                f.write_str("{ ")?;
                self.joined(f, children, ", ")?;
                f.write_str(" }")
            }
            NodeKind::Map => {
                f.write_str("#{ ")?;
                for (i, pair) in children.chunks(2).enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} : {}", self.child(pair[0]), self.child(pair[1]))?;
                }
                f.write_str(" }")
            }
            NodeKind::Sequence => self.joined(f, children, ", "),
            NodeKind::Assign => {
                write!(f, "{} = ", self.child(children[0]))?;
                self.operand(f, children[1])
            }
            NodeKind::Test => {
                self.operand(f, children[0])?;
                f.write_str(" ? ")?;
                self.operand(f, children[1])?;
                f.write_str(" : ")?;
                self.operand(f, children[2])
            }
            NodeKind::Nary(op) => {
                for (i, &operand) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", op.symbol())?;
                    }
                    self.operand(f, operand)?;
                }
                Ok(())
            }
            NodeKind::Binary(op) => {
                self.operand(f, children[0])?;
                write!(f, " {} ", op.symbol())?;
                self.operand(f, children[1])
            }
            NodeKind::Unary(op) => {
                f.write_str(op.symbol())?;
                self.operand(f, children[0])
            }
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, lit: &Literal) -> fmt::Result {
    match lit {
        Literal::Null => f.write_str("null"),
        Literal::Boolean(b) => write!(f, "{}", b),
        Literal::Byte(b) => write!(f, "{}", b),
        Literal::Short(s) => write!(f, "{}", s),
        Literal::Char(c) => write!(f, "'{}'", c.escape_default()),
        Literal::Int(i) => write!(f, "{}", i),
        Literal::Long(l) => write!(f, "{}L", l),
        Literal::Float(x) => write!(f, "{:?}f", x),
        Literal::Double(x) => write!(f, "{:?}", x),
        Literal::BigInteger(i) => write!(f, "{}H", i),
        Literal::BigDecimal(d) => write!(f, "{}B", d),
        Literal::String(s) => write!(f, "\"{}\"", s.escape_default()),
        Literal::Subscript(s) => write!(f, "{}", s),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, DynamicSubscript, UnaryOp};
    use crate::builder::AstBuilder;

    #[test]
    fn test_render_chain_with_subscript() {
        let mut b = AstBuilder::new();
        let list = b.property("list");
        let last = b.subscript(DynamicSubscript::Last);
        let name = b.property("name");
        let chain = b.chain(vec![list, last, name]);
        let ast = b.finish(chain).unwrap();
        assert_eq!(ast.to_string(), "list[#last].name");
    }

    #[test]
    fn test_render_operators() {
        let mut b = AstBuilder::new();
        let a = b.property("a");
        let two = b.constant(2);
        let sum = b.add(a, two);
        let c = b.var("c");
        let neg = b.unary(UnaryOp::Negate, c);
        let cmp = b.binary(BinaryOp::Less, sum, neg);
        let ast = b.finish(cmp).unwrap();
        insta::assert_snapshot!(ast.to_string(), @"(a + 2) < -#c");
    }

    #[test]
    fn test_render_calls() {
        let mut b = AstBuilder::new();
        let s = b.string("x");
        let call = b.method("put", vec![s]);
        let target = b.property("values");
        let chain = b.chain(vec![target, call]);
        let one = b.constant(1.5);
        let ctor = b.ctor("Point", vec![one]);
        let seq = b.sequence(vec![chain, ctor]);
        let ast = b.finish(seq).unwrap();
        insta::assert_snapshot!(ast.to_string(), @r#"values.put("x"), new Point(1.5)"#);
    }
}
