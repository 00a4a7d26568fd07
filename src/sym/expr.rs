//! Expression nodes: the tagged tree built transparently by operator
//! overloads over placeholders, literals, and other nodes.
//!
//! Stringification is pure and side-effect free; nothing reaches the
//! recorder until an assignment consumes the tree. Every emitted node is
//! fully parenthesized, so operator precedence in the kernel language can
//! never reorder a recorded computation.
//!
//! A node always has at least one symbolic operand: there is no way to build
//! an `Expr` from two plain literals, so "nothing to record" is rejected at
//! the type level.

use std::marker::PhantomData;
use std::ops::{
    Add, AddAssign, BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, BitXorAssign, Div, DivAssign,
    Mul, MulAssign, Rem, RemAssign, Shl, ShlAssign, Shr, ShrAssign, Sub, SubAssign,
};

use super::{Scalar, Sym};

/// Binary operator in a recorded expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    /// The operator's spelling in the kernel language.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Clone, Debug)]
enum Node {
    /// A pre-rendered literal.
    Lit(String),
    /// A placeholder leaf, by generated name.
    Var(String),
    Bin {
        op: BinOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
}

impl Node {
    fn text(&self) -> String {
        match self {
            Node::Lit(s) | Node::Var(s) => s.clone(),
            Node::Bin { op, lhs, rhs } => {
                format!("({} {} {})", lhs.text(), op.symbol(), rhs.text())
            }
        }
    }
}

/// An immutable binary-operation tree over placeholders and literals.
#[derive(Clone, Debug)]
pub struct Expr<T: Scalar> {
    node: Node,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Expr<T> {
    fn new(node: Node) -> Self {
        Expr {
            node,
            _marker: PhantomData,
        }
    }

    pub(crate) fn binary(self, op: BinOp, rhs: Expr<T>) -> Expr<T> {
        Expr::new(Node::Bin {
            op,
            lhs: Box::new(self.node),
            rhs: Box::new(rhs.node),
        })
    }

    /// Render the tree, fully parenthesized.
    pub fn to_text(&self) -> String {
        self.node.text()
    }

    pub fn lt(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Lt, rhs.into())
    }

    pub fn le(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Le, rhs.into())
    }

    pub fn gt(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Gt, rhs.into())
    }

    pub fn ge(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Ge, rhs.into())
    }

    pub fn eq(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Eq, rhs.into())
    }

    pub fn ne(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Ne, rhs.into())
    }

    pub fn and(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::And, rhs.into())
    }

    pub fn or(self, rhs: impl Into<Expr<T>>) -> Expr<T> {
        self.binary(BinOp::Or, rhs.into())
    }
}

impl<T: Scalar> From<T> for Expr<T> {
    fn from(value: T) -> Self {
        Expr::new(Node::Lit(value.literal()))
    }
}

impl<T: Scalar> From<&Sym<T>> for Expr<T> {
    fn from(sym: &Sym<T>) -> Self {
        Expr::new(Node::Var(sym.name()))
    }
}

impl<T: Scalar> From<Sym<T>> for Expr<T> {
    fn from(sym: Sym<T>) -> Self {
        Expr::new(Node::Var(sym.name()))
    }
}

// Arithmetic and bitwise operators where the left operand is symbolic. The
// right operand is anything convertible to an expression of the same element
// type (placeholder, nested expression, or literal).
macro_rules! symbolic_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Scalar, R: Into<Expr<T>>> $trait<R> for Expr<T> {
            type Output = Expr<T>;
            fn $method(self, rhs: R) -> Expr<T> {
                self.binary($op, rhs.into())
            }
        }

        impl<T: Scalar, R: Into<Expr<T>>> $trait<R> for Sym<T> {
            type Output = Expr<T>;
            fn $method(self, rhs: R) -> Expr<T> {
                Expr::from(&self).binary($op, rhs.into())
            }
        }

        impl<T: Scalar, R: Into<Expr<T>>> $trait<R> for &Sym<T> {
            type Output = Expr<T>;
            fn $method(self, rhs: R) -> Expr<T> {
                Expr::from(self).binary($op, rhs.into())
            }
        }
    };
}

symbolic_binop!(Add, add, BinOp::Add);
symbolic_binop!(Sub, sub, BinOp::Sub);
symbolic_binop!(Mul, mul, BinOp::Mul);
symbolic_binop!(Div, div, BinOp::Div);
symbolic_binop!(Rem, rem, BinOp::Rem);
symbolic_binop!(BitAnd, bitand, BinOp::BitAnd);
symbolic_binop!(BitOr, bitor, BinOp::BitOr);
symbolic_binop!(BitXor, bitxor, BinOp::BitXor);
symbolic_binop!(Shl, shl, BinOp::Shl);
symbolic_binop!(Shr, shr, BinOp::Shr);

// Literal left operands need one impl per concrete scalar type (a generic
// `impl Add<Sym<T>> for T` would leave T uncovered under the orphan rules).
macro_rules! literal_lhs_one {
    ($t:ty, $trait:ident, $method:ident, $op:expr) => {
        impl $trait<Sym<$t>> for $t {
            type Output = Expr<$t>;
            fn $method(self, rhs: Sym<$t>) -> Expr<$t> {
                Expr::from(self).binary($op, Expr::from(&rhs))
            }
        }

        impl $trait<&Sym<$t>> for $t {
            type Output = Expr<$t>;
            fn $method(self, rhs: &Sym<$t>) -> Expr<$t> {
                Expr::from(self).binary($op, Expr::from(rhs))
            }
        }

        impl $trait<Expr<$t>> for $t {
            type Output = Expr<$t>;
            fn $method(self, rhs: Expr<$t>) -> Expr<$t> {
                Expr::from(self).binary($op, rhs)
            }
        }
    };
}

macro_rules! literal_lhs {
    ($t:ty) => {
        literal_lhs_one!($t, Add, add, BinOp::Add);
        literal_lhs_one!($t, Sub, sub, BinOp::Sub);
        literal_lhs_one!($t, Mul, mul, BinOp::Mul);
        literal_lhs_one!($t, Div, div, BinOp::Div);
        literal_lhs_one!($t, Rem, rem, BinOp::Rem);
        literal_lhs_one!($t, BitAnd, bitand, BinOp::BitAnd);
        literal_lhs_one!($t, BitOr, bitor, BinOp::BitOr);
        literal_lhs_one!($t, BitXor, bitxor, BinOp::BitXor);
        literal_lhs_one!($t, Shl, shl, BinOp::Shl);
        literal_lhs_one!($t, Shr, shr, BinOp::Shr);
    };
}

literal_lhs!(f32);
literal_lhs!(i32);
literal_lhs!(u32);

// `a op= b` is plain assignment of the equivalent binary expression, so
// every statement goes through the one emission path in `Sym::assign`.
macro_rules! compound_assign {
    ($trait:ident, $method:ident, $op:expr) => {
        impl<T: Scalar, R: Into<Expr<T>>> $trait<R> for Sym<T> {
            fn $method(&mut self, rhs: R) {
                let expr = Expr::from(&*self).binary($op, rhs.into());
                self.assign(expr);
            }
        }
    };
}

compound_assign!(AddAssign, add_assign, BinOp::Add);
compound_assign!(SubAssign, sub_assign, BinOp::Sub);
compound_assign!(MulAssign, mul_assign, BinOp::Mul);
compound_assign!(DivAssign, div_assign, BinOp::Div);
compound_assign!(RemAssign, rem_assign, BinOp::Rem);
compound_assign!(BitAndAssign, bitand_assign, BinOp::BitAnd);
compound_assign!(BitOrAssign, bitor_assign, BinOp::BitOr);
compound_assign!(BitXorAssign, bitxor_assign, BinOp::BitXor);
compound_assign!(ShlAssign, shl_assign, BinOp::Shl);
compound_assign!(ShrAssign, shr_assign, BinOp::Shr);
