//! Symbolic recording: placeholders that capture an algorithm's operation
//! sequence as kernel statements instead of computing values.
//!
//! One [`Recorder`] owns one recording session. A generic numeric algorithm
//! is run once over [`Sym<T>`] placeholders; every assignment it performs is
//! appended to the recorder as one kernel statement, in execution order. The
//! captured body plus the ordered parameter list is everything the kernel
//! assembler needs.
//!
//! Statement order is load-bearing (later statements reference variables
//! declared by earlier ones), so recording is strictly sequential. The
//! `Recorder` handle is an `Rc` and never crosses threads; independent
//! sessions each own their recorder and cannot interleave.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

mod expr;

pub use expr::{BinOp, Expr};

/// Element types a generated kernel can carry.
///
/// WGSL has no 64-bit float, so the supported set is `f32`, `i32`, `u32`.
pub trait Scalar: bytemuck::Pod + PartialEq + std::fmt::Debug + 'static {
    /// The WGSL spelling of the type.
    const TYPE_NAME: &'static str;

    /// Full round-trip precision literal text, suffixed so WGSL typing is
    /// exact. Regenerated kernels reproduce bit-identical constants.
    fn literal(self) -> String;
}

impl Scalar for f32 {
    const TYPE_NAME: &'static str = "f32";
    fn literal(self) -> String {
        // Shortest scientific form that parses back to the same value.
        format!("{:e}f", self)
    }
}

impl Scalar for i32 {
    const TYPE_NAME: &'static str = "i32";
    fn literal(self) -> String {
        format!("{}i", self)
    }
}

impl Scalar for u32 {
    const TYPE_NAME: &'static str = "u32";
    fn literal(self) -> String {
        format!("{}u", self)
    }
}

#[derive(Default)]
struct Trace {
    statements: Vec<String>,
    next_id: usize,
}

/// The trace sink for one recording session.
///
/// Cloning hands out another handle to the same session; statements from all
/// placeholders created against it interleave in execution order. Placeholder
/// ids come from one counter shared across every element type and kind, so
/// generated names never collide within a session.
#[derive(Clone, Default)]
pub struct Recorder {
    inner: Rc<RefCell<Trace>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one statement to the trace.
    pub fn record(&self, statement: String) {
        self.inner.borrow_mut().statements.push(statement);
    }

    fn fresh_id(&self) -> usize {
        let mut trace = self.inner.borrow_mut();
        let id = trace.next_id;
        trace.next_id += 1;
        id
    }

    /// The captured kernel body: every statement in recorded order, one per
    /// line.
    pub fn body(&self) -> String {
        let trace = self.inner.borrow();
        let mut out = String::new();
        for stmt in &trace.statements {
            out.push_str(stmt);
            out.push('\n');
        }
        out
    }

    /// The recorded statements, in order.
    pub fn statements(&self) -> Vec<String> {
        self.inner.borrow().statements.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the trace and reset numbering, ready for a fresh session.
    pub fn clear(&self) {
        let mut trace = self.inner.borrow_mut();
        trace.statements.clear();
        trace.next_id = 0;
    }
}

/// What a placeholder stands for in the generated kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// A kernel-local variable, declared inside the body.
    Local,
    /// One element per thread of a device vector parameter.
    VectorParam { is_const: bool },
    /// A by-value scalar parameter.
    ScalarParam,
}

/// A symbolic stand-in for one kernel variable.
///
/// Owns no data; it is a naming token. Arithmetic over placeholders builds
/// [`Expr`] trees, and assigning to a placeholder is the only point where an
/// expression is forced into trace text.
pub struct Sym<T: Scalar> {
    rec: Recorder,
    id: usize,
    role: Role,
    _marker: PhantomData<T>,
}

impl<T: Scalar> Sym<T> {
    fn with_role(rec: &Recorder, role: Role) -> Self {
        Sym {
            rec: rec.clone(),
            id: rec.fresh_id(),
            role,
            _marker: PhantomData,
        }
    }

    /// A local variable: declared in the trace immediately.
    pub fn local(rec: &Recorder) -> Self {
        let sym = Self::with_role(rec, Role::Local);
        rec.record(format!("var {}: {};", sym.name(), T::TYPE_NAME));
        sym
    }

    /// A mutable vector parameter. Emits nothing; parameters are declared by
    /// the assembler.
    pub fn vector_param(rec: &Recorder) -> Self {
        Self::with_role(rec, Role::VectorParam { is_const: false })
    }

    /// A read-only vector parameter.
    pub fn vector_param_const(rec: &Recorder) -> Self {
        Self::with_role(rec, Role::VectorParam { is_const: true })
    }

    /// A by-value scalar parameter.
    pub fn scalar_param(rec: &Recorder) -> Self {
        Self::with_role(rec, Role::ScalarParam)
    }

    /// The generated variable name (`var<N>`); part of the emitted-source
    /// contract.
    pub fn name(&self) -> String {
        format!("var{}", self.id)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Record `self = expr`. The single emission path for every assignment
    /// form, including the compound operators.
    pub fn assign<E: Into<Expr<T>>>(&mut self, expr: E) {
        let text = expr.into().to_text();
        self.rec.record(format!("{} = {};", self.name(), text));
    }

    // Relational and logical operators cannot be overloaded to return a
    // non-bool in Rust; these builders cover them.

    pub fn lt<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).lt(rhs)
    }

    pub fn le<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).le(rhs)
    }

    pub fn gt<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).gt(rhs)
    }

    pub fn ge<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).ge(rhs)
    }

    pub fn eq<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).eq(rhs)
    }

    pub fn ne<E: Into<Expr<T>>>(&self, rhs: E) -> Expr<T> {
        Expr::from(self).ne(rhs)
    }
}

impl<T: Scalar> Clone for Sym<T> {
    /// Copying is not aliasing: a clone is a new variable declared equal to
    /// the source's current value. Clones always have the local role, so a
    /// cloned parameter cannot masquerade as a kernel parameter.
    fn clone(&self) -> Self {
        let sym = Self::with_role(&self.rec, Role::Local);
        self.rec.record(format!(
            "var {}: {} = {};",
            sym.name(),
            T::TYPE_NAME,
            self.name()
        ));
        sym
    }
}
