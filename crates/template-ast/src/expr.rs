//! Expression AST for binding values, event handlers and interpolations.
//!
//! Expression-language parsing is the host's job; bindings arrive here
//! already parsed. Every node carries the span of the source text it was
//! parsed from, so the transpiler can re-emit it with exact mappings.

use smol_str::SmolStr;
use source_map::Span;

/// A parsed expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A property read off an optional receiver: `user.name`, or a bare
    /// `name` when `receiver` is `None`. `safe` marks `?.` access.
    PropertyRead {
        receiver: Option<Box<Expr>>,
        name: SmolStr,
        name_span: Span,
        span: Span,
        safe: bool,
    },
    /// An indexed read: `receiver[key]`.
    KeyedRead {
        receiver: Box<Expr>,
        key: Box<Expr>,
        span: Span,
        safe: bool,
    },
    /// A call. `safe` marks `callee?.()`.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
        safe: bool,
    },
    /// A pipe application: `input | name:arg1:arg2`.
    Pipe {
        input: Box<Expr>,
        name: SmolStr,
        name_span: Span,
        args: Vec<Expr>,
        span: Span,
    },
    /// A number, boolean, `null` or `undefined` literal, kept as written.
    Literal { text: SmolStr, span: Span },
    /// A string literal, kept with its quotes.
    StringLiteral { text: SmolStr, span: Span },
    /// `[a, b, c]`.
    ArrayLiteral { elements: Vec<Expr>, span: Span },
    /// `{key: value, …}`.
    ObjectLiteral { entries: Vec<ObjectEntry>, span: Span },
    /// A binary operation, `op` kept as written (`+`, `&&`, `??`, …).
    Binary {
        op: SmolStr,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// A prefix unary operation (`!`, `-`, `+`).
    Unary {
        op: SmolStr,
        operand: Box<Expr>,
        span: Span,
    },
    /// `condition ? then_expr : else_expr`.
    Conditional {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
        span: Span,
    },
    /// `target = value`.
    Assignment {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    /// A non-null assertion: `inner!`.
    NonNull { inner: Box<Expr>, span: Span },
    /// `(inner)`.
    Paren { inner: Box<Expr>, span: Span },
    /// An explicit `this`.
    This { span: Span },
}

/// One `key: value` entry of an object literal.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: SmolStr,
    pub key_span: Option<Span>,
    pub value: Expr,
}

impl Expr {
    /// The source span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::PropertyRead { span, .. }
            | Expr::KeyedRead { span, .. }
            | Expr::Call { span, .. }
            | Expr::Pipe { span, .. }
            | Expr::Literal { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::ArrayLiteral { span, .. }
            | Expr::ObjectLiteral { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Conditional { span, .. }
            | Expr::Assignment { span, .. }
            | Expr::NonNull { span, .. }
            | Expr::Paren { span, .. }
            | Expr::This { span } => *span,
        }
    }

    /// Returns the name of a bare, receiver-less property read, if this is
    /// one. These are the reads that can resolve to template-local symbols.
    pub fn as_implicit_read(&self) -> Option<&SmolStr> {
        match self {
            Expr::PropertyRead {
                receiver: None,
                name,
                ..
            } => Some(name),
            _ => None,
        }
    }

    /// Convenience constructor for a bare property read.
    pub fn read(name: impl Into<SmolStr>, span: Span) -> Expr {
        Expr::PropertyRead {
            receiver: None,
            name: name.into(),
            name_span: span,
            span,
            safe: false,
        }
    }

    /// Convenience constructor for a literal kept as written.
    pub fn literal(text: impl Into<SmolStr>, span: Span) -> Expr {
        Expr::Literal {
            text: text.into(),
            span,
        }
    }
}

/// A statement inside an event-handler body.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// An expression statement.
    Expr(Expr),
}

impl Stmt {
    /// The source span of this statement.
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(expr) => expr.span(),
        }
    }
}
