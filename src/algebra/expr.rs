//! Scalar and path expression variants.
//!
//! Expressions form one of the two families of the algebra tree. The
//! scalar core is `Constant`, `Variable`, `BinaryOp`, and
//! `FunctionCall`; the path sub-language (`PathIdentity`, `PathGet`,
//! `PathCompare`, `PathConstant`) composes field navigation and is
//! applied to a value through the `EvalPath`/`EvalFilter` wrappers.
//! Path lowering rewrites the path family away, leaving only the scalar
//! core for expression lowering.

// Allow arithmetic method names that match std traits - these return
// new expressions, not Self.
#![allow(clippy::should_implement_trait)]

use std::fmt;

use super::value::Value;

/// A projection name: a symbolic identifier for a value flowing between
/// plan nodes, resolved to a slot only at lowering time.
pub type ProjectionName = String;

/// A stored field name used by path navigation and scan projections.
pub type FieldName = String;

/// Binary operators usable in scalar expressions and path comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Equality.
    Eq,
    /// Inequality.
    NotEq,
    /// Less than.
    Lt,
    /// Less than or equal.
    LtEq,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    GtEq,
    /// Logical AND.
    And,
    /// Logical OR.
    Or,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl Operator {
    /// Whether this operator is a comparison producing a boolean.
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        };
        write!(f, "{s}")
    }
}

/// A scalar or path expression in the algebra tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A tagged constant value.
    Constant(Value),

    /// A named reference to a projection.
    Variable(ProjectionName),

    /// A binary operation over two sub-expressions.
    BinaryOp {
        /// The operator.
        op: Operator,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },

    /// A named function call with ordered arguments.
    ///
    /// Argument evaluation order is unspecified by the algebra.
    FunctionCall {
        /// Function name.
        name: String,
        /// Arguments, in declaration order.
        args: Vec<Expr>,
    },

    /// Applies a path to an input expression, producing the navigated value.
    EvalPath {
        /// The path to apply (must be a path variant).
        path: Box<Expr>,
        /// The input value the path navigates.
        input: Box<Expr>,
    },

    /// Applies a path to an input expression, producing a boolean.
    EvalFilter {
        /// The path to apply (must be a path variant).
        path: Box<Expr>,
        /// The input value the path navigates.
        input: Box<Expr>,
    },

    /// The identity path: yields its input unchanged.
    PathIdentity,

    /// Navigates into a field, then applies a sub-path to the field value.
    PathGet {
        /// The field to read.
        field: FieldName,
        /// The path applied to the field's value.
        sub: Box<Expr>,
    },

    /// Compares the navigated value against a bound expression.
    PathCompare {
        /// The comparison operator.
        op: Operator,
        /// The bound to compare against.
        bound: Box<Expr>,
    },

    /// Yields a fixed expression, discarding the navigated input.
    PathConstant(Box<Expr>),
}

impl Expr {
    /// Creates a string constant.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Constant(Value::String(s.into()))
    }

    /// Creates an `Int32` constant.
    #[must_use]
    pub const fn int32(v: i32) -> Self {
        Self::Constant(Value::Int32(v))
    }

    /// Creates an `Int64` constant.
    #[must_use]
    pub const fn int64(v: i64) -> Self {
        Self::Constant(Value::Int64(v))
    }

    /// Creates a `Double` constant.
    #[must_use]
    pub const fn double(v: f64) -> Self {
        Self::Constant(Value::Double(v))
    }

    /// Creates a boolean constant.
    #[must_use]
    pub const fn boolean(v: bool) -> Self {
        Self::Constant(Value::Boolean(v))
    }

    /// Creates a variable reference.
    pub fn variable(name: impl Into<ProjectionName>) -> Self {
        Self::Variable(name.into())
    }

    /// Creates a function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::FunctionCall { name: name.into(), args }
    }

    /// Creates a binary operation.
    #[must_use]
    pub fn binary(self, op: Operator, right: Expr) -> Self {
        Self::BinaryOp { op, left: Box::new(self), right: Box::new(right) }
    }

    /// `self == other`.
    #[must_use]
    pub fn eq(self, other: Expr) -> Self {
        self.binary(Operator::Eq, other)
    }

    /// `self >= other`.
    #[must_use]
    pub fn gte(self, other: Expr) -> Self {
        self.binary(Operator::GtEq, other)
    }

    /// `self AND other`.
    #[must_use]
    pub fn and(self, other: Expr) -> Self {
        self.binary(Operator::And, other)
    }

    /// `self OR other`.
    #[must_use]
    pub fn or(self, other: Expr) -> Self {
        self.binary(Operator::Or, other)
    }

    /// `self + other`.
    #[must_use]
    pub fn add(self, other: Expr) -> Self {
        self.binary(Operator::Add, other)
    }

    /// `self * other`.
    #[must_use]
    pub fn mul(self, other: Expr) -> Self {
        self.binary(Operator::Mul, other)
    }

    /// Creates a `PathGet` navigating `field` and applying `sub` below it.
    pub fn path_get(field: impl Into<FieldName>, sub: Expr) -> Self {
        Self::PathGet { field: field.into(), sub: Box::new(sub) }
    }

    /// Creates a `PathCompare` against `bound`.
    #[must_use]
    pub fn path_compare(op: Operator, bound: Expr) -> Self {
        Self::PathCompare { op, bound: Box::new(bound) }
    }

    /// Creates a `PathConstant` yielding `inner`.
    #[must_use]
    pub fn path_constant(inner: Expr) -> Self {
        Self::PathConstant(Box::new(inner))
    }

    /// Wraps `path` and `input` in an `EvalPath`.
    #[must_use]
    pub fn eval_path(path: Expr, input: Expr) -> Self {
        Self::EvalPath { path: Box::new(path), input: Box::new(input) }
    }

    /// Wraps `path` and `input` in an `EvalFilter`.
    #[must_use]
    pub fn eval_filter(path: Expr, input: Expr) -> Self {
        Self::EvalFilter { path: Box::new(path), input: Box::new(input) }
    }

    /// Whether this expression is one of the path-family variants.
    #[must_use]
    pub const fn is_path(&self) -> bool {
        matches!(
            self,
            Self::PathIdentity | Self::PathGet { .. } | Self::PathCompare { .. } | Self::PathConstant(_)
        )
    }

    /// Whether this expression still contains a path-family variant or an
    /// evaluation wrapper anywhere below it.
    #[must_use]
    pub fn contains_path(&self) -> bool {
        match self {
            Self::Constant(_) | Self::Variable(_) => false,
            Self::BinaryOp { left, right, .. } => left.contains_path() || right.contains_path(),
            Self::FunctionCall { args, .. } => args.iter().any(Self::contains_path),
            Self::EvalPath { .. }
            | Self::EvalFilter { .. }
            | Self::PathIdentity
            | Self::PathGet { .. }
            | Self::PathCompare { .. }
            | Self::PathConstant(_) => true,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => write!(f, "{v}"),
            Self::Variable(name) => write!(f, "{name}"),
            Self::BinaryOp { op, left, right } => write!(f, "({left} {op} {right})"),
            Self::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Self::EvalPath { path, input } => write!(f, "EvalPath({path}, {input})"),
            Self::EvalFilter { path, input } => write!(f, "EvalFilter({path}, {input})"),
            Self::PathIdentity => write!(f, "Id"),
            Self::PathGet { field, sub } => write!(f, "Get[{field}] {sub}"),
            Self::PathCompare { op, bound } => write!(f, "Cmp[{op} {bound}]"),
            Self::PathConstant(inner) => write!(f, "Const[{inner}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_compose() {
        let e = Expr::eval_filter(
            Expr::path_get("a", Expr::path_compare(Operator::GtEq, Expr::int32(23))),
            Expr::variable("scan0"),
        );
        assert!(e.contains_path());
        assert_eq!(e.to_string(), "EvalFilter(Get[a] Cmp[>= 23], scan0)");
    }

    #[test]
    fn scalar_core_has_no_paths() {
        let e = Expr::variable("x").gte(Expr::int32(1)).and(Expr::boolean(true));
        assert!(!e.contains_path());
    }

    #[test]
    fn is_path_covers_only_path_family() {
        assert!(Expr::PathIdentity.is_path());
        assert!(Expr::path_constant(Expr::int32(1)).is_path());
        assert!(!Expr::int32(1).is_path());
        assert!(!Expr::variable("v").is_path());
    }
}
