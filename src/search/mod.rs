//! # Search Predicates
//!
//! A composable boolean condition tree over named fields, built by callers
//! and bound to a table layout lazily at compile time. The tree carries
//! logical field names only; resolution against a layout and translation to
//! SQL happen in [`compiler`].
//!
//! ## Building Trees
//!
//! ```ignore
//! let search = (Search::equals("name", "alice") & Search::greater("age", 17))
//!     | !Search::is_null("email");
//! ```
//!
//! Every node carries an inversion flag toggled by `!`; inversion is applied
//! once per node when compiling, never double-applied through the operators.

pub mod compiler;
pub mod result_option;

pub use compiler::SearchCompiler;
pub use result_option::{ResultOption, ResultOptions};

use crate::types::Value;

/// Comparison mode of a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    Equals,
    Like,
    Greater,
    GreaterOrEqual,
    Smaller,
    SmallerOrEqual,
}

impl CompareMode {
    /// SQL operator text, honoring inversion. Ordering comparisons invert by
    /// swapping to the complementary operator, never by wrapping in NOT.
    pub(crate) fn operator(self, inverted: bool) -> &'static str {
        match (self, inverted) {
            (CompareMode::Equals, false) => "=",
            (CompareMode::Equals, true) => "<>",
            (CompareMode::Like, false) => "LIKE",
            (CompareMode::Like, true) => "NOT LIKE",
            (CompareMode::Greater, false) => ">",
            (CompareMode::Greater, true) => "<=",
            (CompareMode::GreaterOrEqual, false) => ">=",
            (CompareMode::GreaterOrEqual, true) => "<",
            (CompareMode::Smaller, false) => "<",
            (CompareMode::Smaller, true) => ">=",
            (CompareMode::SmallerOrEqual, false) => "<=",
            (CompareMode::SmallerOrEqual, true) => ">",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Matches everything.
    None,
    /// `field {op} value`; a NULL operand under Equals/Like degrades to an
    /// `IS [NOT] NULL` test.
    Compare {
        mode: CompareMode,
        field: String,
        value: Value,
    },
    /// `field IN (...)`, one parameter per member.
    In { field: String, values: Vec<Value> },
    /// `(left AND|OR right)`.
    Pair {
        or: bool,
        left: Box<Search>,
        right: Box<Search>,
    },
}

/// One node of a search predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    pub(crate) inverted: bool,
    pub(crate) node: Node,
}

impl Search {
    fn leaf(node: Node) -> Self {
        Self {
            inverted: false,
            node,
        }
    }

    /// A predicate matching every row.
    pub fn none() -> Self {
        Self::leaf(Node::None)
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::Equals,
            field: field.into(),
            value: value.into(),
        })
    }

    /// An `IS NULL` test, compiled as an Equals against NULL.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::Equals,
            field: field.into(),
            value: Value::Null,
        })
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::Like,
            field: field.into(),
            value: Value::String(pattern.into()),
        })
    }

    pub fn greater(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::Greater,
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn greater_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::GreaterOrEqual,
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn smaller(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::Smaller,
            field: field.into(),
            value: value.into(),
        })
    }

    pub fn smaller_or_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(Node::Compare {
            mode: CompareMode::SmallerOrEqual,
            field: field.into(),
            value: value.into(),
        })
    }

    /// A set-membership test; one parameter per member. The empty set is a
    /// legal, always-false predicate.
    pub fn is_in(field: impl Into<String>, values: impl IntoIterator<Item = Value>) -> Self {
        Self::leaf(Node::In {
            field: field.into(),
            values: values.into_iter().collect(),
        })
    }

    pub fn and(self, other: Search) -> Self {
        Self::leaf(Node::Pair {
            or: false,
            left: Box::new(self),
            right: Box::new(other),
        })
    }

    pub fn or(self, other: Search) -> Self {
        Self::leaf(Node::Pair {
            or: true,
            left: Box::new(self),
            right: Box::new(other),
        })
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }
}

impl std::ops::Not for Search {
    type Output = Search;

    fn not(mut self) -> Search {
        self.inverted = !self.inverted;
        self
    }
}

impl std::ops::BitAnd for Search {
    type Output = Search;

    fn bitand(self, rhs: Search) -> Search {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Search {
    type Output = Search;

    fn bitor(self, rhs: Search) -> Search {
        self.or(rhs)
    }
}
