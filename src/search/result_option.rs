//! # Result Options
//!
//! Ordered, composable directives modifying a query's result set: sorting,
//! grouping, limit, and offset. Combination legality is checked once, before
//! any SQL is built:
//!
//! - grouping and sorting are mutually exclusive
//! - at most one limit and one offset
//! - an offset requires a limit

use eyre::Result;

use crate::error;

/// One result-set directive.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultOption {
    SortAscending(String),
    SortDescending(String),
    Group(String),
    Limit(u64),
    Offset(u64),
}

/// Ordered list of result-set directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultOptions {
    options: Vec<ResultOption>,
}

impl ResultOptions {
    /// No directives: the backend's natural order and full result set.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sort_ascending(mut self, field: impl Into<String>) -> Self {
        self.options.push(ResultOption::SortAscending(field.into()));
        self
    }

    pub fn sort_descending(mut self, field: impl Into<String>) -> Self {
        self.options.push(ResultOption::SortDescending(field.into()));
        self
    }

    pub fn group(mut self, field: impl Into<String>) -> Self {
        self.options.push(ResultOption::Group(field.into()));
        self
    }

    pub fn limit(mut self, count: u64) -> Self {
        self.options.push(ResultOption::Limit(count));
        self
    }

    pub fn offset(mut self, start: u64) -> Self {
        self.options.push(ResultOption::Offset(start));
        self
    }

    /// Concatenates two option lists, preserving order.
    pub fn combine(mut self, other: ResultOptions) -> Self {
        self.options.extend(other.options);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn options(&self) -> &[ResultOption] {
        &self.options
    }

    /// Sort directives in declaration order, each as (field, descending).
    pub fn sorts(&self) -> impl Iterator<Item = (&str, bool)> {
        self.options.iter().filter_map(|o| match o {
            ResultOption::SortAscending(f) => Some((f.as_str(), false)),
            ResultOption::SortDescending(f) => Some((f.as_str(), true)),
            _ => None,
        })
    }

    /// Group directives in declaration order.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.options.iter().filter_map(|o| match o {
            ResultOption::Group(f) => Some(f.as_str()),
            _ => None,
        })
    }

    pub fn limit_value(&self) -> Option<u64> {
        self.options.iter().find_map(|o| match o {
            ResultOption::Limit(n) => Some(*n),
            _ => None,
        })
    }

    pub fn offset_value(&self) -> Option<u64> {
        self.options.iter().find_map(|o| match o {
            ResultOption::Offset(n) => Some(*n),
            _ => None,
        })
    }

    /// Field names referenced by sort and group directives.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.options.iter().filter_map(|o| match o {
            ResultOption::SortAscending(f)
            | ResultOption::SortDescending(f)
            | ResultOption::Group(f) => Some(f.as_str()),
            _ => None,
        })
    }

    /// Checks combination legality. Runs before any SQL is built; a
    /// violation is a usage error, not an I/O failure.
    pub fn validate(&self) -> Result<()> {
        let sorts = self.sorts().count();
        let groups = self.groups().count();
        if sorts > 0 && groups > 0 {
            return Err(error::unsupported(
                "grouping and sorting options cannot be combined",
            ));
        }
        let limits = self
            .options
            .iter()
            .filter(|o| matches!(o, ResultOption::Limit(_)))
            .count();
        if limits > 1 {
            return Err(error::unsupported("more than one limit option"));
        }
        let offsets = self
            .options
            .iter()
            .filter(|o| matches!(o, ResultOption::Offset(_)))
            .count();
        if offsets > 1 {
            return Err(error::unsupported("more than one offset option"));
        }
        if offsets == 1 && limits == 0 {
            return Err(error::unsupported("an offset option requires a limit"));
        }
        Ok(())
    }
}
