//! Centralized row access for query results.
//!
//! Derive-macro generated code only reads rows through [`Cells`], so the
//! positional matching rules live in one place.

use crate::error::CyflowError;
use crate::value::Value;

/// How projection members are matched to result columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectionMatching {
    /// Column `i` fills member `i`; names are ignored.
    #[default]
    Positional,
    /// Column `i` fills member `i` and must carry the member's name.
    ByName,
}

/// A cursor over one row, handing out cells in column order.
pub struct Cells<'a> {
    columns: &'a [String],
    values: std::vec::IntoIter<Value>,
    position: usize,
    matching: ProjectionMatching,
}

impl<'a> Cells<'a> {
    pub fn new(columns: &'a [String], values: Vec<Value>, matching: ProjectionMatching) -> Self {
        Self {
            columns,
            values: values.into_iter(),
            position: 0,
            matching,
        }
    }

    /// Take the next cell for `member` of `owner`.
    pub fn next_cell(&mut self, member: &str, owner: &str) -> Result<Value, CyflowError> {
        let position = self.position;
        let value = self
            .values
            .next()
            .ok_or_else(|| CyflowError::missing_field(member, owner))?;
        self.position += 1;

        if self.matching == ProjectionMatching::ByName {
            let actual = self.columns.get(position).map(String::as_str).unwrap_or_default();
            if actual != member {
                return Err(CyflowError::ColumnNameMismatch {
                    position,
                    expected: member.to_owned(),
                    actual: actual.to_owned(),
                });
            }
        }
        Ok(value)
    }
}
