//! Turns fetched result rows into typed values.
//!
//! Rows are fetched eagerly by the transport; decoding happens lazily, one
//! row per call to [`Iterator::next`].

use std::marker::PhantomData;

use crate::decode::{decode, DecodeContext};
use crate::error::CyflowError;
use crate::record::{Cells, ProjectionMatching};
use crate::traits::{FromCyflow, FromCyflowValue};
use crate::value::Value;

/// How a query's rows map onto its result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultMode {
    /// One column of graph entities.
    Set,
    /// Several columns filling the members of a projection type.
    Projection,
    /// One column of scalars or nested values.
    SingleColumn,
}

/// The wire shape requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    /// REST `row` + `graph` contents.
    RestGraph,
    /// REST entity objects (`self`/`data`/`metadata`).
    Rest,
    Bolt,
}

/// The raw result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

type RowDecoder<T> = fn(&[String], Vec<Value>, &DecodeContext, ProjectionMatching) -> Result<T, CyflowError>;

/// A single-pass sequence of decoded rows.
///
/// Each item is decoded when it is pulled. Iterate again by re-running the
/// query.
pub struct Results<T> {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
    ctx: DecodeContext,
    matching: ProjectionMatching,
    decoder: RowDecoder<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Results<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Results")
            .field("columns", &self.columns)
            .field("remaining", &self.rows.len())
            .finish()
    }
}

impl<T> Results<T> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet decoded.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Decode every remaining row, stopping at the first failure.
    pub fn collect_all(self) -> Result<Vec<T>, CyflowError> {
        self.collect()
    }
}

impl<T> Iterator for Results<T> {
    type Item = Result<T, CyflowError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some((self.decoder)(&self.columns, row, &self.ctx, self.matching))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T> ExactSizeIterator for Results<T> {}

fn empty_results<T>(ctx: DecodeContext, decoder: RowDecoder<T>) -> Results<T> {
    Results {
        columns: Vec::new(),
        rows: Vec::new().into_iter(),
        ctx,
        matching: ProjectionMatching::Positional,
        decoder,
        _marker: PhantomData,
    }
}

fn decode_single<T: FromCyflowValue>(
    columns: &[String],
    row: Vec<Value>,
    ctx: &DecodeContext,
    _matching: ProjectionMatching,
) -> Result<T, CyflowError> {
    let column = columns.first().map(String::as_str).unwrap_or_default();
    let cell = row.into_iter().next().unwrap_or(Value::Null);
    decode::<T>(cell, ctx).map_err(|e| e.with_context(format!("column '{column}'")))
}

fn decode_projection<T: FromCyflow>(
    columns: &[String],
    row: Vec<Value>,
    ctx: &DecodeContext,
    matching: ProjectionMatching,
) -> Result<T, CyflowError> {
    let mut cells = Cells::new(columns, row, matching);
    T::from_cells(&mut cells, ctx)
}

/// Decode a one-column result, cell by cell.
///
/// An empty result is always an empty sequence. Otherwise the result must
/// have exactly one column.
pub fn single_column<T: FromCyflowValue>(
    result: ResultSet,
    ctx: DecodeContext,
) -> Result<Results<T>, CyflowError> {
    if result.rows.is_empty() {
        return Ok(empty_results(ctx, decode_single::<T>));
    }
    if result.columns.len() != 1 {
        return Err(CyflowError::ColumnCountMismatch {
            target: std::any::type_name::<T>().to_owned(),
            expected: 1,
            actual: result.columns.len(),
            columns: result.columns,
        });
    }
    Ok(Results {
        columns: result.columns,
        rows: result.rows.into_iter(),
        ctx,
        matching: ProjectionMatching::Positional,
        decoder: decode_single::<T>,
        _marker: PhantomData,
    })
}

/// Decode a multi-column result into a projection type.
///
/// Columns fill `T`'s members in declaration order. The column count must
/// equal the member count; with [`ProjectionMatching::ByName`] every column
/// name must also equal its member's name.
pub fn projection<T: FromCyflow>(
    result: ResultSet,
    ctx: DecodeContext,
    matching: ProjectionMatching,
) -> Result<Results<T>, CyflowError> {
    if result.rows.is_empty() {
        return Ok(empty_results(ctx, decode_projection::<T>));
    }
    let members = T::members();
    if result.columns.len() != members.len() {
        return Err(CyflowError::ColumnCountMismatch {
            target: std::any::type_name::<T>().to_owned(),
            expected: members.len(),
            actual: result.columns.len(),
            columns: result.columns,
        });
    }
    Ok(Results {
        columns: result.columns,
        rows: result.rows.into_iter(),
        ctx,
        matching,
        decoder: decode_projection::<T>,
        _marker: PhantomData,
    })
}
