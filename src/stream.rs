//! Streaming query results.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;

use cyflow_core::{CyflowError, Results};

/// Decoded rows of a query, as a [`Stream`].
///
/// Created by [`CypherQuery::stream`](crate::query::CypherQuery::stream).
/// Rows are already fetched; each one is decoded when it is pulled, so a
/// decoding failure in one row does not affect the rows before it.
///
/// ```rust,no_run
/// # use cyflow::prelude::*;
/// # async fn example(client: &GraphClient) -> Result<(), CyflowError> {
/// let mut names = client
///     .cypher()
///     .match_("(p:Person)")
///     .return_::<String>("p.name")
///     .stream()
///     .await?;
///
/// while let Some(name) = names.next().await {
///     println!("{}", name?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CypherStream<T> {
    rows: Results<T>,
}

impl<T> CypherStream<T> {
    pub(crate) fn new(rows: Results<T>) -> Self {
        Self { rows }
    }

    pub fn columns(&self) -> &[String] {
        self.rows.columns()
    }

    /// Decode the next row. `None` once every row has been read.
    pub async fn next(&mut self) -> Option<Result<T, CyflowError>> {
        self.rows.next()
    }

    pub fn into_results(self) -> Results<T> {
        self.rows
    }
}

impl<T> Unpin for CypherStream<T> {}

impl<T> Stream for CypherStream<T> {
    type Item = Result<T, CyflowError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.get_mut().rows.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
