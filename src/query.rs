use std::marker::PhantomData;

use cyflow_core::deserializer::{projection, single_column};
use cyflow_core::traits::{FromCyflow, FromCyflowValue};
use cyflow_core::{CyflowError, DecodeContext, ProjectionMatching, ResultMode, ResultSet, Results};

use crate::blocking;
use crate::capabilities::CypherCapabilities;
use crate::compiler::CompiledQuery;
use crate::fluent::CypherFluentQuery;
use crate::stream::CypherStream;
use crate::transport::TransportKind;

type Decoder<T> = fn(ResultSet, DecodeContext, ProjectionMatching) -> Result<Results<T>, CyflowError>;

fn decode_single<T: FromCyflowValue>(
    rows: ResultSet,
    ctx: DecodeContext,
    _matching: ProjectionMatching,
) -> Result<Results<T>, CyflowError> {
    single_column::<T>(rows, ctx)
}

fn decode_projection<T: FromCyflow>(
    rows: ResultSet,
    ctx: DecodeContext,
    matching: ProjectionMatching,
) -> Result<Results<T>, CyflowError> {
    projection::<T>(rows, ctx, matching)
}

/// A query that ends in `RETURN` and reads its rows as `T`.
///
/// Created by the `return_*` methods of [`CypherFluentQuery`]. Ordering and
/// paging can still be appended; anything else goes through
/// [`union`](Self::union) back to an untyped query.
///
/// # Examples
///
/// ```rust,no_run
/// # use cyflow::prelude::*;
/// # #[derive(Debug, CyflowNode)]
/// # #[cyflow(label = "Person")]
/// # struct Person { #[cyflow(id)] id: i64, name: String }
/// # async fn example(client: &GraphClient) -> Result<(), CyflowError> {
/// let oldest: Option<Node<Person>> = client
///     .cypher()
///     .match_("(p:Person)")
///     .return_::<Node<Person>>("p")
///     .order_by_desc("p.age")
///     .limit(1)
///     .fetch_optional()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct CypherQuery<T> {
    inner: CypherFluentQuery,
    mode: ResultMode,
    decoder: Decoder<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CypherQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            mode: self.mode,
            decoder: self.decoder,
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for CypherQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CypherQuery")
            .field("mode", &self.mode)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<T: FromCyflowValue> CypherQuery<T> {
    pub(crate) fn single(inner: CypherFluentQuery) -> Self {
        let mode = if T::ENTITY { ResultMode::Set } else { ResultMode::SingleColumn };
        Self {
            inner,
            mode,
            decoder: decode_single::<T>,
            _marker: PhantomData,
        }
    }
}

impl<T: FromCyflow> CypherQuery<T> {
    pub(crate) fn projection(inner: CypherFluentQuery) -> Self {
        Self {
            inner,
            mode: ResultMode::Projection,
            decoder: decode_projection::<T>,
            _marker: PhantomData,
        }
    }
}

impl<T> CypherQuery<T> {
    fn map(&self, f: impl FnOnce(&CypherFluentQuery) -> CypherFluentQuery) -> Self {
        Self {
            inner: f(&self.inner),
            ..self.clone()
        }
    }

    pub fn result_mode(&self) -> ResultMode {
        self.mode
    }

    pub fn order_by(&self, items: &str) -> Self {
        self.map(|q| q.order_by(items))
    }

    pub fn order_by_desc(&self, items: &str) -> Self {
        self.map(|q| q.order_by_desc(items))
    }

    pub fn skip(&self, count: u64) -> Self {
        self.map(|q| q.skip(count))
    }

    pub fn limit(&self, count: u64) -> Self {
        self.map(|q| q.limit(count))
    }

    /// `UNION`, dropping the result type. Finish the second branch with
    /// another `return_*` call.
    pub fn union(&self) -> CypherFluentQuery {
        self.inner.union()
    }

    pub fn union_all(&self) -> CypherFluentQuery {
        self.inner.union_all()
    }

    /// The untyped query underneath.
    pub fn as_fluent(&self) -> &CypherFluentQuery {
        &self.inner
    }

    /// Compile exactly as [`results`](Self::results) would send it.
    pub fn compile(&self) -> Result<CompiledQuery, CyflowError> {
        let (caps, transport) = self.inner.target();
        self.compile_with(&caps, transport)
    }

    pub fn compile_with(
        &self,
        caps: &CypherCapabilities,
        transport: TransportKind,
    ) -> Result<CompiledQuery, CyflowError> {
        Ok(crate::compiler::compile(self.inner.parts(), caps, transport, Some(self.mode))?)
    }

    pub fn query_text(&self) -> Result<String, CyflowError> {
        self.inner.query_text()
    }

    /// Run the query and return its rows, decoded as they are pulled.
    ///
    /// Inside a transaction on the HTTP transport this flushes every
    /// statement queued before it.
    pub async fn results(&self) -> Result<Results<T>, CyflowError> {
        let (client, compiled) = self.inner.compile_for_results(self.mode)?;
        let rows = client.dispatch(&compiled, true).await?;
        (self.decoder)(rows, client.decode_context(), client.options().projection_matching)
            .map_err(|e| client.annotate(e, &compiled))
    }

    pub async fn fetch_all(&self) -> Result<Vec<T>, CyflowError> {
        self.results().await?.collect_all()
    }

    /// The first row. Fails with [`CyflowError::MissingField`] when there is none.
    pub async fn fetch_one(&self) -> Result<T, CyflowError> {
        self.fetch_optional()
            .await?
            .ok_or_else(|| CyflowError::missing_field("row", "fetch_one"))
    }

    /// The first row, if any.
    pub async fn fetch_optional(&self) -> Result<Option<T>, CyflowError> {
        self.results().await?.next().transpose()
    }

    /// Run the query and stream its rows.
    pub async fn stream(&self) -> Result<CypherStream<T>, CyflowError> {
        Ok(CypherStream::new(self.results().await?))
    }

    pub fn results_blocking(&self) -> Result<Results<T>, CyflowError> {
        blocking::block_on(self.results())?
    }

    pub fn fetch_all_blocking(&self) -> Result<Vec<T>, CyflowError> {
        blocking::block_on(self.fetch_all())?
    }

    pub fn fetch_one_blocking(&self) -> Result<T, CyflowError> {
        blocking::block_on(self.fetch_one())?
    }

    pub fn fetch_optional_blocking(&self) -> Result<Option<T>, CyflowError> {
        blocking::block_on(self.fetch_optional())?
    }
}
