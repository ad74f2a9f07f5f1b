//! Pre-parameterized Cypher text, as produced by `cypher_query!`.

use cyflow_core::traits::{IntoCyflowValue, ToCyflowParams};
use cyflow_core::Value;

/// A piece of Cypher text with its named parameters already bound.
///
/// Append it to a query with
/// [`CypherFluentQuery::fragment`](crate::fluent::CypherFluentQuery::fragment).
///
/// ```rust
/// # use cyflow::fragment::CypherFragment;
/// let fragment = CypherFragment::new("MATCH (u:User {name: $name})")
///     .param("name", "Alice");
/// assert_eq!(fragment.params().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CypherFragment {
    text: String,
    params: Vec<(String, Value)>,
}

impl CypherFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Bind a named parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl IntoCyflowValue) -> Self {
        self.params.push((name.into(), value.into_value()));
        self
    }

    /// Bind all fields from a [`ToCyflowParams`] struct.
    pub fn params_from(mut self, source: impl ToCyflowParams) -> Self {
        let mut params: Vec<_> = source.to_params().into_iter().collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        self.params.extend(params);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }
}
