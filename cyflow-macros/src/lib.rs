//! Procedural macros for cyflow.
//!
//! This crate is not meant to be used directly. Use the `cyflow` facade
//! crate, which re-exports all macros. Generated code refers to
//! `cyflow_core`, so depend on it alongside `cyflow`.

extern crate proc_macro;

use proc_macro::TokenStream;

mod attrs;
mod node;
mod relation;
mod from_cyflow;
mod cypher;
mod cypher_query;
mod to_cyflow_params;
mod enum_value;

/// Derive `CyflowNode` and `FromCyflowValue` for a struct.
///
/// Each field is read from the node property of the same name. A property
/// the node does not carry reads as `null`, so scalars, strings and
/// collections get their default value and `Option` fields get `None`;
/// any other type reports `MissingProperty`.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[cyflow(label = "...")]` sets the label. Defaults to the struct name.
///
/// **Field-level:**
/// - `#[cyflow(prop = "...")]` overrides the property name.
/// - `#[cyflow(id)]` fills the field from the node id instead of a property.
/// - `#[cyflow(skip)]` leaves the field at `Default::default()`.
///
/// The read property names are exposed as `CyflowNode::PROPERTIES`, which
/// `prop_of::<T>()` predicates check against.
///
/// # Example
///
/// ```rust,ignore
/// use cyflow::prelude::*;
///
/// #[derive(Debug, CyflowNode)]
/// #[cyflow(label = "Person")]
/// struct Person {
///     #[cyflow(id)]
///     id: i64,
///     #[cyflow(prop = "Name")]
///     name: String,
///     age: Option<i64>,
/// }
/// ```
#[proc_macro_derive(CyflowNode, attributes(cyflow))]
pub fn cyflow_node(input: TokenStream) -> TokenStream {
    node::expand(input)
}

/// Derive `CyflowRelation` and `FromCyflowValue` for a struct.
///
/// # Attributes
///
/// **Struct-level:**
/// - `#[cyflow(type = "...")]` sets the relationship type. Defaults to the struct name.
/// - `#[cyflow(from = "A|B")]` labels allowed at the start node. Empty means any.
/// - `#[cyflow(to = "C")]` labels allowed at the end node. Empty means any.
///
/// `from`/`to` drive direction resolution in `relate::<R, A, B>()`.
///
/// **Field-level:**
/// - `#[cyflow(prop = "...")]` overrides the property name.
/// - `#[cyflow(skip)]` leaves the field at `Default::default()`.
///
/// # Example
///
/// ```rust,ignore
/// use cyflow::prelude::*;
///
/// #[derive(Debug, CyflowRelation)]
/// #[cyflow(type = "OWNS", from = "Person|Company", to = "Car")]
/// struct Owns {
///     since: i64,
/// }
/// ```
#[proc_macro_derive(CyflowRelation, attributes(cyflow))]
pub fn cyflow_relation(input: TokenStream) -> TokenStream {
    relation::expand(input)
}

/// Derive `FromCyflow` for a projection struct.
///
/// Members are filled from result columns **by position**, in declaration
/// order. A response with a different column count is rejected. Under
/// `ProjectionMatching::ByName` each column must also carry the member's
/// name.
///
/// # Attributes
///
/// **Field-level:**
/// - `#[cyflow(column = "...")]` the column name checked by name matching
///   (default: the field name).
/// - `#[cyflow(flatten)]` the inner `FromCyflow` type reads its own members
///   from the following columns.
///
/// # Example
///
/// ```rust,ignore
/// use cyflow::prelude::*;
///
/// #[derive(FromCyflow)]
/// struct NameAge {
///     #[cyflow(column = "Name")]
///     name: String,
///     #[cyflow(column = "Age")]
///     age: i64,
/// }
///
/// let rows: Vec<NameAge> = client.cypher()
///     .match_("(n:Person)")
///     .return_projection::<NameAge>("n.name AS Name, n.age AS Age")
///     .fetch_all()
///     .await?;
/// ```
#[proc_macro_derive(FromCyflow, attributes(cyflow))]
pub fn from_cyflow(input: TokenStream) -> TokenStream {
    from_cyflow::expand(input)
}

/// Derive `ToCyflowParams` for a struct.
///
/// Each field becomes a named parameter via `IntoCyflowValue`. Bind the map
/// with `with_params_from`.
///
/// # Attributes
///
/// **Field-level:**
/// - `#[cyflow(skip)]` or `#[cyflow(id)]` excludes the field.
/// - `#[cyflow(prop = "...")]` overrides the parameter name.
#[proc_macro_derive(ToCyflowParams, attributes(cyflow))]
pub fn to_cyflow_params(input: TokenStream) -> TokenStream {
    to_cyflow_params::expand(input)
}

/// Derive `CyflowEnum` and `FromCyflowValue` for a unit-only enum.
///
/// Variants are stored by name (`#[cyflow(rename = "...")]` to override).
/// Cells holding a differently-cased name or a variant ordinal are accepted
/// through the built-in enum converter. Also implements `From<Self> for Value`
/// so variants bind directly as parameters. The enum must be `Copy`.
///
/// ```rust,ignore
/// #[derive(Debug, Clone, Copy, PartialEq, CyflowEnum)]
/// enum Status {
///     Active,
///     #[cyflow(rename = "on_hold")]
///     OnHold,
/// }
/// ```
#[proc_macro_derive(CyflowEnum, attributes(cyflow))]
pub fn cyflow_enum(input: TokenStream) -> TokenStream {
    enum_value::expand(input)
}

/// Converts a Cypher token block into a `&'static str` with normalized whitespace.
///
/// The output is literal. Pass it to `raw()` or any clause method.
///
/// ```rust,ignore
/// let q: &str = cypher! { MATCH (n:Person)-[:KNOWS]->(f:Person) RETURN f };
/// ```
#[proc_macro]
pub fn cypher(input: TokenStream) -> TokenStream {
    cypher::expand(input)
}

/// Builds a `CypherFragment` from a Cypher block with auto-bound parameters.
///
/// Any `$ident` in the text becomes a named parameter bound from the
/// variable `ident`, which must convert into `Value`. Duplicates are bound
/// once. Append the fragment to a query with `fragment()`.
///
/// ```rust,ignore
/// let name = "Alice";
/// let q = client.cypher()
///     .fragment(cypher_query! { MATCH (n:Person {name: $name}) })
///     .return_::<Node<Person>>("n");
/// ```
#[proc_macro]
pub fn cypher_query(input: TokenStream) -> TokenStream {
    cypher_query::expand(input)
}
