//! Core traits for mapping between result cells and Rust types.

use std::collections::HashMap;

use crate::decode::DecodeContext;
use crate::error::CyflowError;
use crate::record::Cells;
use crate::value::{NodeCell, RelationshipCell, Value};

/// The shape a target type expects, used to pick a converter.
///
/// Converters registered in a [`ConverterRegistry`](crate::converters::ConverterRegistry)
/// look at the target kind and the wire value to decide whether they claim a
/// cell. `Option<T>` reports the kind of `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Other,
    Date,
    LocalTime,
    Time,
    LocalDateTime,
    DateTime,
    TimeZone,
    Duration,
    Enum {
        name: &'static str,
        variants: &'static [&'static str],
    },
}

/// Maps a node to a Rust struct.
///
/// Automatically implemented by `#[derive(CyflowNode)]`. The derive also
/// generates a [`FromCyflowValue`] impl so the struct can be converted
/// directly from a node cell.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(CyflowNode)]
/// #[cyflow(label = "Person")]
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// assert_eq!(Person::LABEL, "Person");
/// assert_eq!(Person::PROPERTIES, &["name", "age"]);
/// ```
pub trait CyflowNode: Sized {
    /// The node label (e.g. `"Person"`).
    const LABEL: &'static str;

    /// Property keys read by [`from_node`](Self::from_node), in declaration order.
    const PROPERTIES: &'static [&'static str] = &[];

    /// Deserialize a [`NodeCell`] into `Self`.
    fn from_node(node: &NodeCell, ctx: &DecodeContext) -> Result<Self, CyflowError>;
}

/// Maps a relationship to a Rust struct.
///
/// `SOURCE_LABELS` and `TARGET_LABELS` declare which node labels may sit at
/// each end. An empty set allows any label. The fluent query's `relate`
/// uses them to work out direction.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(CyflowRelation)]
/// #[cyflow(type = "MEMBER_OF", from = "Person|Bot", to = "Team")]
/// struct MemberOf {
///     since: i64,
/// }
///
/// assert_eq!(MemberOf::SOURCE_LABELS, &["Person", "Bot"]);
/// ```
pub trait CyflowRelation: Sized {
    /// The relationship type (e.g. `"FOLLOWS"`).
    const TYPE: &'static str;

    const SOURCE_LABELS: &'static [&'static str] = &[];
    const TARGET_LABELS: &'static [&'static str] = &[];

    /// Deserialize a [`RelationshipCell`] into `Self`.
    fn from_rel(rel: &RelationshipCell, ctx: &DecodeContext) -> Result<Self, CyflowError>;
}

/// One member of a projection type, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionMember {
    pub name: &'static str,
    pub type_name: &'static str,
}

/// Maps a multi-column row into a Rust struct.
///
/// Automatically implemented by `#[derive(FromCyflow)]`. Members are filled
/// from result columns **positionally**, in declaration order; the column
/// count must equal the number of members. `#[cyflow(flatten)]` members
/// consume as many consecutive columns as their own type declares.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(FromCyflow)]
/// struct PersonRow {
///     name: String,
///     age: Option<i64>,
/// }
/// // RETURN p.name AS name, p.age AS age
/// ```
pub trait FromCyflow: Sized {
    /// Ordered members this type reads, flattened.
    fn members() -> Vec<ProjectionMember>;

    /// Read `Self` from the next cells of a row.
    fn from_cells(cells: &mut Cells<'_>, ctx: &DecodeContext) -> Result<Self, CyflowError>;
}

/// Converts a single [`Value`] into a Rust type.
///
/// This is the core conversion primitive. Implementations exist for
/// primitives, collections, temporal types, entity wrappers, and derived
/// node/relation/enum types. Use [`decode`](crate::decode::decode) rather
/// than calling [`from_value`](Self::from_value) directly so registered
/// converters get a chance to reshape the cell first.
pub trait FromCyflowValue: Sized {
    /// What converters should produce for this type.
    const KIND: TargetKind = TargetKind::Other;

    /// Whether a single-column result of this type is a set of graph entities.
    const ENTITY: bool = false;

    /// Convert a [`Value`] into `Self`.
    fn from_value(value: Value, ctx: &DecodeContext) -> Result<Self, CyflowError>;
}

/// Converts a Rust value into a [`Value`] for use as a query parameter.
///
/// A blanket implementation covers all types that already implement
/// `Into<Value>`.
pub trait IntoCyflowValue {
    fn into_value(self) -> Value;
}

impl<T: Into<Value>> IntoCyflowValue for T {
    fn into_value(self) -> Value {
        self.into()
    }
}

/// Converts a struct into named query parameters.
///
/// Automatically implemented by `#[derive(ToCyflowParams)]`. Use with
/// `CypherFluentQuery::with_params_from` to bind every field at once, or
/// with `create_entity` to create a node from a struct.
pub trait ToCyflowParams {
    /// Convert `self` into a map of parameter name → value.
    fn to_params(self) -> HashMap<String, Value>;
}

/// A unit-only enum stored by variant name.
///
/// Automatically implemented by `#[derive(CyflowEnum)]`, together with
/// [`FromCyflowValue`] and `From<Self> for Value`.
pub trait CyflowEnum: Sized + Copy {
    const NAME: &'static str;
    const VARIANTS: &'static [&'static str];

    fn from_name(name: &str) -> Option<Self>;
    fn name(&self) -> &'static str;
}
