//! Core traits, error types, and value conversions for cyflow.
//!
//! This crate is not meant to be used directly. Use the `cyflow` facade
//! crate instead, which re-exports everything you need.

pub mod traits;
pub mod error;

pub mod value;
pub mod record;
pub mod props;
pub mod decode;
pub mod entity;
pub mod convert;
pub mod converters;
pub mod params;
pub mod deserializer;

pub mod bolt;
pub mod json;

pub use error::{CyflowError, ErrorKind, ServerException, UsageError};
pub use value::{NodeCell, PathCell, RelationshipCell, Value};
pub use traits::{
    CyflowEnum, CyflowNode, CyflowRelation, FromCyflow, FromCyflowValue, IntoCyflowValue,
    ProjectionMember, TargetKind, ToCyflowParams,
};
pub use decode::{decode, DecodeContext};
pub use entity::{ClientLink, GraphPath, Node, NodeReference, RelationshipInstance, RelationshipReference};
pub use convert::TimeWithOffset;
pub use converters::{ConverterRegistry, ValueConverter};
pub use params::{Parameter, ParameterStore};
pub use record::{Cells, ProjectionMatching};
pub use deserializer::{ResultFormat, ResultMode, ResultSet, Results};
