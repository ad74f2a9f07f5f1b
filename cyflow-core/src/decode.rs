//! Decoding context shared by every conversion of one result set.

use std::sync::Arc;

use crate::converters::ConverterRegistry;
use crate::entity::ClientLink;
use crate::error::CyflowError;
use crate::traits::FromCyflowValue;
use crate::value::Value;

/// Converters plus the client that produced the rows.
///
/// The client link is attached to every [`NodeReference`](crate::entity::NodeReference)
/// and [`RelationshipReference`](crate::entity::RelationshipReference) created
/// while decoding, so retrieved entities can start new queries.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    converters: Arc<ConverterRegistry>,
    client: Option<ClientLink>,
}

impl DecodeContext {
    pub fn new(converters: Arc<ConverterRegistry>, client: Option<ClientLink>) -> Self {
        Self { converters, client }
    }

    /// Built-in converters, no client. Entities decoded with this context are detached.
    pub fn detached() -> Self {
        Self::new(Arc::new(ConverterRegistry::default()), None)
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn client(&self) -> Option<ClientLink> {
        self.client.clone()
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self::detached()
    }
}

/// Run the registered converters for `T` over `value`, then convert it.
pub fn decode<T: FromCyflowValue>(value: Value, ctx: &DecodeContext) -> Result<T, CyflowError> {
    let value = ctx.converters().apply(value, &T::KIND)?;
    T::from_value(value, ctx)
}
