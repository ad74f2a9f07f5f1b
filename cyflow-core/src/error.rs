
//! Error types for cyflow.

use thiserror::Error;

/// Unified error type for all cyflow operations.
///
/// Mapping failures are wrapped with [`Context`](CyflowError::Context) by the
/// derive macros via [`with_context`](CyflowError::with_context), producing
/// chained messages like:
///
/// ```text
/// Person::age (prop 'age'): type mismatch: expected Integer, got String (i64)
/// ```
///
/// Use [`kind`](CyflowError::kind) to classify an error regardless of how many
/// context layers wrap it.
#[derive(Error, Debug)]
pub enum CyflowError {
    /// A general mapping error with a freeform message.
    #[error("mapping error: {0}")]
    Mapping(String),

    /// A required property was not found on a node or relationship.
    #[error("missing property '{property}' on {label}")]
    MissingProperty { property: String, label: String },

    /// A required member had no cell to read from.
    #[error("missing field '{field}' on {struct_name}")]
    MissingField { field: String, struct_name: String },

    /// A [`Value`](crate::Value) variant did not match the expected Rust type.
    #[error("type mismatch: expected {expected}, got {got} ({context})")]
    TypeMismatch {
        expected: String,
        got: String,
        context: String,
    },

    /// The response has a different number of columns than the result type reads.
    #[error("column count mismatch: {target} reads {expected} column(s), response has {actual} ({columns:?})")]
    ColumnCountMismatch {
        target: String,
        expected: usize,
        actual: usize,
        columns: Vec<String>,
    },

    /// Name-checked projection found a column in the wrong position.
    #[error("column name mismatch at position {position}: expected '{expected}', got '{actual}'")]
    ColumnNameMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    /// The caller used the API in a way it does not allow.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// Unexpected status code or malformed response from the server.
    #[error("server protocol error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    ServerProtocol {
        status: Option<u16>,
        message: String,
        body: String,
    },

    /// The database rejected the statement.
    #[error("{0}")]
    ServerApplication(ServerException),

    /// Wraps an inner error with additional context (struct name, field, property).
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<CyflowError>,
    },

    /// Wraps an inner error with the text of the query that failed.
    #[error("{source}\nquery:\n{query}")]
    Query {
        query: String,
        source: Box<CyflowError>,
    },

    /// Rolling back after a failure failed as well.
    #[error("rollback failed: {rollback}{}", original.as_ref().map(|o| format!(" (after: {o})")).unwrap_or_default())]
    RollbackFailed {
        rollback: Box<CyflowError>,
        original: Option<String>,
    },

    /// A `neo4rs::Error` from the Bolt driver.
    #[error("neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    /// A `reqwest::Error` from the HTTP transport.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body could not be parsed as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error taxonomy used to classify a [`CyflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    ServerProtocol,
    ServerApplication,
    Deserialization,
}

impl CyflowError {
    /// Create a [`TypeMismatch`](CyflowError::TypeMismatch) error.
    pub fn type_mismatch(expected: &str, got: &str, context: &str) -> Self {
        CyflowError::TypeMismatch {
            expected: expected.to_owned(),
            got: got.to_owned(),
            context: context.to_owned(),
        }
    }

    /// Create a [`MissingProperty`](CyflowError::MissingProperty) error.
    pub fn missing_property(property: &str, label: &str) -> Self {
        CyflowError::MissingProperty {
            property: property.to_owned(),
            label: label.to_owned(),
        }
    }

    /// Create a [`MissingField`](CyflowError::MissingField) error.
    pub fn missing_field(field: &str, struct_name: &str) -> Self {
        CyflowError::MissingField {
            field: field.to_owned(),
            struct_name: struct_name.to_owned(),
        }
    }

    /// Create a [`ServerProtocol`](CyflowError::ServerProtocol) error.
    pub fn protocol(status: Option<u16>, message: impl Into<String>, body: impl Into<String>) -> Self {
        CyflowError::ServerProtocol {
            status,
            message: message.into(),
            body: body.into(),
        }
    }

    /// Wrap this error with additional context, producing a [`Context`](CyflowError::Context) variant.
    ///
    /// ```rust
    /// # use cyflow_core::CyflowError;
    /// let err = CyflowError::type_mismatch("Integer", "String", "i64");
    /// let wrapped = err.with_context("Person::age (prop 'age')");
    /// assert!(wrapped.to_string().contains("Person::age"));
    /// ```
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        CyflowError::Context {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// Attach the failing query text.
    pub fn with_query(self, query: impl Into<String>) -> Self {
        CyflowError::Query {
            query: query.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping [`Context`](CyflowError::Context) and
    /// [`Query`](CyflowError::Query) layers.
    pub fn root(&self) -> &CyflowError {
        match self {
            CyflowError::Context { source, .. } | CyflowError::Query { source, .. } => source.root(),
            other => other,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            CyflowError::Usage(_) => ErrorKind::Usage,
            CyflowError::ServerApplication(_) => ErrorKind::ServerApplication,
            CyflowError::Mapping(_)
            | CyflowError::MissingProperty { .. }
            | CyflowError::MissingField { .. }
            | CyflowError::TypeMismatch { .. }
            | CyflowError::ColumnCountMismatch { .. }
            | CyflowError::ColumnNameMismatch { .. } => ErrorKind::Deserialization,
            CyflowError::RollbackFailed { rollback, .. } => rollback.kind(),
            _ => ErrorKind::ServerProtocol,
        }
    }

    /// The usage error at the root, if any.
    pub fn as_usage(&self) -> Option<&UsageError> {
        match self.root() {
            CyflowError::Usage(u) => Some(u),
            _ => None,
        }
    }

    /// The server exception at the root, if any.
    pub fn as_server_exception(&self) -> Option<&ServerException> {
        match self.root() {
            CyflowError::ServerApplication(e) => Some(e),
            _ => None,
        }
    }
}

/// Ways the caller can misuse the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("{entity} {id} is detached from any client and cannot start a query")]
    DetachedReference { entity: &'static str, id: i64 },

    #[error("ambiguous direction for relationship {relationship}: both ({a})-[:{relationship}]->({b}) and ({b})-[:{relationship}]->({a}) are allowed")]
    AmbiguousDirection {
        relationship: String,
        a: String,
        b: String,
    },

    #[error("relationship {relationship} cannot connect {a} and {b} in either direction")]
    InvalidParticipants {
        relationship: String,
        a: String,
        b: String,
    },

    #[error("this operation requires an ambient transaction")]
    TransactionRequired,

    #[error("this operation cannot run inside a transaction")]
    TransactionDenied,

    #[error("transaction is {state}, expected open")]
    TransactionNotOpen { state: &'static str },

    #[error("statement was not executed because an earlier statement in the transaction failed")]
    TransactionAborted,

    #[error("transaction still has {count} joined scope(s) open")]
    OutstandingJoinedScopes { count: usize },

    #[error("malformed query: {0}")]
    MalformedQuery(String),

    #[error("{feature} is not supported by Neo4j {version}")]
    UnsupportedFeature { feature: String, version: String },

    #[error("parameter '{0}' is bound more than once with different values")]
    ParameterCollision(String),

    #[error("parameter '{0}' is referenced but never bound")]
    MissingParameter(String),

    #[error("{label} has no property '{property}'")]
    UnknownProperty { label: String, property: String },

    #[error("client is not connected")]
    NotConnected,

    #[error("no call context is active; use GraphClient::context() or CallContext::scope")]
    NoCallContext,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Unsupported(String),
}

/// A structured failure reported by the database.
///
/// Built from REST exception bodies (`exception`, `fullname`, `message`,
/// `stackTrace`), transactional `errors` entries (`code`, `message`), or Bolt
/// failure messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerException {
    /// Short exception name, e.g. `SyntaxException` or the last segment of a status code.
    pub exception: String,
    /// Fully qualified name or the full status code.
    pub full_name: String,
    /// Neo4j status code, e.g. `Neo.ClientError.Schema.ConstraintValidationFailed`.
    pub code: Option<String>,
    pub message: String,
    pub stack_trace: Vec<String>,
}

impl ServerException {
    /// Build from a Neo4j status code and message.
    pub fn from_code(code: &str, message: &str) -> Self {
        let exception = code.rsplit('.').next().unwrap_or(code).to_owned();
        ServerException {
            exception,
            full_name: code.to_owned(),
            code: Some(code.to_owned()),
            message: message.to_owned(),
            stack_trace: Vec::new(),
        }
    }

    /// Recover a status code from a driver message when one is embedded.
    pub fn from_driver_message(text: &str) -> Option<Self> {
        let start = text.find("Neo.")?;
        let code: String = text[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '.')
            .collect();
        if code.matches('.').count() < 3 {
            return None;
        }
        Some(ServerException::from_code(code.trim_end_matches('.'), text))
    }
}

impl std::fmt::Display for ServerException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.exception, self.message)?;
        if let Some(code) = &self.code {
            if code != &self.exception {
                write!(f, " [{code}]")?;
            }
        }
        Ok(())
    }
}
