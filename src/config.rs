//! Connection settings and client options.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use cyflow_core::{ConverterRegistry, CyflowError, ProjectionMatching, UsageError, ValueConverter};

use crate::transport::TransportKind;

/// Where and how to connect.
///
/// The URI scheme picks the transport: `http`/`https` use the HTTP API,
/// `bolt`, `bolt+s`, `bolt+ssc`, `neo4j`, `neo4j+s` and `neo4j+ssc` use Bolt.
///
/// ```rust
/// # use cyflow::config::ClientConfig;
/// let config = ClientConfig::from_toml_str(r#"
///     uri = "http://localhost:7474"
///     user = "neo4j"
///     password = "secret"
/// "#).unwrap();
/// assert_eq!(config.max_connections, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Bolt only.
    pub database: Option<String>,
    /// Bolt connection pool size.
    pub max_connections: usize,
    /// Rows pulled per Bolt round trip.
    pub fetch_size: usize,
    /// HTTP request timeout.
    pub request_timeout_secs: Option<u64>,
    /// Attach the query text to errors raised while running it.
    pub include_query_in_errors: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: String::new(),
            database: None,
            max_connections: 16,
            fetch_size: 200,
            request_timeout_secs: Some(30),
            include_query_in_errors: false,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, CyflowError> {
        toml::from_str(text).map_err(|e| UsageError::InvalidConfig(e.to_string()).into())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CyflowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn transport_kind(&self) -> Result<TransportKind, UsageError> {
        let scheme = self
            .uri
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| UsageError::InvalidConfig(format!("'{}' has no scheme", self.uri)))?;
        match scheme.as_str() {
            "http" | "https" => Ok(TransportKind::Rest),
            "bolt" | "bolt+s" | "bolt+ssc" | "neo4j" | "neo4j+s" | "neo4j+ssc" => Ok(TransportKind::Bolt),
            other => Err(UsageError::InvalidConfig(format!("unsupported scheme '{other}'"))),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Client behaviour that cannot come from a config file.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub converters: Arc<ConverterRegistry>,
    pub projection_matching: ProjectionMatching,
    pub include_query_in_errors: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            converters: Arc::new(ConverterRegistry::default()),
            projection_matching: ProjectionMatching::Positional,
            include_query_in_errors: false,
        }
    }
}

impl ClientOptions {
    /// Register a converter after the built-in ones.
    pub fn with_converter(mut self, converter: impl ValueConverter + 'static) -> Self {
        Arc::make_mut(&mut self.converters).register(converter);
        self
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Arc::new(converters);
        self
    }

    pub fn with_projection_matching(mut self, matching: ProjectionMatching) -> Self {
        self.projection_matching = matching;
        self
    }

    pub fn include_query_in_errors(mut self, include: bool) -> Self {
        self.include_query_in_errors = include;
        self
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(config: &ClientConfig) -> Self {
        ClientOptions::default().include_query_in_errors(config.include_query_in_errors)
    }
}
