use std::time::Duration;

use cyflow::capabilities::{CypherCapabilities, ServerVersion};
use cyflow::config::{ClientConfig, ClientOptions};
use cyflow::transport::TransportKind;
use cyflow::UsageError;
use cyflow_core::{CyflowError, ProjectionMatching, TargetKind, Value, ValueConverter};

#[test]
fn test_version_parsing() {
    assert_eq!(ServerVersion::parse("3.5.14"), Some(ServerVersion::new(3, 5, 14)));
    assert_eq!(ServerVersion::parse("4.4.0-enterprise"), Some(ServerVersion::new(4, 4, 0)));
    assert_eq!(ServerVersion::parse("Neo4j/5.12"), Some(ServerVersion::new(5, 12, 0)));
    assert_eq!(ServerVersion::parse("unknown"), None);
    assert_eq!(ServerVersion::new(2, 2, 5).to_string(), "2.2.5");
}

#[test]
fn test_capabilities_follow_version() {
    let old = CypherCapabilities::for_version(ServerVersion::new(2, 2, 0));
    assert!(old.supports_transactions);
    assert!(old.auto_rolls_back_on_error);
    assert!(!old.supports_detach_delete);
    assert!(!old.supports_dollar_parameters);
    assert!(old.supports_start);
    assert!(old.supports_create_unique);

    let new = CypherCapabilities::for_version(ServerVersion::new(4, 0, 0));
    assert!(new.supports_detach_delete);
    assert!(new.supports_stored_procedures);
    assert!(new.supports_dollar_parameters);
    assert!(!new.supports_start);
    assert!(!new.supports_create_unique);

    assert_eq!(CypherCapabilities::default().version, ServerVersion::new(5, 0, 0));
}

#[test]
fn test_config_defaults() {
    let config = ClientConfig::default();
    assert_eq!(config.uri, "bolt://localhost:7687");
    assert_eq!(config.user, "neo4j");
    assert_eq!(config.transport_kind().unwrap(), TransportKind::Bolt);
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
}

#[test]
fn test_config_from_toml() {
    let config = ClientConfig::from_toml_str(
        r#"
        uri = "https://db.example.com:7473"
        user = "app"
        password = "secret"
        request_timeout_secs = 5
        include_query_in_errors = true
        "#,
    )
    .unwrap();
    assert_eq!(config.transport_kind().unwrap(), TransportKind::Rest);
    assert_eq!(config.user, "app");
    assert_eq!(config.fetch_size, 200);
    assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
    assert!(ClientOptions::from(&config).include_query_in_errors);
}

#[test]
fn test_config_errors() {
    let err = ClientConfig::from_toml_str("max_connections = \"many\"").unwrap_err();
    assert!(matches!(err.as_usage(), Some(UsageError::InvalidConfig(_))));

    let config = ClientConfig {
        uri: "ftp://localhost".into(),
        ..ClientConfig::default()
    };
    assert!(matches!(config.transport_kind(), Err(UsageError::InvalidConfig(_))));

    let config = ClientConfig {
        uri: "localhost:7687".into(),
        ..ClientConfig::default()
    };
    assert!(config.transport_kind().is_err());
}

#[test]
fn test_config_from_file() {
    let path = std::env::temp_dir().join(format!("cyflow-config-{}.toml", std::process::id()));
    std::fs::write(&path, "uri = \"neo4j+s://cluster.example.com\"\ndatabase = \"graph\"\n").unwrap();
    let config = ClientConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.database.as_deref(), Some("graph"));
    assert_eq!(config.transport_kind().unwrap(), TransportKind::Bolt);
}

struct Shout;

impl ValueConverter for Shout {
    fn name(&self) -> &'static str {
        "shout"
    }

    fn claims(&self, value: &Value, _target: &TargetKind) -> bool {
        matches!(value, Value::String(_))
    }

    fn convert(&self, value: Value, _target: &TargetKind) -> Result<Value, CyflowError> {
        match value {
            Value::String(s) => Ok(Value::String(s.to_uppercase())),
            other => Ok(other),
        }
    }
}

#[test]
fn test_options_builder() {
    let options = ClientOptions::default()
        .with_converter(Shout)
        .with_projection_matching(ProjectionMatching::ByName)
        .include_query_in_errors(true);
    assert_eq!(options.projection_matching, ProjectionMatching::ByName);
    assert!(options.include_query_in_errors);
    assert_eq!(options.converters.names().last(), Some(&"shout"));
    assert_eq!(ClientOptions::default().converters.names().len() + 1, options.converters.names().len());
}
