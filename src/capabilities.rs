//! What the connected server's Cypher dialect supports.

use std::fmt;

/// A `major.minor.patch` server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse `"3.5.14"`, `"4.4.0-enterprise"`, `"5.12"` or `"Neo4j/4.0.1"`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.rsplit('/').next().unwrap_or(text);
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let mut parts = text[start..]
            .split(|c: char| !c.is_ascii_digit())
            .take(3)
            .map(|p| p.parse::<u32>().ok());
        let major = parts.next().flatten()?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self { major, minor, patch })
    }

    fn at_least(&self, major: u32, minor: u32) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Feature flags derived once from the server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CypherCapabilities {
    pub version: ServerVersion,
    pub supports_transactions: bool,
    pub supports_optional_match: bool,
    pub supports_merge: bool,
    pub supports_unwind: bool,
    pub supports_detach_delete: bool,
    /// The server rolls a transaction back by itself when a statement fails.
    pub auto_rolls_back_on_error: bool,
    pub supports_stored_procedures: bool,
    /// `$name` placeholders; older servers only accept `{name}`.
    pub supports_dollar_parameters: bool,
    pub supports_start: bool,
    pub supports_create_unique: bool,
    /// REST single-request `transaction/commit` endpoint.
    pub supports_implicit_transactions: bool,
}

impl CypherCapabilities {
    pub fn for_version(version: ServerVersion) -> Self {
        Self {
            version,
            supports_transactions: version.at_least(2, 0),
            supports_optional_match: version.at_least(2, 0),
            supports_merge: version.at_least(2, 0),
            supports_unwind: version.at_least(2, 1),
            supports_detach_delete: version.at_least(2, 3),
            auto_rolls_back_on_error: version.at_least(2, 2),
            supports_stored_procedures: version.at_least(3, 0),
            supports_dollar_parameters: version.at_least(3, 0),
            supports_start: !version.at_least(3, 2),
            supports_create_unique: !version.at_least(4, 0),
            supports_implicit_transactions: version.at_least(2, 0),
        }
    }
}

impl Default for CypherCapabilities {
    /// Capabilities of a current server, used before a version is known.
    fn default() -> Self {
        Self::for_version(ServerVersion::new(5, 0, 0))
    }
}

