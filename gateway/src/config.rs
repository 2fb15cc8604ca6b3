use crate::tables::TableRegistry;
use serde::Deserialize;
use std::collections::HashSet;
use store::TransportEncoding;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("No tables configured")]
    NoTables,

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Duplicate table name: {0}")]
    DuplicateTable(String),

    #[error("Static auth requires at least one token")]
    NoStaticTokens,

    #[error("Empty static token value for subject {0}")]
    EmptyToken(String),

    #[error("Write retry attempts must be at least 1")]
    NoWriteAttempts,

    #[error("Maximum body size must be non-zero")]
    ZeroBodyLimit,
}

/// Ingress gateway configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for incoming ingest requests
    pub listener: Listener,
    /// Tables the gateway accepts documents for
    pub tables: Vec<TableConfig>,
    /// Caller authorization mode
    #[serde(default)]
    pub auth: AuthMode,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub write: WriteConfig,
    /// Transport encoding applied to landing payloads
    #[serde(default)]
    pub encoding: TransportEncoding,
}

impl Config {
    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }
        let mut names = HashSet::new();
        for table in &self.tables {
            if !TableRegistry::is_valid_name(&table.name) {
                return Err(ValidationError::InvalidTableName(table.name.clone()));
            }
            if !names.insert(&table.name) {
                return Err(ValidationError::DuplicateTable(table.name.clone()));
            }
        }

        if let AuthMode::Static { tokens } = &self.auth {
            if tokens.is_empty() {
                return Err(ValidationError::NoStaticTokens);
            }
            for token in tokens {
                if token.token.is_empty() {
                    return Err(ValidationError::EmptyToken(token.subject.clone()));
                }
            }
        }

        if self.write.retry_attempts == 0 {
            return Err(ValidationError::NoWriteAttempts);
        }
        if self.limits.max_body_bytes == 0 {
            return Err(ValidationError::ZeroBodyLimit);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TableConfig {
    pub name: String,
}

/// Caller authorization configuration.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum AuthMode {
    /// No authorization; every request is admitted.
    #[default]
    Disabled,
    /// Tokens provisioned directly in the configuration file.
    Static { tokens: Vec<StaticToken> },
    /// Remote HTTP token-introspection endpoint.
    Remote {
        url: Url,
        #[serde(default = "default_auth_timeout_secs")]
        timeout_secs: u64,
    },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StaticToken {
    pub token: String,
    pub subject: String,
    /// Tables this token may write to; omit to grant all tables.
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Limits {
    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Bounds on the synchronous landing write.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct WriteConfig {
    /// Per-attempt timeout in seconds
    #[serde(default = "default_write_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts before the request fails 503
    #[serde(default = "default_write_attempts")]
    pub retry_attempts: u32,
    /// Linear backoff step between attempts
    #[serde(default = "default_write_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for WriteConfig {
    fn default() -> Self {
        WriteConfig {
            timeout_secs: default_write_timeout_secs(),
            retry_attempts: default_write_attempts(),
            retry_backoff_ms: default_write_backoff_ms(),
        }
    }
}

fn default_auth_timeout_secs() -> u64 {
    5
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_write_timeout_secs() -> u64 {
    5
}

fn default_write_attempts() -> u32 {
    3
}

fn default_write_backoff_ms() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            listener: Listener {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            tables: vec![
                TableConfig {
                    name: "events".to_string(),
                },
                TableConfig {
                    name: "orders".to_string(),
                },
            ],
            auth: AuthMode::Disabled,
            limits: Limits::default(),
            write: WriteConfig::default(),
            encoding: TransportEncoding::Base64,
        }
    }

    #[test]
    fn test_parse_valid_config() {
        let yaml = r#"
listener:
    host: "0.0.0.0"
    port: 3000
tables:
    - name: events
    - name: orders
auth:
    type: static
    tokens:
        - token: alice-token
          subject: alice
          tables:
            - events
limits:
    max_body_bytes: 524288
write:
    timeout_secs: 2
    retry_attempts: 5
    retry_backoff_ms: 50
encoding: base64
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.tables.len(), 2);
        assert_eq!(config.limits.max_body_bytes, 524288);
        assert_eq!(config.write.retry_attempts, 5);
        match &config.auth {
            AuthMode::Static { tokens } => {
                assert_eq!(tokens.len(), 1);
                assert_eq!(tokens[0].subject, "alice");
            }
            other => panic!("unexpected auth mode: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let yaml = r#"
listener: {host: "127.0.0.1", port: 8080}
tables: [{name: events}]
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.auth, AuthMode::Disabled);
        assert_eq!(config.limits.max_body_bytes, 1024 * 1024);
        assert_eq!(config.write.retry_attempts, 3);
        assert_eq!(config.encoding, TransportEncoding::Base64);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = base_config();
        config.listener.port = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidPort
        ));

        let mut config = base_config();
        config.tables.clear();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::NoTables
        ));

        let mut config = base_config();
        config.tables.push(TableConfig {
            name: "events".to_string(),
        });
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::DuplicateTable(_)
        ));

        let mut config = base_config();
        config.tables[0].name = "bad table!".to_string();
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::InvalidTableName(_)
        ));

        let mut config = base_config();
        config.auth = AuthMode::Static { tokens: vec![] };
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::NoStaticTokens
        ));

        let mut config = base_config();
        config.write.retry_attempts = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::NoWriteAttempts
        ));

        let mut config = base_config();
        config.limits.max_body_bytes = 0;
        assert!(matches!(
            config.validate().unwrap_err(),
            ValidationError::ZeroBodyLimit
        ));
    }

    #[test]
    fn test_deserialization_errors() {
        // Invalid auth url
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
tables: [{name: events}]
auth: {type: remote, url: "not a url"}
"#
            )
            .is_err()
        );

        // Unknown encoding
        assert!(
            serde_yaml::from_str::<Config>(
                r#"
listener: {host: "0.0.0.0", port: 3000}
tables: [{name: events}]
encoding: gzip
"#
            )
            .is_err()
        );

        // Missing required field
        assert!(serde_yaml::from_str::<Config>("listener: {host: h, port: 1}").is_err());
    }
}
