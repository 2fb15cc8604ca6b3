use crate::config::TableConfig;
use crate::errors::GatewayError;
use indexmap::IndexMap;

const MAX_TABLE_NAME_LEN: usize = 64;

/// Registry of tables the platform accepts documents for.
///
/// Caller-supplied table names are resolved here at the gateway boundary;
/// unknown tables never reach the storage layer. Insertion order follows
/// the configuration file.
pub struct TableRegistry {
    tables: IndexMap<String, TableConfig>,
}

impl TableRegistry {
    pub fn new(tables: Vec<TableConfig>) -> Self {
        TableRegistry {
            tables: tables
                .into_iter()
                .map(|table| (table.name.clone(), table))
                .collect(),
        }
    }

    /// Syntactic rule for table names: `[A-Za-z0-9_-]{1,64}`.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= MAX_TABLE_NAME_LEN
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// Resolve a caller-supplied table name.
    pub fn resolve(&self, name: &str) -> Result<&TableConfig, GatewayError> {
        if !Self::is_valid_name(name) {
            return Err(GatewayError::InvalidTableName(name.to_string()));
        }
        self.tables
            .get(name)
            .ok_or_else(|| GatewayError::UnknownTable(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }
}
