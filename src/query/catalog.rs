//! Catalog context threaded through every plan and expression loader.
//!
//! Decoding never consults ambient state: column references and index names
//! are resolved against the [`Database`] handed to the decoder, which makes
//! reconstruction deterministic and testable in isolation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::error::{PlanError, Result};

/// Row estimate used for tables with no recorded count.
pub const DEFAULT_TABLE_ROWS: u64 = 1_000_000;

/// Index definition attached to a table.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns in key order.
    pub columns: Vec<String>,
    /// Whether each key maps to at most one row.
    #[serde(default)]
    pub unique: bool,
}

/// Table definition with ordered columns.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Column names in storage order.
    pub columns: Vec<String>,
    /// Indexes defined on the table.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
    /// Optional row count used by cost estimation.
    #[serde(default)]
    pub row_count: Option<u64>,
}

impl TableDef {
    /// Creates a table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            row_count: None,
        }
    }

    /// Appends a column.
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(name.into());
        self
    }

    /// Registers an index over the given columns.
    pub fn with_index<I, S>(mut self, name: impl Into<String>, columns: I, unique: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(IndexDef {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        });
        self
    }

    /// Records the table's row count.
    pub fn with_row_count(mut self, rows: u64) -> Self {
        self.row_count = Some(rows);
        self
    }

    /// Position of `column` in storage order.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|idx| idx.name == name)
    }
}

/// Schema context used while decoding plans.
#[derive(Clone, Debug, Default)]
pub struct Database {
    tables: HashMap<String, TableDef>,
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    tables: Vec<TableDef>,
}

impl Database {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table, replacing any table with the same name.
    pub fn with_table(mut self, table: TableDef) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Parses a TOML catalog (`[[tables]]` entries).
    pub fn from_toml_str(contents: &str) -> std::result::Result<Self, ConfigError> {
        let raw: RawCatalog = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: None,
            source,
        })?;
        let mut db = Database::new();
        for table in raw.tables {
            for index in &table.indexes {
                if let Some(column) = index
                    .columns
                    .iter()
                    .find(|c| table.column_index(c).is_none())
                {
                    return Err(ConfigError::InvalidCatalog(format!(
                        "index '{}' on table '{}' references unknown column '{}'",
                        index.name, table.name, column
                    )));
                }
            }
            if db.tables.contains_key(&table.name) {
                return Err(ConfigError::InvalidCatalog(format!(
                    "table '{}' is defined more than once",
                    table.name
                )));
            }
            db.tables.insert(table.name.clone(), table);
        }
        Ok(db)
    }

    /// Reads a TOML catalog from disk.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|err| err.with_path(path))
    }

    /// Resolves a table by name.
    pub fn table(&self, name: &str) -> Result<&TableDef> {
        self.tables
            .get(name)
            .ok_or_else(|| PlanError::UnknownTable(name.to_owned()))
    }

    /// Resolves a column's position within its table.
    pub fn column_index(&self, table: &str, column: &str) -> Result<usize> {
        self.table(table)?
            .column_index(column)
            .ok_or_else(|| PlanError::UnknownColumn {
                table: table.to_owned(),
                column: column.to_owned(),
            })
    }

    /// Resolves an index on a table.
    pub fn index(&self, table: &str, index: &str) -> Result<&IndexDef> {
        self.table(table)?
            .index(index)
            .ok_or_else(|| PlanError::UnknownIndex {
                table: table.to_owned(),
                index: index.to_owned(),
            })
    }

    /// Iterates over registered tables in no particular order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }
}

/// Cardinality inputs for cost estimation.
#[derive(Clone, Debug)]
pub struct DatabaseEstimates {
    default_table_rows: u64,
    table_rows: HashMap<String, u64>,
}

impl Default for DatabaseEstimates {
    fn default() -> Self {
        Self {
            default_table_rows: DEFAULT_TABLE_ROWS,
            table_rows: HashMap::new(),
        }
    }
}

impl DatabaseEstimates {
    /// Collects row counts recorded in the catalog.
    pub fn from_database(db: &Database) -> Self {
        let table_rows = db
            .tables()
            .filter_map(|t| t.row_count.map(|rows| (t.name.clone(), rows)))
            .collect();
        Self {
            default_table_rows: DEFAULT_TABLE_ROWS,
            table_rows,
        }
    }

    /// Overrides the estimate for one table.
    pub fn with_table_rows(mut self, table: impl Into<String>, rows: u64) -> Self {
        self.table_rows.insert(table.into(), rows);
        self
    }

    /// Row estimate for `table`.
    pub fn table_rows(&self, table: &str) -> u64 {
        self.table_rows
            .get(table)
            .copied()
            .unwrap_or(self.default_table_rows)
    }
}
