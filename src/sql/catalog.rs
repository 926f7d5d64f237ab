//! The ordered statement lists a pipeline run executes

use serde::Serialize;
use std::fmt;

use super::dialect::Dialect;
use super::load::{StagingSources, copy_staging};
use super::schema::Table;
use super::transform::insert_statements;

/// What a statement does to its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Drop,
    Create,
    Truncate,
    Copy,
    Insert,
    Count,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Drop => "drop",
            StatementKind::Create => "create",
            StatementKind::Truncate => "truncate",
            StatementKind::Copy => "copy",
            StatementKind::Insert => "insert",
            StatementKind::Count => "count",
        }
    }
}

/// A single rendered SQL statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub table: Table,
    pub sql: String,
}

impl Statement {
    fn new(kind: StatementKind, table: Table, sql: String) -> Self {
        Self { kind, table, sql }
    }

    /// Short label such as `create users`
    pub fn name(&self) -> String {
        format!("{} {}", self.kind.as_str(), self.table.name())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-- {}\n{};", self.name(), self.sql)
    }
}

/// Every statement of a pipeline run, grouped into the lists the runner executes
#[derive(Debug, Clone)]
pub struct StatementCatalog {
    pub drop_tables: Vec<Statement>,
    pub create_tables: Vec<Statement>,
    /// Empties every table before a load into an existing schema
    pub truncate_tables: Vec<Statement>,
    pub copy_staging: Vec<Statement>,
    pub insert_tables: Vec<Statement>,
    pub row_counts: Vec<Statement>,
}

impl StatementCatalog {
    /// Render the full catalog for `dialect`, with bulk loads reading from `sources`
    pub(crate) fn build(dialect: Dialect, sources: &StagingSources) -> Self {
        let drop_tables = Table::ALL
            .iter()
            .map(|&table| Statement::new(StatementKind::Drop, table, table.drop_sql()))
            .collect();

        let create_tables = Table::ALL
            .iter()
            .map(|&table| Statement::new(StatementKind::Create, table, table.create_sql(dialect)))
            .collect();

        let truncate_tables = Table::ALL
            .iter()
            .map(|&table| {
                Statement::new(StatementKind::Truncate, table, table.truncate_sql(dialect))
            })
            .collect();

        let copy_staging = copy_staging(sources)
            .into_iter()
            .map(|(table, sql)| Statement::new(StatementKind::Copy, table, sql))
            .collect();

        let insert_tables = insert_statements(dialect)
            .into_iter()
            .map(|(table, sql)| Statement::new(StatementKind::Insert, table, sql))
            .collect();

        let row_counts = Table::ALL
            .iter()
            .map(|&table| Statement::new(StatementKind::Count, table, table.count_sql()))
            .collect();

        Self {
            drop_tables,
            create_tables,
            truncate_tables,
            copy_staging,
            insert_tables,
            row_counts,
        }
    }

    /// All lists in execution order
    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.drop_tables
            .iter()
            .chain(&self.create_tables)
            .chain(&self.truncate_tables)
            .chain(&self.copy_staging)
            .chain(&self.insert_tables)
            .chain(&self.row_counts)
    }
}
