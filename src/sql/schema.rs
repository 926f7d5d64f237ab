//! Staging and star-schema table definitions
//!
//! No foreign keys are declared, so tables can be dropped and created in any
//! order. [`Table::ALL`] fixes the order used for every per-table list anyway,
//! to keep runs and logs reproducible.

use std::fmt;

use super::dialect::{Dialect, SqlType};

/// Constraint attached to a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    NotNull,
    PrimaryKey,
}

/// A column in a table definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub constraint: Constraint,
}

const fn col(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint: Constraint::None,
    }
}

const fn not_null(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint: Constraint::NotNull,
    }
}

const fn key(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef {
        name,
        sql_type,
        constraint: Constraint::PrimaryKey,
    }
}

use SqlType::{BigInt, Float, Identity, Integer, Timestamp, Varchar};

/// Raw event log records, one row per JSON record
const STAGING_EVENTS: &[ColumnDef] = &[
    col("artist", Varchar),
    col("auth", Varchar),
    col("firstName", Varchar),
    col("gender", Varchar),
    col("itemInSession", Integer),
    col("lastName", Varchar),
    col("length", Float),
    col("level", Varchar),
    col("location", Varchar),
    col("method", Varchar),
    col("page", Varchar),
    col("registration", Float),
    col("sessionId", Integer),
    col("song", Varchar),
    col("status", Integer),
    col("ts", BigInt),
    col("userAgent", Varchar),
    col("userId", Integer),
];

/// Raw song metadata records, one row per JSON document
const STAGING_SONGS: &[ColumnDef] = &[
    col("num_songs", Integer),
    col("artist_id", Varchar),
    col("artist_latitude", Float),
    col("artist_longitude", Float),
    col("artist_location", Varchar),
    col("artist_name", Varchar),
    col("song_id", Varchar),
    col("title", Varchar),
    col("duration", Float),
    col("year", Integer),
];

const SONGPLAY: &[ColumnDef] = &[
    key("songplay_id", Identity),
    not_null("start_time", Timestamp),
    not_null("user_id", Integer),
    col("level", Varchar),
    col("song_id", Varchar),
    col("artist_id", Varchar),
    col("session_id", Integer),
    col("location", Varchar),
    col("user_agent", Varchar),
];

const USERS: &[ColumnDef] = &[
    key("user_id", Integer),
    col("first_name", Varchar),
    col("last_name", Varchar),
    col("gender", Varchar),
    col("level", Varchar),
];

const SONGS: &[ColumnDef] = &[
    key("song_id", Varchar),
    col("title", Varchar),
    col("artist_id", Varchar),
    col("duration", Float),
    col("year", Integer),
];

const ARTISTS: &[ColumnDef] = &[
    key("artist_id", Varchar),
    col("name", Varchar),
    col("location", Varchar),
    col("latitude", Float),
    col("longitude", Float),
];

const TIME: &[ColumnDef] = &[
    key("start_time", Timestamp),
    col("hour", Integer),
    col("day", Integer),
    col("week", Integer),
    col("month", Integer),
    col("year", Integer),
    col("weekday", Integer),
];

/// Every table the pipeline owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Songplay,
    Users,
    Songs,
    Artists,
    Time,
}

impl Table {
    /// All tables, in drop/create/count order
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Songplay,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplay => "songplay",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
        }
    }

    pub fn columns(self) -> &'static [ColumnDef] {
        match self {
            Table::StagingEvents => STAGING_EVENTS,
            Table::StagingSongs => STAGING_SONGS,
            Table::Songplay => SONGPLAY,
            Table::Users => USERS,
            Table::Songs => SONGS,
            Table::Artists => ARTISTS,
            Table::Time => TIME,
        }
    }

    pub fn is_staging(self) -> bool {
        matches!(self, Table::StagingEvents | Table::StagingSongs)
    }

    pub fn drop_sql(self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.name())
    }

    pub fn truncate_sql(self, dialect: Dialect) -> String {
        dialect.clear_table(self.name())
    }

    /// Generate the CREATE TABLE statement for `dialect`
    pub fn create_sql(self, dialect: Dialect) -> String {
        let column_defs: Vec<String> = self
            .columns()
            .iter()
            .map(|column| {
                let type_name = dialect.type_name(column.sql_type);
                match column.constraint {
                    Constraint::None => format!("    {} {}", column.name, type_name),
                    Constraint::NotNull => format!("    {} {} NOT NULL", column.name, type_name),
                    Constraint::PrimaryKey if column.sql_type == SqlType::Identity => format!(
                        "    {} {} {}",
                        column.name,
                        type_name,
                        dialect.identity_key()
                    ),
                    Constraint::PrimaryKey => {
                        format!("    {} {} PRIMARY KEY", column.name, type_name)
                    }
                }
            })
            .collect();

        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.name(),
            column_defs.join(",\n")
        )
    }

    /// Row-count diagnostic query
    pub fn count_sql(self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.name())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
