//! Bulk-load statements that fill the staging tables from object storage
//!
//! Loading is done by the warehouse's native `COPY`, never row by row. Every
//! parameter comes from an explicit [`StagingSources`] value.

use anyhow::Result;

use super::literal::{AwsRegion, IamRole, quote_literal};
use super::schema::Table;
use crate::io::StorageUri;

/// How the bulk loader maps JSON fields onto staging columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPathRule {
    /// Match top-level JSON keys to column names
    Auto,
    /// As `Auto`, ignoring the case of JSON keys
    AutoIgnoreCase,
    /// Explicit JSONPaths file listing one path per column
    Mapping(StorageUri),
}

impl JsonPathRule {
    /// Parse `auto`, `auto ignorecase` or an `s3://` location of a JSONPaths file
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let words: Vec<&str> = value.split_whitespace().collect();
        if matches!(words.as_slice(), [auto] if auto.eq_ignore_ascii_case("auto")) {
            Ok(JsonPathRule::Auto)
        } else if matches!(
            words.as_slice(),
            [auto, ignore] if auto.eq_ignore_ascii_case("auto") && ignore.eq_ignore_ascii_case("ignorecase")
        ) {
            Ok(JsonPathRule::AutoIgnoreCase)
        } else {
            Ok(JsonPathRule::Mapping(StorageUri::parse(value)?))
        }
    }

    /// Rule for sources whose JSON keys are camelCase
    ///
    /// Warehouse column names are lower case, so plain `auto` would leave those
    /// columns empty.
    fn ignoring_case(&self) -> Self {
        match self {
            JsonPathRule::Auto => JsonPathRule::AutoIgnoreCase,
            other => other.clone(),
        }
    }

    fn to_literal(&self) -> String {
        match self {
            JsonPathRule::Auto => quote_literal("auto"),
            JsonPathRule::AutoIgnoreCase => quote_literal("auto ignorecase"),
            JsonPathRule::Mapping(uri) => quote_literal(&uri.to_string()),
        }
    }
}

/// Where the staging data lives and how the warehouse may read it
#[derive(Debug, Clone)]
pub struct StagingSources {
    pub log_data: StorageUri,
    /// Field mapping for the event log; song metadata always uses `auto`
    pub log_jsonpath: JsonPathRule,
    pub song_data: StorageUri,
    pub iam_role: IamRole,
    pub region: AwsRegion,
}

/// Render one COPY statement
pub fn copy_sql(
    table: Table,
    source: &StorageUri,
    iam_role: &IamRole,
    region: &AwsRegion,
    rule: &JsonPathRule,
) -> String {
    format!(
        "COPY {}\nFROM {}\nIAM_ROLE {}\nREGION {}\nFORMAT AS JSON {}",
        table.name(),
        quote_literal(&source.to_string()),
        quote_literal(iam_role.as_str()),
        quote_literal(region.as_str()),
        rule.to_literal(),
    )
}

/// The two staging loads, events first
pub fn copy_staging(sources: &StagingSources) -> [(Table, String); 2] {
    [
        (
            Table::StagingEvents,
            copy_sql(
                Table::StagingEvents,
                &sources.log_data,
                &sources.iam_role,
                &sources.region,
                &sources.log_jsonpath.ignoring_case(),
            ),
        ),
        (
            Table::StagingSongs,
            copy_sql(
                Table::StagingSongs,
                &sources.song_data,
                &sources.iam_role,
                &sources.region,
                &JsonPathRule::Auto,
            ),
        ),
    ]
}
