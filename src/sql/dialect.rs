//! SQL dialect differences between the production warehouse and the test engine
//!
//! Statements are written once; the handful of expressions that differ between
//! engines (column types, identity columns, epoch conversion, calendar parts)
//! are rendered through [`Dialect`].

/// SQL engine a statement is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Amazon Redshift (Postgres wire protocol, native `COPY` from S3)
    Redshift,
    /// SQLite, used by the test suite in place of a live cluster
    #[cfg(test)]
    Sqlite,
}

/// Column types used by the pipeline's tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    BigInt,
    Float,
    Varchar,
    Timestamp,
    /// Auto-incrementing surrogate key
    Identity,
}

/// Calendar fields derived from a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Hour,
    Day,
    /// ISO-8601 week of year
    Week,
    Month,
    Year,
    /// 0 = Sunday .. 6 = Saturday
    Weekday,
}

impl Dialect {
    /// Column type name, including the key clause for identity columns
    pub fn type_name(self, sql_type: SqlType) -> &'static str {
        match self {
            Dialect::Redshift => match sql_type {
                SqlType::Integer => "INT",
                SqlType::BigInt => "BIGINT",
                SqlType::Float => "FLOAT",
                SqlType::Varchar => "VARCHAR",
                SqlType::Timestamp => "TIMESTAMP",
                SqlType::Identity => "INT IDENTITY(0,1)",
            },
            #[cfg(test)]
            Dialect::Sqlite => match sql_type {
                SqlType::Integer | SqlType::BigInt => "INTEGER",
                SqlType::Float => "REAL",
                SqlType::Varchar | SqlType::Timestamp => "TEXT",
                SqlType::Identity => "INTEGER",
            },
        }
    }

    /// Primary key clause for an identity column
    pub fn identity_key(self) -> &'static str {
        match self {
            Dialect::Redshift => "PRIMARY KEY",
            #[cfg(test)]
            Dialect::Sqlite => "PRIMARY KEY AUTOINCREMENT",
        }
    }

    /// Remove every row from `table`, keeping its definition
    pub fn clear_table(self, table: &str) -> String {
        match self {
            Dialect::Redshift => format!("TRUNCATE {table}"),
            #[cfg(test)]
            Dialect::Sqlite => format!("DELETE FROM {table}"),
        }
    }

    /// Convert an epoch-millisecond column into a timestamp, keeping milliseconds
    pub fn epoch_millis_to_timestamp(self, column: &str) -> String {
        match self {
            Dialect::Redshift => {
                format!("TIMESTAMP 'epoch' + ({column} / 1000.0) * INTERVAL '1 second'")
            }
            // SQLite has no timestamp type; ISO-8601 text sorts and compares correctly
            #[cfg(test)]
            Dialect::Sqlite => {
                format!("strftime('%Y-%m-%d %H:%M:%f', {column} / 1000.0, 'unixepoch')")
            }
        }
    }

    /// Extract one calendar field from a timestamp expression as an integer
    pub fn date_part(self, part: DatePart, expr: &str) -> String {
        match self {
            Dialect::Redshift => {
                let field = match part {
                    DatePart::Hour => "hour",
                    DatePart::Day => "day",
                    DatePart::Week => "week",
                    DatePart::Month => "month",
                    DatePart::Year => "year",
                    DatePart::Weekday => "dow",
                };
                format!("EXTRACT({field} FROM {expr})")
            }
            #[cfg(test)]
            Dialect::Sqlite => match part {
                DatePart::Hour => format!("CAST(strftime('%H', {expr}) AS INTEGER)"),
                DatePart::Day => format!("CAST(strftime('%d', {expr}) AS INTEGER)"),
                // Day-of-year of the ISO week's Thursday, in weeks
                DatePart::Week => format!(
                    "(CAST(strftime('%j', date({expr}, '-3 days', 'weekday 4')) AS INTEGER) - 1) / 7 + 1"
                ),
                DatePart::Month => format!("CAST(strftime('%m', {expr}) AS INTEGER)"),
                DatePart::Year => format!("CAST(strftime('%Y', {expr}) AS INTEGER)"),
                DatePart::Weekday => format!("CAST(strftime('%w', {expr}) AS INTEGER)"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redshift_type_names() {
        assert_eq!(Dialect::Redshift.type_name(SqlType::Integer), "INT");
        assert_eq!(Dialect::Redshift.type_name(SqlType::BigInt), "BIGINT");
        assert_eq!(Dialect::Redshift.type_name(SqlType::Float), "FLOAT");
        assert_eq!(Dialect::Redshift.type_name(SqlType::Varchar), "VARCHAR");
        assert_eq!(Dialect::Redshift.type_name(SqlType::Timestamp), "TIMESTAMP");
        assert_eq!(
            Dialect::Redshift.type_name(SqlType::Identity),
            "INT IDENTITY(0,1)"
        );
    }

    #[test]
    fn test_redshift_epoch_conversion_keeps_milliseconds() {
        let expr = Dialect::Redshift.epoch_millis_to_timestamp("e.ts");
        assert_eq!(
            expr,
            "TIMESTAMP 'epoch' + (e.ts / 1000.0) * INTERVAL '1 second'"
        );
    }

    #[test]
    fn test_redshift_date_parts() {
        let cases = [
            (DatePart::Hour, "EXTRACT(hour FROM start_time)"),
            (DatePart::Day, "EXTRACT(day FROM start_time)"),
            (DatePart::Week, "EXTRACT(week FROM start_time)"),
            (DatePart::Month, "EXTRACT(month FROM start_time)"),
            (DatePart::Year, "EXTRACT(year FROM start_time)"),
            (DatePart::Weekday, "EXTRACT(dow FROM start_time)"),
        ];
        for (part, expected) in cases {
            assert_eq!(Dialect::Redshift.date_part(part, "start_time"), expected);
        }
    }

    #[test]
    fn test_sqlite_identity_column() {
        assert_eq!(Dialect::Sqlite.type_name(SqlType::Identity), "INTEGER");
        assert_eq!(Dialect::Sqlite.identity_key(), "PRIMARY KEY AUTOINCREMENT");
    }

    #[test]
    fn test_clear_table() {
        assert_eq!(Dialect::Redshift.clear_table("songplay"), "TRUNCATE songplay");
        assert_eq!(Dialect::Sqlite.clear_table("songplay"), "DELETE FROM songplay");
    }
}
