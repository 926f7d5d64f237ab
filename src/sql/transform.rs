//! Set-based transformations from staging tables into the star schema
//!
//! Target tables are empty when these run (they are recreated on every run),
//! so each statement is a plain INSERT ... SELECT with no merge logic.

use super::dialect::{DatePart, Dialect};
use super::schema::Table;

/// The five transformations, fact table first
pub fn insert_statements(dialect: Dialect) -> [(Table, String); 5] {
    [
        (Table::Songplay, songplay_insert(dialect)),
        (Table::Users, users_insert()),
        (Table::Songs, songs_insert()),
        (Table::Artists, artists_insert()),
        (Table::Time, time_insert(dialect)),
    ]
}

/// One fact row per distinct `NextSong` event that matches a known song
pub fn songplay_insert(dialect: Dialect) -> String {
    format!(
        "INSERT INTO songplay (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT DISTINCT
    {start_time} AS start_time,
    e.userId AS user_id,
    e.level,
    s.song_id,
    s.artist_id,
    e.sessionId AS session_id,
    e.location,
    e.userAgent AS user_agent
FROM staging_events e
JOIN staging_songs s
    ON e.song = s.title
   AND e.artist = s.artist_name
WHERE e.page = 'NextSong'",
        start_time = dialect.epoch_millis_to_timestamp("e.ts"),
    )
}

/// One row per user; the most recent event decides name and level
pub fn users_insert() -> String {
    "INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT user_id, first_name, last_name, gender, level
FROM (
    SELECT
        userId AS user_id,
        firstName AS first_name,
        lastName AS last_name,
        gender,
        level,
        ROW_NUMBER() OVER (PARTITION BY userId ORDER BY ts DESC NULLS LAST) AS row_rank
    FROM staging_events
    WHERE userId IS NOT NULL
) AS ranked_users
WHERE row_rank = 1"
        .to_string()
}

pub fn songs_insert() -> String {
    "INSERT INTO songs (song_id, title, artist_id, duration, year)
SELECT song_id, title, artist_id, duration, year
FROM (
    SELECT
        song_id,
        title,
        artist_id,
        duration,
        year,
        ROW_NUMBER() OVER (PARTITION BY song_id ORDER BY year DESC NULLS LAST) AS row_rank
    FROM staging_songs
    WHERE song_id IS NOT NULL
) AS ranked_songs
WHERE row_rank = 1"
        .to_string()
}

pub fn artists_insert() -> String {
    "INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT artist_id, name, location, latitude, longitude
FROM (
    SELECT
        artist_id,
        artist_name AS name,
        artist_location AS location,
        artist_latitude AS latitude,
        artist_longitude AS longitude,
        ROW_NUMBER() OVER (PARTITION BY artist_id ORDER BY artist_name, artist_location NULLS LAST) AS row_rank
    FROM staging_songs
    WHERE artist_id IS NOT NULL
) AS ranked_artists
WHERE row_rank = 1"
        .to_string()
}

/// One row per distinct event timestamp, split into calendar fields
pub fn time_insert(dialect: Dialect) -> String {
    let part = |p| dialect.date_part(p, "start_time");
    format!(
        "INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT
    start_time,
    {hour} AS hour,
    {day} AS day,
    {week} AS week,
    {month} AS month,
    {year} AS year,
    {weekday} AS weekday
FROM (
    SELECT DISTINCT {start_time} AS start_time
    FROM staging_events
    WHERE ts IS NOT NULL
) AS event_times",
        hour = part(DatePart::Hour),
        day = part(DatePart::Day),
        week = part(DatePart::Week),
        month = part(DatePart::Month),
        year = part(DatePart::Year),
        weekday = part(DatePart::Weekday),
        start_time = dialect.epoch_millis_to_timestamp("ts"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_fact_first() {
        let tables: Vec<Table> = insert_statements(Dialect::Redshift)
            .iter()
            .map(|(table, _)| *table)
            .collect();
        assert_eq!(
            tables,
            vec![
                Table::Songplay,
                Table::Users,
                Table::Songs,
                Table::Artists,
                Table::Time
            ]
        );
    }

    #[test]
    fn test_songplay_filter_is_part_of_the_statement() {
        let sql = songplay_insert(Dialect::Redshift);

        // Single statement: no terminator before the filter
        assert!(!sql.contains(';'));
        let join_pos = sql.find("JOIN staging_songs s").unwrap();
        let where_pos = sql.find("WHERE e.page = 'NextSong'").unwrap();
        assert!(where_pos > join_pos);
        assert!(sql.contains("ON e.song = s.title\n   AND e.artist = s.artist_name"));
        assert!(sql.contains("TIMESTAMP 'epoch' + (e.ts / 1000.0) * INTERVAL '1 second' AS start_time"));
    }

    #[test]
    fn test_dimensions_exclude_null_keys() {
        assert!(users_insert().contains("WHERE userId IS NOT NULL"));
        assert!(songs_insert().contains("WHERE song_id IS NOT NULL"));
        assert!(artists_insert().contains("WHERE artist_id IS NOT NULL"));
        assert!(time_insert(Dialect::Redshift).contains("WHERE ts IS NOT NULL"));
    }

    #[test]
    fn test_dimensions_deduplicate_by_key() {
        assert!(users_insert().contains("PARTITION BY userId"));
        assert!(songs_insert().contains("PARTITION BY song_id"));
        assert!(artists_insert().contains("PARTITION BY artist_id"));
        assert!(time_insert(Dialect::Redshift).contains("SELECT DISTINCT"));
    }

    #[test]
    fn test_time_insert_extracts_calendar_fields() {
        let sql = time_insert(Dialect::Redshift);
        for field in ["hour", "day", "week", "month", "year"] {
            assert!(sql.contains(&format!("EXTRACT({field} FROM start_time) AS {field}")));
        }
        assert!(sql.contains("EXTRACT(dow FROM start_time) AS weekday"));
        assert!(sql.ends_with(") AS event_times"));
    }
}
