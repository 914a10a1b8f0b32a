//! SQLite schema definitions for the normalized race dataset
//!
//! Tables:
//! - races: One row per race document
//! - horses: Horses keyed by their netkeiba id
//! - jockeys: Jockeys keyed by their netkeiba id, with career rates
//! - results: One row per finisher, unique per (race_id, umaban)

use rusqlite::{Connection, Result};

/// Create all tables in the database
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS races (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            venue TEXT NOT NULL,
            date TEXT NOT NULL,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS horses (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS jockeys (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            win_rate REAL,
            place_rate REAL,
            show_rate REAL,
            stats_updated_at TEXT
        )
        "#,
        [],
    )?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rank INTEGER NOT NULL CHECK (rank > 0),
            waku INTEGER NOT NULL,
            umaban INTEGER NOT NULL,
            sex INTEGER NOT NULL,
            age INTEGER NOT NULL,
            jockey_weight REAL NOT NULL,
            single_price REAL NOT NULL,
            popular INTEGER NOT NULL,
            horse_weight INTEGER NOT NULL,
            race_id TEXT NOT NULL REFERENCES races(id),
            horse_id INTEGER NOT NULL REFERENCES horses(id),
            jockey_id INTEGER NOT NULL REFERENCES jockeys(id),
            UNIQUE(race_id, umaban)
        )
        "#,
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_races_date ON races(date)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_horses_name ON horses(name)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_jockeys_name ON jockeys(name)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_horse ON results(horse_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_results_jockey ON results(jockey_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('races', 'horses', 'jockeys', 'results')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 4);
    }

    #[test]
    fn test_create_tables_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[test]
    fn test_result_requires_existing_race() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys = ON", []).unwrap();
        create_tables(&conn).unwrap();

        let err = conn.execute(
            "INSERT INTO results (rank, waku, umaban, sex, age, jockey_weight, single_price,
                                  popular, horse_weight, race_id, horse_id, jockey_id)
             VALUES (1, 1, 1, 0, 4, 57.0, 2.1, 1, 480, 'missing', 1, 1)",
            [],
        );
        assert!(err.is_err());
    }
}
