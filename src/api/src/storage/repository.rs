//! SQLite repository for the race dataset
//!
//! Query helpers are plain functions over `&Connection` so that the
//! persistence coordinator can run them inside a `Transaction`; the
//! `RaceRepository` methods wrap them for everything else.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;

use super::models::{Horse, Jockey, JockeyStats, Race, ResultRecord, Venue};
use super::schema::create_tables;

/// Repository for the normalized race dataset
pub struct RaceRepository {
    conn: Connection,
}

impl RaceRepository {
    /// Create a new repository, initializing the database if needed
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let conn = Connection::open(db_path).context("Failed to open database")?;
        Self::init(conn)
    }

    /// Create an in-memory repository (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        create_tables(&conn).context("Failed to create tables")?;
        Ok(Self { conn })
    }

    /// Begin a transaction on the underlying connection.
    pub fn transaction(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.transaction()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ==================== Lookups ====================

    /// A race counts as done once at least one of its results is stored.
    /// A race row alone is what a rolled-back result batch leaves behind.
    pub fn race_complete(&self, race_id: &str) -> Result<bool> {
        Ok(results_exist(&self.conn, race_id)?)
    }

    /// All races ordered by date, then id
    pub fn list_races(&self) -> Result<Vec<Race>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, venue, date FROM races ORDER BY date, id")?;

        let races = stmt
            .query_map([], |row| {
                let venue: String = row.get(2)?;
                Ok(Race {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    venue: Venue::from_name(&venue),
                    date: date_column(row, 3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(races)
    }

    #[cfg(test)]
    pub fn get_race(&self, race_id: &str) -> Result<Option<Race>> {
        let race = self
            .conn
            .query_row(
                "SELECT id, name, venue, date FROM races WHERE id = ?1",
                [race_id],
                |row| {
                    let venue: String = row.get(2)?;
                    Ok(Race {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        venue: Venue::from_name(&venue),
                        date: date_column(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(race)
    }

    #[cfg(test)]
    pub fn get_jockey(&self, jockey_id: i64) -> Result<Option<Jockey>> {
        let jockey = self
            .conn
            .query_row(
                "SELECT id, name, win_rate, place_rate, show_rate FROM jockeys WHERE id = ?1",
                [jockey_id],
                |row| {
                    Ok(Jockey {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        stats: JockeyStats {
                            win_rate: row.get(2)?,
                            place_rate: row.get(3)?,
                            show_rate: row.get(4)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(jockey)
    }

    /// Results of a race ordered by horse number
    #[cfg(test)]
    pub fn get_race_results(&self, race_id: &str) -> Result<Vec<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT race_id, horse_id, jockey_id, rank, waku, umaban, sex, age,
                   jockey_weight, single_price, popular, horse_weight
            FROM results
            WHERE race_id = ?1
            ORDER BY umaban
            "#,
        )?;

        let results = stmt
            .query_map([race_id], |row| {
                let sex: u8 = row.get(6)?;
                Ok(ResultRecord {
                    race_id: row.get(0)?,
                    horse_id: row.get(1)?,
                    jockey_id: row.get(2)?,
                    rank: row.get(3)?,
                    waku: row.get(4)?,
                    umaban: row.get(5)?,
                    sex: super::models::Sex::from_code(sex).ok_or_else(|| {
                        rusqlite::Error::IntegralValueOutOfRange(6, i64::from(sex))
                    })?,
                    age: row.get(7)?,
                    jockey_weight: row.get(8)?,
                    single_price: row.get(9)?,
                    popular: row.get(10)?,
                    horse_weight: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }

    /// Career stats for the given jockeys; ids not in the store are absent
    pub fn jockey_stats_for(&self, jockey_ids: &[i64]) -> Result<HashMap<i64, JockeyStats>> {
        let mut stmt = self
            .conn
            .prepare("SELECT win_rate, place_rate, show_rate FROM jockeys WHERE id = ?1")?;

        let mut stats = HashMap::new();
        for &id in jockey_ids {
            let found = stmt
                .query_row([id], |row| {
                    Ok(JockeyStats {
                        win_rate: row.get(0)?,
                        place_rate: row.get(1)?,
                        show_rate: row.get(2)?,
                    })
                })
                .optional()?;
            if let Some(s) = found {
                stats.insert(id, s);
            }
        }
        Ok(stats)
    }

    pub fn jockey_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM jockeys ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Refresh the career rates of an existing jockey
    pub fn update_jockey_stats(&self, jockey_id: i64, stats: &JockeyStats) -> Result<bool> {
        let changed = self.conn.execute(
            r#"
            UPDATE jockeys
            SET win_rate = ?2, place_rate = ?3, show_rate = ?4,
                stats_updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![jockey_id, stats.win_rate, stats.place_rate, stats.show_rate],
        )?;
        Ok(changed > 0)
    }

    /// Highest race id stored for `year` (for resume capability)
    pub fn last_race_id(&self, year: u16) -> Result<Option<String>> {
        let id: Option<String> = self.conn.query_row(
            "SELECT MAX(id) FROM races WHERE substr(id, 1, 4) = ?1",
            [format!("{:04}", year)],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ==================== Counts ====================

    #[cfg(test)]
    pub fn count_races(&self) -> Result<i64> {
        self.count("races")
    }

    #[cfg(test)]
    pub fn count_horses(&self) -> Result<i64> {
        self.count("horses")
    }

    #[cfg(test)]
    pub fn count_jockeys(&self) -> Result<i64> {
        self.count("jockeys")
    }

    #[cfg(test)]
    pub fn count_results(&self) -> Result<i64> {
        self.count("results")
    }

    #[cfg(test)]
    fn count(&self, table: &'static str) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ==================== Connection-level helpers ====================

pub fn race_exists(conn: &Connection, race_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM races WHERE id = ?1)",
        [race_id],
        |row| row.get(0),
    )
}

pub fn results_exist(conn: &Connection, race_id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM results WHERE race_id = ?1)",
        [race_id],
        |row| row.get(0),
    )
}

pub fn horse_exists(conn: &Connection, horse_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM horses WHERE id = ?1)",
        [horse_id],
        |row| row.get(0),
    )
}

pub fn jockey_exists(conn: &Connection, jockey_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM jockeys WHERE id = ?1)",
        [jockey_id],
        |row| row.get(0),
    )
}

pub fn result_exists(conn: &Connection, race_id: &str, umaban: u32) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM results WHERE race_id = ?1 AND umaban = ?2)",
        params![race_id, umaban],
        |row| row.get(0),
    )
}

/// Exact-name match; the lowest id wins if the name is shared
pub fn find_horse_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM horses WHERE name = ?1 ORDER BY id LIMIT 1",
        [name],
        |row| row.get(0),
    )
    .optional()
}

pub fn find_jockey_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM jockeys WHERE name = ?1 ORDER BY id LIMIT 1",
        [name],
        |row| row.get(0),
    )
    .optional()
}

pub fn insert_race(conn: &Connection, race: &Race) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO races (id, name, venue, date) VALUES (?1, ?2, ?3, ?4)",
        params![
            race.id,
            race.name,
            race.venue.as_str(),
            race.date.format("%Y-%m-%d").to_string(),
        ],
    )?;
    Ok(())
}

pub fn insert_horse(conn: &Connection, horse: &Horse) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO horses (id, name) VALUES (?1, ?2)",
        params![horse.id, horse.name],
    )?;
    Ok(())
}

pub fn insert_jockey(conn: &Connection, jockey: &Jockey) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO jockeys (id, name, win_rate, place_rate, show_rate, stats_updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, CASE WHEN ?6 THEN datetime('now') END)
        "#,
        params![
            jockey.id,
            jockey.name,
            jockey.stats.win_rate,
            jockey.stats.place_rate,
            jockey.stats.show_rate,
            !jockey.stats.is_empty(),
        ],
    )?;
    Ok(())
}

pub fn insert_result(conn: &Connection, result: &ResultRecord) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO results
        (rank, waku, umaban, sex, age, jockey_weight, single_price, popular,
         horse_weight, race_id, horse_id, jockey_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            result.rank,
            result.waku,
            result.umaban,
            result.sex.code(),
            result.age,
            result.jockey_weight,
            result.single_price,
            result.popular,
            result.horse_weight,
            result.race_id,
            result.horse_id,
            result.jockey_id,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Sex;

    fn create_test_race() -> Race {
        Race {
            id: "202305050812".to_string(),
            name: "ジャパンカップ(G1)".to_string(),
            venue: Venue::Tokyo,
            date: NaiveDate::from_ymd_opt(2023, 11, 26).unwrap(),
        }
    }

    fn create_test_result(race_id: &str, umaban: u32) -> ResultRecord {
        ResultRecord {
            race_id: race_id.to_string(),
            horse_id: 2019105219,
            jockey_id: 5339,
            rank: umaban,
            waku: 1,
            umaban,
            sex: Sex::Male,
            age: 4,
            jockey_weight: 58.0,
            single_price: 1.3,
            popular: 1,
            horse_weight: 498,
        }
    }

    fn seed_entities(repo: &RaceRepository) {
        insert_race(repo.connection(), &create_test_race()).unwrap();
        insert_horse(
            repo.connection(),
            &Horse {
                id: 2019105219,
                name: "イクイノックス".to_string(),
            },
        )
        .unwrap();
        insert_jockey(
            repo.connection(),
            &Jockey {
                id: 5339,
                name: "ルメール".to_string(),
                stats: JockeyStats::default(),
            },
        )
        .unwrap();
    }

    #[test]
    fn test_insert_and_list_races() {
        let repo = RaceRepository::in_memory().unwrap();
        let race = create_test_race();
        insert_race(repo.connection(), &race).unwrap();

        assert!(race_exists(repo.connection(), &race.id).unwrap());
        let races = repo.list_races().unwrap();
        assert_eq!(races, vec![race.clone()]);
        assert_eq!(repo.get_race(&race.id).unwrap(), Some(race));
        assert_eq!(repo.last_race_id(2023).unwrap().as_deref(), Some("202305050812"));
    }

    #[test]
    fn test_last_race_id_per_year() {
        let repo = RaceRepository::in_memory().unwrap();
        insert_race(repo.connection(), &create_test_race()).unwrap();
        insert_race(
            repo.connection(),
            &Race {
                id: "202405050812".to_string(),
                name: "ジャパンカップ(G1)".to_string(),
                venue: Venue::Tokyo,
                date: NaiveDate::from_ymd_opt(2024, 11, 24).unwrap(),
            },
        )
        .unwrap();

        assert_eq!(repo.last_race_id(2023).unwrap().as_deref(), Some("202305050812"));
        assert_eq!(repo.last_race_id(2024).unwrap().as_deref(), Some("202405050812"));
        assert_eq!(repo.last_race_id(2022).unwrap(), None);
    }

    #[test]
    fn test_duplicate_race_rejected() {
        let repo = RaceRepository::in_memory().unwrap();
        let race = create_test_race();
        insert_race(repo.connection(), &race).unwrap();
        assert!(insert_race(repo.connection(), &race).is_err());
        assert_eq!(repo.count_races().unwrap(), 1);
    }

    #[test]
    fn test_insert_and_get_results() {
        let repo = RaceRepository::in_memory().unwrap();
        seed_entities(&repo);

        assert!(!repo.race_complete("202305050812").unwrap());
        insert_result(repo.connection(), &create_test_result("202305050812", 2)).unwrap();
        assert!(repo.race_complete("202305050812").unwrap());
        assert!(result_exists(repo.connection(), "202305050812", 2).unwrap());
        assert!(!result_exists(repo.connection(), "202305050812", 3).unwrap());

        let results = repo.get_race_results("202305050812").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].horse_weight, 498);
        assert_eq!(results[0].sex, Sex::Male);
    }

    #[test]
    fn test_result_slot_unique() {
        let repo = RaceRepository::in_memory().unwrap();
        seed_entities(&repo);

        insert_result(repo.connection(), &create_test_result("202305050812", 2)).unwrap();
        assert!(insert_result(repo.connection(), &create_test_result("202305050812", 2)).is_err());
        assert_eq!(repo.count_results().unwrap(), 1);
    }

    #[test]
    fn test_result_requires_horse() {
        let repo = RaceRepository::in_memory().unwrap();
        seed_entities(&repo);

        let mut result = create_test_result("202305050812", 2);
        result.horse_id = 1;
        assert!(insert_result(repo.connection(), &result).is_err());
    }

    #[test]
    fn test_find_by_name() {
        let repo = RaceRepository::in_memory().unwrap();
        seed_entities(&repo);

        let conn = repo.connection();
        assert_eq!(find_horse_by_name(conn, "イクイノックス").unwrap(), Some(2019105219));
        assert_eq!(find_horse_by_name(conn, "ドウデュース").unwrap(), None);
        assert_eq!(find_jockey_by_name(conn, "ルメール").unwrap(), Some(5339));
        assert!(horse_exists(conn, 2019105219).unwrap());
        assert!(!jockey_exists(conn, 1).unwrap());
    }

    #[test]
    fn test_jockey_stats_update_and_lookup() {
        let repo = RaceRepository::in_memory().unwrap();
        seed_entities(&repo);

        let before = repo.jockey_stats_for(&[5339, 1]).unwrap();
        assert_eq!(before.len(), 1);
        assert!(before[&5339].is_empty());

        let stats = JockeyStats {
            win_rate: Some(21.5),
            place_rate: Some(38.0),
            show_rate: Some(50.2),
        };
        assert!(repo.update_jockey_stats(5339, &stats).unwrap());
        assert!(!repo.update_jockey_stats(1, &stats).unwrap());

        let after = repo.jockey_stats_for(&[5339]).unwrap();
        assert_eq!(after[&5339], stats);
        assert_eq!(repo.get_jockey(5339).unwrap().unwrap().stats, stats);
        assert_eq!(repo.jockey_ids().unwrap(), vec![5339]);
    }

    #[test]
    fn test_file_backed_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keiba.db");
        {
            let repo = RaceRepository::new(&path).unwrap();
            insert_race(repo.connection(), &create_test_race()).unwrap();
        }
        let repo = RaceRepository::new(&path).unwrap();
        assert_eq!(repo.count_races().unwrap(), 1);
    }
}
