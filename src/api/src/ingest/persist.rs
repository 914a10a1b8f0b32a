//! Two-phase persistence of a resolved race.
//!
//! Phase 1 commits the race and any new horses and jockeys. Phase 2 commits
//! the result rows, which reference all three. A phase 2 failure rolls back
//! phase 2 only; the entities from phase 1 stay.

use rusqlite::Connection;
use tracing::{debug, error};

use super::resolver::ResolvedBatch;
use crate::error::ScrapeError;
use crate::storage::repository::{
    horse_exists, insert_horse, insert_jockey, insert_race, insert_result, jockey_exists,
    race_exists, result_exists,
};
use crate::storage::{RaceRepository, ResultRecord};

/// Rows written by one `persist` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub races: usize,
    pub horses: usize,
    pub jockeys: usize,
    pub results: usize,
    /// Result rows already present for their (race_id, umaban)
    pub skipped: usize,
}

pub struct PersistenceCoordinator<'a> {
    repo: &'a mut RaceRepository,
}

impl<'a> PersistenceCoordinator<'a> {
    pub fn new(repo: &'a mut RaceRepository) -> Self {
        Self { repo }
    }

    pub fn persist(&mut self, batch: &ResolvedBatch) -> Result<PersistReport, ScrapeError> {
        let race_id = batch.race.id.as_str();

        let mut report = self.commit_entities(batch).map_err(|e| {
            error!("Entity phase rolled back for race {}: {}", race_id, e);
            ScrapeError::constraint(race_id, e)
        })?;

        let (results, skipped) = self.commit_results(race_id, &batch.results).map_err(|e| {
            error!("Result phase rolled back for race {}: {}", race_id, e);
            e
        })?;

        report.results = results;
        report.skipped = skipped;
        Ok(report)
    }

    fn commit_entities(&mut self, batch: &ResolvedBatch) -> rusqlite::Result<PersistReport> {
        let tx = self.repo.transaction()?;
        let mut report = PersistReport::default();

        if !race_exists(&tx, &batch.race.id)? {
            insert_race(&tx, &batch.race)?;
            report.races += 1;
        }
        for horse in &batch.new_horses {
            if !horse_exists(&tx, horse.id)? {
                insert_horse(&tx, horse)?;
                report.horses += 1;
            }
        }
        for jockey in &batch.new_jockeys {
            if !jockey_exists(&tx, jockey.id)? {
                insert_jockey(&tx, jockey)?;
                report.jockeys += 1;
            }
        }

        tx.commit()?;
        Ok(report)
    }

    fn commit_results(
        &mut self,
        race_id: &str,
        results: &[ResultRecord],
    ) -> Result<(usize, usize), ScrapeError> {
        let sql_error = |e: rusqlite::Error| ScrapeError::constraint(race_id, e);

        let tx = self.repo.transaction().map_err(sql_error)?;
        let mut inserted = 0;
        let mut skipped = 0;

        for result in results {
            check_references(&tx, result)?;

            if result_exists(&tx, &result.race_id, result.umaban).map_err(sql_error)? {
                debug!(
                    "Result {}#{} already stored, skipping",
                    result.race_id, result.umaban
                );
                skipped += 1;
                continue;
            }

            insert_result(&tx, result).map_err(sql_error)?;
            inserted += 1;
        }

        tx.commit().map_err(sql_error)?;
        Ok((inserted, skipped))
    }
}

/// Race, horse and jockey of a result must already be stored
fn check_references(conn: &Connection, result: &ResultRecord) -> Result<(), ScrapeError> {
    let race_id = result.race_id.as_str();
    let sql_error = |e: rusqlite::Error| ScrapeError::constraint(race_id, e);

    if !race_exists(conn, race_id).map_err(sql_error)? {
        return Err(ScrapeError::constraint(race_id, "race not stored"));
    }
    if !horse_exists(conn, result.horse_id).map_err(sql_error)? {
        return Err(ScrapeError::constraint(
            race_id,
            format!("horse {} not stored", result.horse_id),
        ));
    }
    if !jockey_exists(conn, result.jockey_id).map_err(sql_error)? {
        return Err(ScrapeError::constraint(
            race_id,
            format!("jockey {} not stored", result.jockey_id),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Horse, Jockey, JockeyStats, Race, Sex, Venue};
    use chrono::NaiveDate;

    fn result(umaban: u32, horse_id: i64) -> ResultRecord {
        ResultRecord {
            race_id: "202305050812".to_string(),
            horse_id,
            jockey_id: 5339,
            rank: umaban,
            waku: 1,
            umaban,
            sex: Sex::Male,
            age: 4,
            jockey_weight: 58.0,
            single_price: 1.3,
            popular: umaban,
            horse_weight: 496,
        }
    }

    fn batch() -> ResolvedBatch {
        ResolvedBatch {
            race: Race {
                id: "202305050812".to_string(),
                name: "ジャパンカップ(G1)".to_string(),
                venue: Venue::Tokyo,
                date: NaiveDate::from_ymd_opt(2023, 11, 26).unwrap(),
            },
            new_horses: vec![
                Horse {
                    id: 100,
                    name: "ホースA".to_string(),
                },
                Horse {
                    id: 200,
                    name: "ホースB".to_string(),
                },
            ],
            new_jockeys: vec![Jockey {
                id: 5339,
                name: "ルメール".to_string(),
                stats: JockeyStats {
                    win_rate: Some(26.2),
                    place_rate: Some(43.4),
                    show_rate: Some(56.1),
                },
            }],
            results: vec![result(1, 100), result(2, 200)],
            conflicts: Vec::new(),
            rejected: Vec::new(),
        }
    }

    #[test]
    fn test_persist_batch() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let report = PersistenceCoordinator::new(&mut repo)
            .persist(&batch())
            .unwrap();

        assert_eq!(
            report,
            PersistReport {
                races: 1,
                horses: 2,
                jockeys: 1,
                results: 2,
                skipped: 0,
            }
        );
        assert_eq!(repo.count_results().unwrap(), 2);
        assert_eq!(repo.get_jockey(5339).unwrap().unwrap().stats.win_rate, Some(26.2));
    }

    #[test]
    fn test_persist_is_idempotent() {
        let mut repo = RaceRepository::in_memory().unwrap();
        PersistenceCoordinator::new(&mut repo)
            .persist(&batch())
            .unwrap();
        let second = PersistenceCoordinator::new(&mut repo)
            .persist(&batch())
            .unwrap();

        assert_eq!(
            second,
            PersistReport {
                skipped: 2,
                ..Default::default()
            }
        );
        assert_eq!(repo.count_races().unwrap(), 1);
        assert_eq!(repo.count_horses().unwrap(), 2);
        assert_eq!(repo.count_results().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_slot_in_batch_skipped() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let mut b = batch();
        b.results.push(result(2, 100));

        let report = PersistenceCoordinator::new(&mut repo).persist(&b).unwrap();
        assert_eq!(report.results, 2);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_missing_reference_rolls_back_results_only() {
        let mut repo = RaceRepository::in_memory().unwrap();
        let mut b = batch();
        b.results.push(result(3, 999));

        let err = PersistenceCoordinator::new(&mut repo)
            .persist(&b)
            .unwrap_err();

        assert!(matches!(err, ScrapeError::ConstraintViolation { .. }));
        assert!(err.to_string().contains("horse 999"));
        assert_eq!(repo.count_results().unwrap(), 0);
        assert_eq!(repo.count_races().unwrap(), 1);
        assert_eq!(repo.count_horses().unwrap(), 2);
    }
}
