//! Entity resolution: map each finisher's horse and jockey to a natural id
//! and work out which entities are new to the store.
//!
//! Ids from page links are authoritative. A row without an id falls back to
//! an exact name match, first within the batch and then in the store.

use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;
use tracing::warn;

use crate::error::{RejectReason, RejectedRow};
use crate::scraper::normalize::NormalizedResult;
use crate::storage::repository::{
    find_horse_by_name, find_jockey_by_name, horse_exists, jockey_exists,
};
use crate::storage::{Horse, Jockey, JockeyStats, Race, ResultRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Horse,
    Jockey,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Horse => f.write_str("horse"),
            EntityKind::Jockey => f.write_str("jockey"),
        }
    }
}

/// Two distinct ids sharing one name. Both are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameConflict {
    pub kind: EntityKind,
    pub name: String,
    pub existing_id: i64,
    pub incoming_id: i64,
}

/// A race ready for the persistence coordinator
#[derive(Debug, Clone)]
pub struct ResolvedBatch {
    pub race: Race,
    pub new_horses: Vec<Horse>,
    pub new_jockeys: Vec<Jockey>,
    pub results: Vec<ResultRecord>,
    pub conflicts: Vec<NameConflict>,
    pub rejected: Vec<RejectedRow>,
}

/// Entities seen so far in the batch
#[derive(Default)]
struct BatchIndex {
    by_id: HashMap<i64, String>,
    by_name: HashMap<String, i64>,
    new: Vec<(i64, String)>,
}

impl BatchIndex {
    fn remember(&mut self, id: i64, name: &str) {
        self.by_id.entry(id).or_insert_with(|| name.to_string());
        if !name.is_empty() {
            self.by_name.entry(name.to_string()).or_insert(id);
        }
    }
}

pub struct EntityResolver<'a> {
    conn: &'a Connection,
    horses: BatchIndex,
    jockeys: BatchIndex,
    conflicts: Vec<NameConflict>,
}

impl<'a> EntityResolver<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            horses: BatchIndex::default(),
            jockeys: BatchIndex::default(),
            conflicts: Vec::new(),
        }
    }

    /// Resolve every accepted row of a race.
    ///
    /// Store errors abort the batch; unresolvable rows are rejected.
    pub fn resolve(
        mut self,
        race: Race,
        rows: Vec<NormalizedResult>,
        mut rejected: Vec<RejectedRow>,
    ) -> Result<ResolvedBatch> {
        let mut results = Vec::with_capacity(rows.len());

        for row in rows {
            let horse_id = self.resolve_one(EntityKind::Horse, row.horse_id, &row.horse_name)?;
            let jockey_id = self.resolve_one(EntityKind::Jockey, row.jockey_id, &row.jockey_name)?;

            let (Some(horse_id), Some(jockey_id)) = (horse_id, jockey_id) else {
                let token = if horse_id.is_none() {
                    row.horse_name.clone()
                } else {
                    row.jockey_name.clone()
                };
                rejected.push(RejectedRow {
                    umaban: row.umaban.to_string(),
                    token,
                    reason: RejectReason::Unresolved,
                });
                continue;
            };

            results.push(ResultRecord {
                race_id: race.id.clone(),
                horse_id,
                jockey_id,
                rank: row.rank,
                waku: row.waku,
                umaban: row.umaban,
                sex: row.sex,
                age: row.age,
                jockey_weight: row.jockey_weight,
                single_price: row.single_price,
                popular: row.popular,
                horse_weight: row.horse_weight,
            });
        }

        let new_horses = self
            .horses
            .new
            .into_iter()
            .map(|(id, name)| Horse { id, name })
            .collect();
        let new_jockeys = self
            .jockeys
            .new
            .into_iter()
            .map(|(id, name)| Jockey {
                id,
                name,
                stats: JockeyStats::default(),
            })
            .collect();

        Ok(ResolvedBatch {
            race,
            new_horses,
            new_jockeys,
            results,
            conflicts: self.conflicts,
            rejected,
        })
    }

    fn resolve_one(&mut self, kind: EntityKind, id: Option<i64>, name: &str) -> Result<Option<i64>> {
        let conn = self.conn;
        let index = match kind {
            EntityKind::Horse => &mut self.horses,
            EntityKind::Jockey => &mut self.jockeys,
        };

        let Some(id) = id else {
            if name.is_empty() {
                return Ok(None);
            }
            if let Some(&known) = index.by_name.get(name) {
                return Ok(Some(known));
            }
            let found = find_by_name(conn, kind, name)?;
            if let Some(found) = found {
                index.remember(found, name);
            }
            return Ok(found);
        };

        if index.by_id.contains_key(&id) {
            return Ok(Some(id));
        }

        if !exists(conn, kind, id)? {
            let holder = match index.by_name.get(name) {
                Some(&other) => Some(other),
                None if !name.is_empty() => find_by_name(conn, kind, name)?,
                None => None,
            };
            if let Some(existing_id) = holder.filter(|&other| other != id) {
                warn!(
                    "Name conflict: {} {:?} is id {} and id {}",
                    kind, name, existing_id, id
                );
                self.conflicts.push(NameConflict {
                    kind,
                    name: name.to_string(),
                    existing_id,
                    incoming_id: id,
                });
            }
            index.new.push((id, name.to_string()));
        }

        index.remember(id, name);
        Ok(Some(id))
    }
}

fn exists(conn: &Connection, kind: EntityKind, id: i64) -> rusqlite::Result<bool> {
    match kind {
        EntityKind::Horse => horse_exists(conn, id),
        EntityKind::Jockey => jockey_exists(conn, id),
    }
}

fn find_by_name(conn: &Connection, kind: EntityKind, name: &str) -> rusqlite::Result<Option<i64>> {
    match kind {
        EntityKind::Horse => find_horse_by_name(conn, name),
        EntityKind::Jockey => find_jockey_by_name(conn, name),
    }
}
