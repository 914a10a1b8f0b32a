//! Field normalization: raw cell strings into typed values.
//!
//! Result rows are all-or-nothing: a row missing its rank, slot or sex/age
//! is rejected with a reason. Race card rows have no rank yet and keep
//! unreadable fields as `None` for the feature assembler to drop.

use regex::Regex;
use std::sync::OnceLock;

use super::parsers::{RawEntrantRow, RawResultRow};
use crate::error::{RejectReason, RejectedRow};
use crate::storage::Sex;

static LEADING_INT: OnceLock<Regex> = OnceLock::new();
static HORSE_WEIGHT: OnceLock<Regex> = OnceLock::new();

fn leading_int() -> &'static Regex {
    LEADING_INT.get_or_init(|| Regex::new(r"^\s*(\d+)").unwrap())
}

fn horse_weight_pattern() -> &'static Regex {
    HORSE_WEIGHT.get_or_init(|| Regex::new(r"^\s*(\d{3})").unwrap())
}

/// Finishing position; `None` for 中止, 取消, 除外, 失格 and the like.
/// Annotated ranks such as `12(降)` keep their leading number.
pub fn parse_rank(text: &str) -> Option<u32> {
    let caps = leading_int().captures(text)?;
    caps[1].parse::<u32>().ok().filter(|rank| *rank > 0)
}

pub fn parse_float_or_zero(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn parse_int_or_zero(text: &str) -> u32 {
    text.trim().parse().unwrap_or(0)
}

/// `498(+4)` -> 498; `計不`, `--` and blanks -> 0
pub fn parse_horse_weight(text: &str) -> u32 {
    horse_weight_pattern()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

/// `牡4` -> (Male, 4)
pub fn parse_sex_age(text: &str) -> Option<(Sex, u32)> {
    let mut chars = text.trim().chars();
    let sex = Sex::from_symbol(chars.next()?)?;
    let age = chars.as_str().trim().parse().ok()?;
    Some((sex, age))
}

/// `35.2%` -> 35.2; `--`, `-` and blanks -> 0.0
pub fn parse_percent(text: &str) -> f64 {
    parse_float_or_zero(text.trim().trim_end_matches('%'))
}

fn parse_slot(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// A finisher with every field typed. Entity references are not yet
/// resolved against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
    pub rank: u32,
    pub waku: u32,
    pub umaban: u32,
    pub sex: Sex,
    pub age: u32,
    pub jockey_weight: f64,
    pub single_price: f64,
    pub popular: u32,
    pub horse_weight: u32,
    pub horse_id: Option<i64>,
    pub horse_name: String,
    pub jockey_id: Option<i64>,
    pub jockey_name: String,
}

pub fn normalize_result(row: &RawResultRow) -> Result<NormalizedResult, RejectedRow> {
    let reject = |token: &str, reason| RejectedRow {
        umaban: row.umaban.clone(),
        token: token.to_string(),
        reason,
    };

    let rank = parse_rank(&row.rank).ok_or_else(|| reject(&row.rank, RejectReason::NoRank))?;
    let waku = parse_slot(&row.waku).ok_or_else(|| reject(&row.waku, RejectReason::BadSlot))?;
    let umaban =
        parse_slot(&row.umaban).ok_or_else(|| reject(&row.umaban, RejectReason::BadSlot))?;
    let (sex, age) =
        parse_sex_age(&row.sex_age).ok_or_else(|| reject(&row.sex_age, RejectReason::BadSexAge))?;

    Ok(NormalizedResult {
        rank,
        waku,
        umaban,
        sex,
        age,
        jockey_weight: parse_float_or_zero(&row.jockey_weight),
        single_price: parse_float_or_zero(&row.single_price),
        popular: parse_int_or_zero(&row.popular),
        horse_weight: parse_horse_weight(&row.horse_weight),
        horse_id: row.horse_id,
        horse_name: row.horse_name.clone(),
        jockey_id: row.jockey_id,
        jockey_name: row.jockey_name.clone(),
    })
}

/// Lazily normalize a parsed result table, one outcome per row.
pub fn normalize_results(
    rows: &[RawResultRow],
) -> impl Iterator<Item = Result<NormalizedResult, RejectedRow>> + '_ {
    rows.iter().map(normalize_result)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub accepted: Vec<NormalizedResult>,
    pub rejected: Vec<RejectedRow>,
}

pub fn partition_rows<I>(outcomes: I) -> NormalizedBatch
where
    I: IntoIterator<Item = Result<NormalizedResult, RejectedRow>>,
{
    let mut batch = NormalizedBatch::default();
    for outcome in outcomes {
        match outcome {
            Ok(row) => batch.accepted.push(row),
            Err(rejected) => batch.rejected.push(rejected),
        }
    }
    batch
}

/// An entrant of an upcoming race
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntrantRow {
    pub waku: Option<u32>,
    pub umaban: Option<u32>,
    pub jockey_weight: Option<f64>,
    pub horse_weight: u32,
    pub sex: Option<Sex>,
    pub age: Option<u32>,
    pub jockey_id: Option<i64>,
}

pub fn normalize_entrant(row: &RawEntrantRow) -> EntrantRow {
    let sex_age = parse_sex_age(&row.sex_age);
    EntrantRow {
        waku: parse_slot(&row.waku),
        umaban: parse_slot(&row.umaban),
        jockey_weight: row
            .jockey_weight
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite()),
        horse_weight: parse_horse_weight(&row.horse_weight),
        sex: sex_age.map(|(sex, _)| sex),
        age: sex_age.map(|(_, age)| age),
        jockey_id: row.jockey_id,
    }
}
