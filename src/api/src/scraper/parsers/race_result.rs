//! Race result parser for db.netkeiba.com
//!
//! Parses historical race result pages to extract race metadata and the raw
//! finishing table. URL: https://db.netkeiba.com/race/RACEID/
//!
//! Cells are returned as raw strings; turning them into typed values is the
//! job of [`crate::scraper::normalize`].

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use super::{horse_link, jockey_link, linked_entity, text_at};
use crate::error::ScrapeError;
use crate::storage::{Race, Venue};

/// Rows shorter than this are headers, footers or notes
pub const MIN_RESULT_COLUMNS: usize = 13;

static DATE: OnceLock<Regex> = OnceLock::new();

fn date_pattern() -> &'static Regex {
    DATE.get_or_init(|| Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日").unwrap())
}

/// One row of the result table, untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResultRow {
    pub rank: String,
    pub waku: String,
    pub umaban: String,
    pub horse_name: String,
    pub horse_id: Option<i64>,
    pub sex_age: String,
    pub jockey_weight: String,
    pub jockey_name: String,
    pub jockey_id: Option<i64>,
    pub single_price: String,
    pub popular: String,
    pub horse_weight: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRace {
    pub race: Race,
    pub rows: Vec<RawResultRow>,
}

/// Column positions within the result table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    rank: usize,
    waku: usize,
    umaban: usize,
    horse: usize,
    sex_age: usize,
    jockey_weight: usize,
    jockey: usize,
    single_price: usize,
    popular: usize,
    horse_weight: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            rank: 0,
            waku: 1,
            umaban: 2,
            horse: 3,
            sex_age: 4,
            jockey_weight: 5,
            jockey: 6,
            single_price: 12,
            popular: 13,
            horse_weight: 14,
        }
    }
}

impl ColumnMap {
    /// Locate columns by header label; unknown labels keep the standard index
    fn from_header(table: ElementRef<'_>) -> Self {
        let mut map = Self::default();

        let row_selector = Selector::parse("tr").unwrap();
        let th_selector = Selector::parse("th").unwrap();

        let Some(header) = table
            .select(&row_selector)
            .find(|row| row.select(&th_selector).next().is_some())
        else {
            return map;
        };

        for (idx, th) in header.select(&th_selector).enumerate() {
            let label: String = th.text().collect::<String>().split_whitespace().collect();
            let slot = match label.as_str() {
                "着順" => &mut map.rank,
                "枠番" => &mut map.waku,
                "馬番" => &mut map.umaban,
                "馬名" => &mut map.horse,
                "性齢" => &mut map.sex_age,
                "斤量" => &mut map.jockey_weight,
                "騎手" => &mut map.jockey,
                "単勝" => &mut map.single_price,
                "人気" => &mut map.popular,
                "馬体重" => &mut map.horse_weight,
                _ => continue,
            };
            *slot = idx;
        }

        map
    }
}

/// Parser for race result pages
pub struct RaceResultParser;

impl RaceResultParser {
    /// Parse a result page.
    ///
    /// No result table means there is no such race (`NotFound`); a table
    /// without a readable name and date is `ParseIncomplete`.
    pub fn parse(html: &str, race_id: &str) -> Result<ParsedRace, ScrapeError> {
        let document = Html::parse_document(html);

        let table_selector = Selector::parse("table.race_table_01").unwrap();
        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| ScrapeError::NotFound(format!("result table for race {}", race_id)))?;

        let race = Self::parse_race_info(&document, race_id)?;
        let rows = Self::parse_rows(table);

        Ok(ParsedRace { race, rows })
    }

    fn parse_race_info(document: &Html, race_id: &str) -> Result<Race, ScrapeError> {
        let title = Selector::parse("title")
            .ok()
            .and_then(|s| document.select(&s).next())
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default();

        let name = title
            .split_once(['|', '｜'])
            .map(|(name, _)| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ScrapeError::ParseIncomplete {
                race_id: race_id.to_string(),
                missing: "name",
            })?;

        let date = Self::extract_date(&title)
            .or_else(|| {
                let selector = Selector::parse(".smalltxt").ok()?;
                let intro: String = document
                    .select(&selector)
                    .map(|e| e.text().collect::<String>())
                    .collect();
                Self::extract_date(&intro)
            })
            .ok_or_else(|| ScrapeError::ParseIncomplete {
                race_id: race_id.to_string(),
                missing: "date",
            })?;

        Ok(Race {
            id: race_id.to_string(),
            name,
            venue: Venue::from_race_id(race_id),
            date,
        })
    }

    /// First `YYYY年M月D日` literal that is a real calendar date
    fn extract_date(text: &str) -> Option<NaiveDate> {
        let caps = date_pattern().captures(text)?;
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn parse_rows(table: ElementRef<'_>) -> Vec<RawResultRow> {
        let map = ColumnMap::from_header(table);

        let row_selector = Selector::parse("tr").unwrap();
        let cell_selector = Selector::parse("td").unwrap();

        table
            .select(&row_selector)
            .filter_map(|row| {
                let cells: Vec<_> = row.select(&cell_selector).collect();
                if cells.len() < MIN_RESULT_COLUMNS {
                    return None;
                }

                let (horse_id, horse_name) =
                    linked_entity(cells.get(map.horse).copied(), horse_link());
                let (jockey_id, jockey_name) =
                    linked_entity(cells.get(map.jockey).copied(), jockey_link());

                Some(RawResultRow {
                    rank: text_at(&cells, map.rank),
                    waku: text_at(&cells, map.waku),
                    umaban: text_at(&cells, map.umaban),
                    horse_name,
                    horse_id,
                    sex_age: text_at(&cells, map.sex_age),
                    jockey_weight: text_at(&cells, map.jockey_weight),
                    jockey_name,
                    jockey_id,
                    single_price: text_at(&cells, map.single_price),
                    popular: text_at(&cells, map.popular),
                    horse_weight: text_at(&cells, map.horse_weight),
                })
            })
            .collect()
    }
}
