//! HTML parsers for netkeiba.com pages.

pub mod jockey;
pub mod race_card;
pub mod race_result;

pub use jockey::JockeyStatsParser;
pub use race_card::{RaceCardParser, RawEntrantRow};
pub use race_result::{RaceResultParser, RawResultRow};

use regex::Regex;
use scraper::{ElementRef, Selector};
use std::sync::OnceLock;

static HORSE_LINK: OnceLock<Regex> = OnceLock::new();
static JOCKEY_LINK: OnceLock<Regex> = OnceLock::new();
static ANCHOR: OnceLock<Selector> = OnceLock::new();

fn horse_link() -> &'static Regex {
    HORSE_LINK.get_or_init(|| Regex::new(r"/horse/(\d+)").unwrap())
}

/// Matches `/jockey/05339/`, `/jockey/result/05339/` and `/jockey/result/recent/05339/`
fn jockey_link() -> &'static Regex {
    JOCKEY_LINK.get_or_init(|| Regex::new(r"/jockey/(?:result/(?:recent/)?)?(\d+)").unwrap())
}

fn anchor() -> &'static Selector {
    ANCHOR.get_or_init(|| Selector::parse("a").unwrap())
}

/// Whitespace-trimmed text of a cell
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// Trimmed text of the cell at `idx`, or empty when the row is short
fn text_at(cells: &[ElementRef<'_>], idx: usize) -> String {
    cells.get(idx).map(|c| cell_text(*c)).unwrap_or_default()
}

/// First anchor under `elem` whose href matches `pattern`, with its numeric id
fn find_link<'a>(elem: ElementRef<'a>, pattern: &Regex) -> Option<(ElementRef<'a>, i64)> {
    elem.select(anchor()).find_map(|a| {
        let href = a.value().attr("href")?;
        let caps = pattern.captures(href)?;
        let id = caps[1].parse::<i64>().ok()?;
        Some((a, id))
    })
}

/// Id and display name of an entity linked from a cell.
///
/// Without a usable link the id is `None` and the name is the cell text.
fn linked_entity(cell: Option<ElementRef<'_>>, pattern: &Regex) -> (Option<i64>, String) {
    let Some(cell) = cell else {
        return (None, String::new());
    };
    match find_link(cell, pattern) {
        Some((a, id)) => {
            let name = cell_text(a);
            let name = if name.is_empty() { cell_text(cell) } else { name };
            (Some(id), name)
        }
        None => (None, cell_text(cell)),
    }
}
