//! Jockey profile parser for netkeiba.com.
//!
//! Reads career win/place/show rates from the `累計` (career total) row of
//! the yearly results table. URL: https://db.netkeiba.com/jockey/ID/

use scraper::{Html, Selector};

use super::cell_text;
use crate::scraper::normalize::parse_percent;
use crate::storage::JockeyStats;

const CAREER_MARKER: &str = "累計";

/// Cell offsets (th and td counted together) of the three rates
const WIN_RATE: usize = 16;
const PLACE_RATE: usize = 17;
const SHOW_RATE: usize = 18;

/// Parser for jockey profile pages
pub struct JockeyStatsParser;

impl JockeyStatsParser {
    /// Parse career stats; a page without the career row yields empty stats.
    pub fn parse(html: &str) -> JockeyStats {
        let document = Html::parse_document(html);

        let row_selector = Selector::parse("tr").unwrap();
        let cell_selector = Selector::parse("th, td").unwrap();

        // Layout rows wrapping the stats table also contain the marker
        let Some(row) = document.select(&row_selector).find(|row| {
            !row.select(&row_selector).any(|inner| inner.id() != row.id())
                && row.text().any(|t| t.contains(CAREER_MARKER))
        }) else {
            return JockeyStats::default();
        };

        let cells: Vec<String> = row.select(&cell_selector).map(cell_text).collect();
        let rate = |idx: usize| Some(cells.get(idx).map(|c| parse_percent(c)).unwrap_or(0.0));

        JockeyStats {
            win_rate: rate(WIN_RATE),
            place_rate: rate(PLACE_RATE),
            show_rate: rate(SHOW_RATE),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::SAMPLE_PROFILE;
    use super::*;

    #[test]
    fn test_parse_career_row() {
        let stats = JockeyStatsParser::parse(SAMPLE_PROFILE);
        assert_eq!(stats.win_rate, Some(26.2));
        assert_eq!(stats.place_rate, Some(43.4));
        assert_eq!(stats.show_rate, Some(56.1));
    }

    #[test]
    fn test_career_row_inside_layout_table() {
        let start = SAMPLE_PROFILE.find("<table").unwrap();
        let end = SAMPLE_PROFILE.rfind("</table>").unwrap() + "</table>".len();
        let html = format!(
            r#"<html><body><table id="layout"><tr><td class="side">メニュー</td><td>{}</td></tr></table></body></html>"#,
            &SAMPLE_PROFILE[start..end]
        );
        let stats = JockeyStatsParser::parse(&html);
        assert_eq!(stats.win_rate, Some(26.2));
        assert_eq!(stats.place_rate, Some(43.4));
        assert_eq!(stats.show_rate, Some(56.1));
    }

    #[test]
    fn test_no_career_row() {
        let html = "<html><body><table><tr><td>2023</td><td>1</td></tr></table></body></html>";
        let stats = JockeyStatsParser::parse(html);
        assert!(stats.is_empty());
    }

    #[test]
    fn test_placeholder_and_short_row() {
        let html = r#"<table><tr><th>累計</th><td>0</td><td>0</td><td>0</td><td>0</td>
            <td>0</td><td>0</td><td>0</td><td>0</td><td>0</td><td>0</td><td>0</td>
            <td>0</td><td>0</td><td>0</td><td>0</td><td>--</td><td>-</td></tr></table>"#;
        let stats = JockeyStatsParser::parse(html);
        assert_eq!(stats.win_rate, Some(0.0));
        assert_eq!(stats.place_rate, Some(0.0));
        assert_eq!(stats.show_rate, Some(0.0));
    }
}
