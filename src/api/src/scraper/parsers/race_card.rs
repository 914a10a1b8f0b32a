//! Race card (shutuba) parser for netkeiba.com.
//!
//! URL: https://race.netkeiba.com/race/shutuba.html?race_id=RACEID
//! Only the columns the feature vector needs are extracted.

use scraper::{Html, Selector};

use super::{horse_link, jockey_link, linked_entity, text_at};
use crate::error::ScrapeError;

/// Entry rows on the card carry more cells than this
pub const MIN_CARD_COLUMNS: usize = 14;

const WAKU: usize = 0;
const UMABAN: usize = 1;
const HORSE: usize = 3;
const SEX_AGE: usize = 4;
const JOCKEY_WEIGHT: usize = 5;
const JOCKEY: usize = 6;
const HORSE_WEIGHT: usize = 8;

/// One entrant of an upcoming race, as raw cell strings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntrantRow {
    pub waku: String,
    pub umaban: String,
    pub horse_name: String,
    pub horse_id: Option<i64>,
    pub sex_age: String,
    pub jockey_weight: String,
    pub jockey_name: String,
    pub jockey_id: Option<i64>,
    pub horse_weight: String,
}

/// Parser for race card pages
pub struct RaceCardParser;

impl RaceCardParser {
    /// Parse race card entries from HTML.
    ///
    /// A page without an entry table is treated as an unknown race.
    pub fn parse(html: &str, race_id: &str) -> Result<Vec<RawEntrantRow>, ScrapeError> {
        let document = Html::parse_document(html);

        let table_selector = Selector::parse("table.Shutuba_Table, table.RaceTable01").unwrap();
        let table = document
            .select(&table_selector)
            .next()
            .ok_or_else(|| ScrapeError::NotFound(format!("race card for race {}", race_id)))?;

        let row_selector = Selector::parse("tr.HorseList").unwrap();
        let cell_selector = Selector::parse("td").unwrap();

        let entries = table
            .select(&row_selector)
            .filter_map(|row| {
                let cells: Vec<_> = row.select(&cell_selector).collect();
                if cells.len() < MIN_CARD_COLUMNS {
                    return None;
                }

                let (horse_id, horse_name) = linked_entity(cells.get(HORSE).copied(), horse_link());
                let (jockey_id, jockey_name) =
                    linked_entity(cells.get(JOCKEY).copied(), jockey_link());

                Some(RawEntrantRow {
                    waku: text_at(&cells, WAKU),
                    umaban: text_at(&cells, UMABAN),
                    horse_name,
                    horse_id,
                    sex_age: text_at(&cells, SEX_AGE),
                    jockey_weight: text_at(&cells, JOCKEY_WEIGHT),
                    jockey_name,
                    jockey_id,
                    horse_weight: text_at(&cells, HORSE_WEIGHT),
                })
            })
            .collect();

        Ok(entries)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const SAMPLE_CARD: &str = r#"
<html><head><title>東京優駿(G1) 出馬表 | 2024年5月26日 東京11R - netkeiba</title></head>
<body>
<table class="Shutuba_Table RaceTable01 ShutubaTable">
<thead><tr class="Header"><th>枠</th><th>馬番</th><th>印</th><th>馬名</th><th>性齢</th><th>斤量</th><th>騎手</th></tr></thead>
<tbody>
<tr class="HorseList" id="tr_1">
<td class="Waku1 Txt_C"><span>1</span></td>
<td class="Umaban1 Txt_C">1</td>
<td class="CheckMark"></td>
<td class="HorseInfo"><span class="HorseName"><a href="https://db.netkeiba.com/horse/2021105898" title="ダノンデサイル">ダノンデサイル</a></span></td>
<td class="Barei Txt_C">牡3</td>
<td class="Txt_C">57.0</td>
<td class="Jockey"><a href="https://db.netkeiba.com/jockey/result/recent/01075/" title="横山典">横山典</a></td>
<td class="Trainer"><a href="https://db.netkeiba.com/trainer/result/recent/01157/">安田翔</a></td>
<td class="Weight">496(+2)</td>
<td class="Txt_R Popular"><span>46.6</span></td>
<td class="Popular_Ninki Txt_C"><span>9</span></td>
<td></td><td></td><td></td>
</tr>
<tr class="HorseList" id="tr_2">
<td class="Waku1 Txt_C"><span>1</span></td>
<td class="Umaban2 Txt_C">2</td>
<td class="CheckMark"></td>
<td class="HorseInfo"><span class="HorseName"><a href="https://db.netkeiba.com/horse/2021105727" title="コスモキュランダ">コスモキュランダ</a></span></td>
<td class="Barei Txt_C">牝3</td>
<td class="Txt_C">55.0</td>
<td class="Jockey"><a href="https://db.netkeiba.com/jockey/result/recent/05339/" title="ルメール">ルメール</a></td>
<td class="Trainer"><a href="https://db.netkeiba.com/trainer/result/recent/01099/">加藤士</a></td>
<td class="Weight"></td>
<td class="Txt_R Popular"><span>7.1</span></td>
<td class="Popular_Ninki Txt_C"><span>3</span></td>
<td></td><td></td><td></td>
</tr>
<tr class="HorseList Cancel" id="tr_3">
<td class="Waku2 Txt_C"><span>2</span></td>
<td class="Umaban3 Txt_C">3</td>
<td class="CheckMark"></td>
<td class="HorseInfo"><span class="HorseName"><a href="https://db.netkeiba.com/horse/2021100001">トリケシ</a></span></td>
<td class="Barei Txt_C">取消</td>
<td class="Txt_C">57.0</td>
<td class="Jockey">未定</td>
<td class="Trainer"></td>
<td class="Weight"></td>
<td></td><td></td><td></td><td></td><td></td>
</tr>
</tbody>
</table>
</body></html>
"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::SAMPLE_CARD;
    use super::*;

    #[test]
    fn test_parse_race_card() {
        let entries = RaceCardParser::parse(SAMPLE_CARD, "202405021011").unwrap();
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.waku, "1");
        assert_eq!(first.umaban, "1");
        assert_eq!(first.horse_name, "ダノンデサイル");
        assert_eq!(first.horse_id, Some(2021105898));
        assert_eq!(first.sex_age, "牡3");
        assert_eq!(first.jockey_weight, "57.0");
        assert_eq!(first.jockey_id, Some(1075));
        assert_eq!(first.horse_weight, "496(+2)");

        assert_eq!(entries[1].jockey_id, Some(5339));
        assert_eq!(entries[1].horse_weight, "");

        assert_eq!(entries[2].jockey_id, None);
        assert_eq!(entries[2].jockey_name, "未定");
    }

    #[test]
    fn test_missing_card_table() {
        let err = RaceCardParser::parse("<html><body></body></html>", "202405021011").unwrap_err();
        assert!(matches!(err, ScrapeError::NotFound(_)));
    }
}
