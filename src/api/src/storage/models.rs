//! Row types for the four persisted relations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Racecourse, derived from chars 4..6 of a race id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Sapporo,
    Hakodate,
    Fukushima,
    Niigata,
    Tokyo,
    Nakayama,
    Chukyo,
    Kyoto,
    Hanshin,
    Kokura,
    Unknown,
}

impl Venue {
    pub const ALL: [Venue; 10] = [
        Venue::Sapporo,
        Venue::Hakodate,
        Venue::Fukushima,
        Venue::Niigata,
        Venue::Tokyo,
        Venue::Nakayama,
        Venue::Chukyo,
        Venue::Kyoto,
        Venue::Hanshin,
        Venue::Kokura,
    ];

    /// Look up the two-digit course code ("01".."10").
    pub fn from_code(code: &str) -> Self {
        match code {
            "01" => Venue::Sapporo,
            "02" => Venue::Hakodate,
            "03" => Venue::Fukushima,
            "04" => Venue::Niigata,
            "05" => Venue::Tokyo,
            "06" => Venue::Nakayama,
            "07" => Venue::Chukyo,
            "08" => Venue::Kyoto,
            "09" => Venue::Hanshin,
            "10" => Venue::Kokura,
            _ => Venue::Unknown,
        }
    }

    /// Venue of a 12-digit race id.
    pub fn from_race_id(race_id: &str) -> Self {
        race_id
            .get(4..6)
            .map(Self::from_code)
            .unwrap_or(Venue::Unknown)
    }

    /// Stored name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Venue::Sapporo => "札幌",
            Venue::Hakodate => "函館",
            Venue::Fukushima => "福島",
            Venue::Niigata => "新潟",
            Venue::Tokyo => "東京",
            Venue::Nakayama => "中山",
            Venue::Chukyo => "中京",
            Venue::Kyoto => "京都",
            Venue::Hanshin => "阪神",
            Venue::Kokura => "小倉",
            Venue::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == name)
            .unwrap_or(Venue::Unknown)
    }
}

/// Sex of a horse, encoded 0/1/2 in the store and in feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Gelding,
}

impl Sex {
    /// 牡 / 牝 / セ
    pub fn from_symbol(c: char) -> Option<Self> {
        match c {
            '牡' => Some(Sex::Male),
            '牝' => Some(Sex::Female),
            'セ' => Some(Sex::Gelding),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Sex::Male => 0,
            Sex::Female => 1,
            Sex::Gelding => 2,
        }
    }

    #[cfg(test)]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Sex::Male),
            1 => Some(Sex::Female),
            2 => Some(Sex::Gelding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Race {
    pub id: String,
    pub name: String,
    pub venue: Venue,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horse {
    pub id: i64,
    pub name: String,
}

/// Career aggregates, in percent (0-100). `None` means never fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JockeyStats {
    pub win_rate: Option<f64>,
    pub place_rate: Option<f64>,
    pub show_rate: Option<f64>,
}

impl JockeyStats {
    pub fn is_empty(&self) -> bool {
        self.win_rate.is_none() && self.place_rate.is_none() && self.show_rate.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Jockey {
    pub id: i64,
    pub name: String,
    pub stats: JockeyStats,
}

/// One finisher of one race. References its race, horse and jockey by id only.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub race_id: String,
    pub horse_id: i64,
    pub jockey_id: i64,
    pub rank: u32,
    pub waku: u32,
    pub umaban: u32,
    pub sex: Sex,
    pub age: u32,
    pub jockey_weight: f64,
    pub single_price: f64,
    pub popular: u32,
    pub horse_weight: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_from_race_id() {
        assert_eq!(Venue::from_race_id("202305050812"), Venue::Tokyo);
        assert_eq!(Venue::from_race_id("202306010101"), Venue::Nakayama);
        assert_eq!(Venue::from_race_id("202310010101"), Venue::Kokura);
        assert_eq!(Venue::from_race_id("202311010101"), Venue::Unknown);
        assert_eq!(Venue::from_race_id("2023"), Venue::Unknown);
    }

    #[test]
    fn test_venue_name_round_trip() {
        for venue in Venue::ALL {
            assert_eq!(Venue::from_name(venue.as_str()), venue);
        }
        assert_eq!(Venue::from_name("unknown"), Venue::Unknown);
    }

    #[test]
    fn test_sex_codes() {
        assert_eq!(Sex::from_symbol('牡').map(Sex::code), Some(0));
        assert_eq!(Sex::from_symbol('牝').map(Sex::code), Some(1));
        assert_eq!(Sex::from_symbol('セ').map(Sex::code), Some(2));
        assert_eq!(Sex::from_symbol('騸'), None);
        assert_eq!(Sex::from_code(2), Some(Sex::Gelding));
    }
}
