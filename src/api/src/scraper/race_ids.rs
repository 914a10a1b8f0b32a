//! Candidate race id enumeration.
//!
//! A race id is `YYYY` + venue(2) + meeting(2) + day(2) + race(2). Not every
//! id in the space names a real race; the fetcher and parser sort that out.

use std::ops::RangeInclusive;

/// Inclusive bounds for each two-digit field of a race id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBounds {
    pub venues: RangeInclusive<u8>,
    pub meetings: RangeInclusive<u8>,
    pub days: RangeInclusive<u8>,
    pub races: RangeInclusive<u8>,
}

impl Default for IdBounds {
    fn default() -> Self {
        Self {
            venues: 1..=10,
            meetings: 1..=6,
            days: 1..=12,
            races: 1..=12,
        }
    }
}

/// The finite id space of one year. Stateless; `iter` can be called any
/// number of times and always starts from the first id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceIdSpace {
    year: u16,
    bounds: IdBounds,
}

impl RaceIdSpace {
    #[cfg(test)]
    pub fn for_year(year: u16) -> Self {
        Self::with_bounds(year, IdBounds::default())
    }

    pub fn with_bounds(year: u16, bounds: IdBounds) -> Self {
        Self { year, bounds }
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    /// Lazily yield ids ordered venue, meeting, day, race.
    pub fn iter(&self) -> impl Iterator<Item = String> {
        let year = self.year;
        let bounds = self.bounds.clone();

        bounds.venues.clone().flat_map(move |venue| {
            let bounds = bounds.clone();
            bounds.meetings.clone().flat_map(move |meeting| {
                let bounds = bounds.clone();
                bounds.days.clone().flat_map(move |day| {
                    bounds
                        .races
                        .clone()
                        .map(move |race| format_race_id(year, venue, meeting, day, race))
                })
            })
        })
    }

    /// Ids strictly after `last_id`, for resuming an interrupted crawl.
    pub fn resume_after(&self, last_id: &str) -> impl Iterator<Item = String> {
        let last_id = last_id.to_string();
        self.iter().filter(move |id| *id > last_id)
    }

    pub fn len(&self) -> usize {
        let width = |r: &RangeInclusive<u8>| r.clone().count();
        width(&self.bounds.venues)
            * width(&self.bounds.meetings)
            * width(&self.bounds.days)
            * width(&self.bounds.races)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn format_race_id(year: u16, venue: u8, meeting: u8, day: u8, race: u8) -> String {
    format!("{:04}{:02}{:02}{:02}{:02}", year, venue, meeting, day, race)
}
