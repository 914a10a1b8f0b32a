//! Error taxonomy for the ingestion pipeline.

use thiserror::Error;

/// Failure of a single crawl step (one document, one race, one batch).
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Resource or required content absent. Permanent, never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Required race metadata only partially present. Handled like `NotFound`.
    #[error("Incomplete race metadata for {race_id}: missing {missing}")]
    ParseIncomplete { race_id: String, missing: &'static str },

    /// Network or IO failure. Retry policy belongs to the caller.
    #[error("Transient fetch failure for {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// Duplicate key or missing foreign key at persistence time.
    #[error("Constraint violation in race {race_id}: {message}")]
    ConstraintViolation { race_id: String, message: String },

    /// A single row failed normalization.
    #[error("Data quality: {0}")]
    DataQuality(String),
}

impl ScrapeError {
    pub fn transient(url: impl Into<String>, message: impl ToString) -> Self {
        Self::TransientFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn constraint(race_id: impl Into<String>, message: impl ToString) -> Self {
        Self::ConstraintViolation {
            race_id: race_id.into(),
            message: message.to_string(),
        }
    }

    /// Worth retrying by a caller that wants to.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch { .. })
    }

    /// The record simply does not exist in usable form; skip without noise.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ParseIncomplete { .. })
    }
}

/// Why a row was dropped during normalization or resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Rank cell is not a positive integer (scratched, stopped, disqualified).
    NoRank,
    /// Frame or horse number missing.
    BadSlot,
    /// Sex/age cell unreadable.
    BadSexAge,
    /// Neither an id nor a known name for the horse or jockey.
    Unresolved,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            RejectReason::NoRank => "rank is not a positive integer",
            RejectReason::BadSlot => "waku/umaban missing",
            RejectReason::BadSexAge => "sex/age unreadable",
            RejectReason::Unresolved => "horse or jockey could not be resolved",
        };
        f.write_str(text)
    }
}

/// A row that did not make it into the batch, kept for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// Raw horse-number cell, useful for locating the row on the page.
    pub umaban: String,
    /// Raw cell that caused the rejection.
    pub token: String,
    pub reason: RejectReason,
}

impl From<RejectedRow> for ScrapeError {
    fn from(row: RejectedRow) -> Self {
        ScrapeError::DataQuality(format!(
            "row umaban={} token={:?}: {}",
            row.umaban, row.token, row.reason
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ScrapeError::NotFound("x".into()).is_skippable());
        assert!(ScrapeError::ParseIncomplete {
            race_id: "202305050812".into(),
            missing: "date",
        }
        .is_skippable());
        assert!(ScrapeError::transient("http://x", "timeout").is_transient());
        assert!(!ScrapeError::constraint("r", "fk").is_transient());
        assert!(!ScrapeError::constraint("r", "fk").is_skippable());
    }

    #[test]
    fn test_rejected_row_into_data_quality() {
        let err: ScrapeError = RejectedRow {
            umaban: "7".into(),
            token: "中止".into(),
            reason: RejectReason::NoRank,
        }
        .into();
        assert!(matches!(err, ScrapeError::DataQuality(_)));
        assert!(err.to_string().contains("umaban=7"));
    }
}
