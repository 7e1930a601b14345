//! Import dispositions and the row color classifier.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::staged_part::StagedPart;

// ---------------------------------------------------------------------------
// Import status
// ---------------------------------------------------------------------------

/// The action the import takes for one staged part.
///
/// The `Review*` variants are conflict markers assigned by the server. The
/// operator cannot pick them, but they stay on the row until the server
/// resolves the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Create,
    Update,
    Summarize,
    NoImport,
    ReviewLabel,
    ReviewSequence,
    ReviewLabelSequence,
}

impl ImportStatus {
    /// Statuses offered by the normal disposition control.
    pub const OPERATOR_SELECTABLE: [ImportStatus; 4] =
        [Self::Create, Self::Update, Self::Summarize, Self::NoImport];

    /// Wire representation, matching the serde names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Summarize => "SUMMARIZE",
            Self::NoImport => "NO_IMPORT",
            Self::ReviewLabel => "REVIEW_LABEL",
            Self::ReviewSequence => "REVIEW_SEQUENCE",
            Self::ReviewLabelSequence => "REVIEW_LABEL_SEQUENCE",
        }
    }

    /// Parse a wire value.
    pub fn from_str_wire(s: &str) -> Result<Self, CoreError> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "SUMMARIZE" => Ok(Self::Summarize),
            "NO_IMPORT" => Ok(Self::NoImport),
            "REVIEW_LABEL" => Ok(Self::ReviewLabel),
            "REVIEW_SEQUENCE" => Ok(Self::ReviewSequence),
            "REVIEW_LABEL_SEQUENCE" => Ok(Self::ReviewLabelSequence),
            _ => Err(CoreError::Validation(format!(
                "Invalid import status '{s}'"
            ))),
        }
    }

    /// `true` for server-assigned conflict markers.
    pub fn is_review(&self) -> bool {
        matches!(
            self,
            Self::ReviewLabel | Self::ReviewSequence | Self::ReviewLabelSequence
        )
    }

    /// `true` if the normal disposition control offers this status.
    pub fn is_operator_selectable(&self) -> bool {
        Self::OPERATOR_SELECTABLE.contains(self)
    }

    /// `true` for `CREATE` and `UPDATE`.
    pub fn writes_records(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Color buckets
// ---------------------------------------------------------------------------

/// Presentation bucket of a staged row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBucket {
    /// Create/update of a piecemark that already exists downstream.
    Green,
    /// Create/update of a piecemark new to the destination system.
    Yellow,
    /// Not imported.
    Gray,
    /// Summarized or flagged for review.
    Blue,
}

/// Classify a row by its status and existing destination quantity.
pub fn color_bucket(row: &StagedPart) -> ColorBucket {
    match row.status {
        ImportStatus::NoImport => ColorBucket::Gray,
        status if status.writes_records() && row.sts_quantity == 0 => ColorBucket::Yellow,
        status if status.writes_records() && row.sts_quantity > 0 => ColorBucket::Green,
        _ => ColorBucket::Blue,
    }
}

/// Per-bucket row counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub green: usize,
    pub yellow: usize,
    pub gray: usize,
    pub blue: usize,
}

impl BucketCounts {
    /// Tally the buckets of `rows`.
    pub fn tally<'a>(rows: impl IntoIterator<Item = &'a StagedPart>) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match color_bucket(row) {
                ColorBucket::Green => counts.green += 1,
                ColorBucket::Yellow => counts.yellow += 1,
                ColorBucket::Gray => counts.gray += 1,
                ColorBucket::Blue => counts.blue += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.green + self.yellow + self.gray + self.blue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: ImportStatus, sts_quantity: i64) -> StagedPart {
        let mut row = StagedPart::new(1, 4);
        row.status = status;
        row.sts_quantity = sts_quantity;
        row
    }

    #[test]
    fn no_import_is_gray_regardless_of_quantity() {
        assert_eq!(color_bucket(&row(ImportStatus::NoImport, 0)), ColorBucket::Gray);
        assert_eq!(color_bucket(&row(ImportStatus::NoImport, 5)), ColorBucket::Gray);
    }

    #[test]
    fn new_piecemarks_are_yellow() {
        assert_eq!(color_bucket(&row(ImportStatus::Create, 0)), ColorBucket::Yellow);
        assert_eq!(color_bucket(&row(ImportStatus::Update, 0)), ColorBucket::Yellow);
    }

    #[test]
    fn existing_piecemarks_are_green() {
        assert_eq!(color_bucket(&row(ImportStatus::Create, 3)), ColorBucket::Green);
        assert_eq!(color_bucket(&row(ImportStatus::Update, 1)), ColorBucket::Green);
    }

    #[test]
    fn summarize_and_review_are_blue() {
        for status in [
            ImportStatus::Summarize,
            ImportStatus::ReviewLabel,
            ImportStatus::ReviewSequence,
            ImportStatus::ReviewLabelSequence,
        ] {
            assert_eq!(color_bucket(&row(status, 0)), ColorBucket::Blue);
            assert_eq!(color_bucket(&row(status, 9)), ColorBucket::Blue);
        }
    }

    #[test]
    fn review_statuses_are_not_selectable() {
        assert!(ImportStatus::ReviewLabel.is_review());
        assert!(!ImportStatus::ReviewLabel.is_operator_selectable());
        assert!(ImportStatus::Summarize.is_operator_selectable());
        assert!(!ImportStatus::NoImport.is_review());
    }

    #[test]
    fn wire_names_match_serde() {
        for status in [
            ImportStatus::Create,
            ImportStatus::Update,
            ImportStatus::Summarize,
            ImportStatus::NoImport,
            ImportStatus::ReviewLabel,
            ImportStatus::ReviewSequence,
            ImportStatus::ReviewLabelSequence,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(ImportStatus::from_str_wire(status.as_str()).unwrap(), status);
        }
        assert!(ImportStatus::from_str_wire("DELETE").is_err());
    }

    #[test]
    fn tally_counts_each_bucket() {
        let rows = vec![
            row(ImportStatus::Create, 0),
            row(ImportStatus::Create, 2),
            row(ImportStatus::NoImport, 0),
            row(ImportStatus::Summarize, 0),
            row(ImportStatus::ReviewSequence, 0),
        ];
        let counts = BucketCounts::tally(&rows);
        assert_eq!(
            counts,
            BucketCounts {
                green: 1,
                yellow: 1,
                gray: 1,
                blue: 2,
            }
        );
        assert_eq!(counts.total(), 5);
    }
}
