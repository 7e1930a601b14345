//! Import filter fields and their normalization.
//!
//! The operator types filters as free text. Lot numbers, piece marks and
//! sequences are comma separated; sheet numbers may be separated by commas,
//! whitespace, or both.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SHEET_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s,]+").expect("valid regex"));

/// One of the four free-text filters on the import form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterField {
    LotNumbers,
    PieceMarks,
    Sequences,
    SheetNumbers,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [
        Self::LotNumbers,
        Self::PieceMarks,
        Self::Sequences,
        Self::SheetNumbers,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LotNumbers => "LotNumbers",
            Self::PieceMarks => "PieceMarks",
            Self::Sequences => "Sequences",
            Self::SheetNumbers => "SheetNumbers",
        }
    }

    /// Parse a field name as the server reports it. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LotNumbers" => Some(Self::LotNumbers),
            "PieceMarks" => Some(Self::PieceMarks),
            "Sequences" => Some(Self::Sequences),
            "SheetNumbers" => Some(Self::SheetNumbers),
            _ => None,
        }
    }
}

impl std::fmt::Display for FilterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized filter lists sent with a commit request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterLists {
    #[serde(rename = "LotNumbers")]
    pub lot_numbers: Vec<String>,
    #[serde(rename = "PieceMarks")]
    pub piece_marks: Vec<String>,
    #[serde(rename = "Sequences")]
    pub sequences: Vec<String>,
    #[serde(rename = "SheetNumbers")]
    pub sheet_numbers: Vec<String>,
}

impl FilterLists {
    pub fn is_empty(&self) -> bool {
        self.lot_numbers.is_empty()
            && self.piece_marks.is_empty()
            && self.sequences.is_empty()
            && self.sheet_numbers.is_empty()
    }
}

/// Split a comma separated filter, trimming entries and dropping blanks.
pub fn normalize_comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a sheet-number filter on any run of commas and whitespace.
pub fn normalize_sheet_list(raw: &str) -> Vec<String> {
    SHEET_SEPARATOR_RE
        .split(raw.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_list_trims_and_drops_blanks() {
        assert_eq!(
            normalize_comma_list(" 1, 2 ,,3 , "),
            vec!["1".to_string(), "2".to_string(), "3".to_string()]
        );
    }

    #[test]
    fn comma_list_keeps_inner_spaces() {
        assert_eq!(normalize_comma_list("LOT A, LOT B"), vec!["LOT A", "LOT B"]);
    }

    #[test]
    fn every_field_parses_from_its_name() {
        for field in FilterField::ALL {
            assert_eq!(FilterField::from_name(field.as_str()), Some(field));
        }
    }

    #[test]
    fn empty_input_gives_empty_list() {
        assert!(normalize_comma_list("").is_empty());
        assert!(normalize_comma_list(" , ,").is_empty());
        assert!(normalize_sheet_list("   ").is_empty());
    }

    #[test]
    fn sheet_list_splits_on_whitespace_and_commas() {
        assert_eq!(
            normalize_sheet_list("E1 E2,E3 ,\tE4\nE5"),
            vec!["E1", "E2", "E3", "E4", "E5"]
        );
    }

    #[test]
    fn field_names_round_trip() {
        for field in [
            FilterField::LotNumbers,
            FilterField::PieceMarks,
            FilterField::Sequences,
            FilterField::SheetNumbers,
        ] {
            assert_eq!(FilterField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(FilterField::from_name("Colour"), None);
    }
}
