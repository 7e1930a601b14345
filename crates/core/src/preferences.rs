//! Import preferences, the file header, and discard types.

use serde::{Deserialize, Serialize};

use crate::filters::{normalize_comma_list, normalize_sheet_list, FilterField, FilterLists};

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// The preference values last persisted on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedPreferences {
    #[serde(rename = "RouteCodeID", default)]
    pub route_code_id: Option<i64>,
    #[serde(rename = "RouteCode", default)]
    pub route_code: Option<String>,
    #[serde(rename = "KeepMinors", default)]
    pub keep_minors: bool,
    #[serde(rename = "ShopOrder", default)]
    pub shop_order: Option<String>,
    #[serde(rename = "Area", default)]
    pub area: Option<String>,
}

/// Live import settings for a job.
///
/// `prefs` is the snapshot of what the server last stored and is used to
/// decide whether a commit must first persist settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportPreferences {
    #[serde(rename = "RouteCodeID", default)]
    pub route_code_id: Option<i64>,
    #[serde(rename = "RouteCode", default)]
    pub route_code: Option<String>,
    #[serde(rename = "KeepMinors", default)]
    pub keep_minors: bool,
    #[serde(rename = "ShopOrder", default)]
    pub shop_order: Option<String>,
    #[serde(rename = "Area", default)]
    pub area: Option<String>,
    /// Commit with the routing carried in the import file.
    #[serde(rename = "UseRoutesInFile", default)]
    pub use_routes_in_file: bool,

    #[serde(rename = "LotNumbers", default)]
    pub lot_numbers: String,
    #[serde(rename = "PieceMarks", default)]
    pub piece_marks: String,
    #[serde(rename = "Sequences", default)]
    pub sequences: String,
    #[serde(rename = "SheetNumbers", default)]
    pub sheet_numbers: String,

    #[serde(rename = "Prefs", default, skip_serializing_if = "Option::is_none")]
    pub prefs: Option<SavedPreferences>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImportPreferences {
    /// `true` when `KeepMinors` differs from the saved snapshot.
    ///
    /// Without a snapshot there is nothing to compare against and the value
    /// is treated as clean.
    pub fn keep_minors_dirty(&self) -> bool {
        self.prefs
            .as_ref()
            .is_some_and(|saved| saved.keep_minors != self.keep_minors)
    }

    pub fn has_route_code(&self) -> bool {
        self.route_code_id.is_some()
    }

    /// Snapshot of the current values, as they will be after a save.
    pub fn to_saved(&self) -> SavedPreferences {
        SavedPreferences {
            route_code_id: self.route_code_id,
            route_code: self.route_code.clone(),
            keep_minors: self.keep_minors,
            shop_order: self.shop_order.clone(),
            area: self.area.clone(),
        }
    }

    /// Choose the routing code the import is committed with.
    pub fn set_route(&mut self, route_code_id: i64, route_code: impl Into<String>) {
        self.route_code_id = Some(route_code_id);
        self.route_code = Some(route_code.into());
    }

    pub fn clear_route(&mut self) {
        self.route_code_id = None;
        self.route_code = None;
    }

    /// Record that the current values were persisted.
    pub fn mark_saved(&mut self) {
        self.prefs = Some(self.to_saved());
    }

    /// The free-text filters split into lists.
    pub fn filter_lists(&self) -> FilterLists {
        FilterLists {
            lot_numbers: normalize_comma_list(&self.lot_numbers),
            piece_marks: normalize_comma_list(&self.piece_marks),
            sequences: normalize_comma_list(&self.sequences),
            sheet_numbers: normalize_sheet_list(&self.sheet_numbers),
        }
    }

    /// Raw text of one filter field.
    pub fn filter(&self, field: FilterField) -> &str {
        match field {
            FilterField::LotNumbers => &self.lot_numbers,
            FilterField::PieceMarks => &self.piece_marks,
            FilterField::Sequences => &self.sequences,
            FilterField::SheetNumbers => &self.sheet_numbers,
        }
    }

    pub fn set_filter(&mut self, field: FilterField, value: impl Into<String>) {
        let slot = match field {
            FilterField::LotNumbers => &mut self.lot_numbers,
            FilterField::PieceMarks => &mut self.piece_marks,
            FilterField::Sequences => &mut self.sequences,
            FilterField::SheetNumbers => &mut self.sheet_numbers,
        };
        *slot = value.into();
    }

    /// Empty one filter field.
    pub fn clear_filter(&mut self, field: FilterField) {
        self.set_filter(field, String::new());
    }
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Summary of the import file as reported alongside the staged rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    /// The file itself carried routing information.
    #[serde(rename = "RoutesInFileFound", default)]
    pub routes_in_file_found: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Discard types
// ---------------------------------------------------------------------------

/// A shape category that can be excluded from, or summarized during, import.
///
/// `excluded` and `summarized` are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardType {
    #[serde(rename = "Shape")]
    pub shape: String,
    #[serde(rename = "Excluded", default)]
    pub excluded: bool,
    #[serde(rename = "Summarized", default)]
    pub summarized: bool,
}

/// How rows of a discard type take part in an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardSetting {
    Imported,
    Excluded,
    Summarized,
}

impl DiscardType {
    pub fn new(shape: impl Into<String>) -> Self {
        Self {
            shape: shape.into(),
            excluded: false,
            summarized: false,
        }
    }

    /// Set `excluded`; turning it on clears `summarized`.
    pub fn set_excluded(&mut self, excluded: bool) {
        self.excluded = excluded;
        if excluded {
            self.summarized = false;
        }
    }

    /// Set `summarized`; turning it on clears `excluded`.
    pub fn set_summarized(&mut self, summarized: bool) {
        self.summarized = summarized;
        if summarized {
            self.excluded = false;
        }
    }

    pub fn setting(&self) -> DiscardSetting {
        if self.excluded {
            DiscardSetting::Excluded
        } else if self.summarized {
            DiscardSetting::Summarized
        } else {
            DiscardSetting::Imported
        }
    }

    pub fn apply(&mut self, setting: DiscardSetting) {
        match setting {
            DiscardSetting::Imported => {
                self.excluded = false;
                self.summarized = false;
            }
            DiscardSetting::Excluded => self.set_excluded(true),
            DiscardSetting::Summarized => self.set_summarized(true),
        }
    }
}
