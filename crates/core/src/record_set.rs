//! The in-memory set of staged parts behind the import grid.
//!
//! Rows are kept sorted by `ImportQuantity` descending. While the
//! hide-ignored filter is on, `NO_IMPORT` rows live in a side buffer so that
//! turning the filter off brings them back without losing anything.

use std::collections::BTreeSet;

use validator::{Validate, ValidationErrors};

use crate::error::CoreError;
use crate::label_allocation::{LabelAllocation, LabelRejection};
use crate::staged_part::StagedPart;
use crate::status::{BucketCounts, ImportStatus};
use crate::types::UniqueNumber;

/// Outcome of a per-row `LabelsNeeded` edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelEdit {
    Accepted(LabelAllocation),
    Rejected(LabelRejection),
}

/// Staged parts for one job-import session.
#[derive(Debug, Clone, Default)]
pub struct StagedRecordSet {
    rows: Vec<StagedPart>,
    hidden: Vec<StagedPart>,
    selection: BTreeSet<UniqueNumber>,
    hide_ignored: bool,
}

impl StagedRecordSet {
    pub fn new(rows: Vec<StagedPart>) -> Self {
        let mut set = Self {
            rows,
            ..Default::default()
        };
        sort_by_quantity(&mut set.rows);
        set
    }

    /// Rows currently shown, in display order.
    pub fn rows(&self) -> &[StagedPart] {
        &self.rows
    }

    /// Rows held back by the hide-ignored filter.
    pub fn hidden(&self) -> &[StagedPart] {
        &self.hidden
    }

    /// Shown and hidden rows together.
    pub fn all_rows(&self) -> impl Iterator<Item = &StagedPart> {
        self.rows.iter().chain(self.hidden.iter())
    }

    pub fn len(&self) -> usize {
        self.rows.len() + self.hidden.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hide_ignored(&self) -> bool {
        self.hide_ignored
    }

    pub fn get(&self, unique_number: UniqueNumber) -> Option<&StagedPart> {
        self.all_rows().find(|r| r.unique_number == unique_number)
    }

    pub fn selection(&self) -> &BTreeSet<UniqueNumber> {
        &self.selection
    }

    // ---- filtering ----

    /// Show or hide `NO_IMPORT` rows.
    ///
    /// Hiding moves them, in their current relative order, to the side
    /// buffer and drops them from the selection. Showing merges the buffer
    /// back and re-sorts. Row contents are never modified.
    pub fn toggle_hide_ignored(&mut self, on: bool) {
        if on == self.hide_ignored {
            return;
        }
        self.hide_ignored = on;

        if on {
            self.hide_no_import_rows();
        } else {
            self.rows.append(&mut self.hidden);
            sort_by_quantity(&mut self.rows);
        }
    }

    fn hide_no_import_rows(&mut self) {
        let (kept, removed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.rows)
            .into_iter()
            .partition(|r| r.status != ImportStatus::NoImport);
        self.rows = kept;
        for row in &removed {
            self.selection.remove(&row.unique_number);
        }
        self.hidden.extend(removed);
    }

    /// Replace every row, e.g. after the server refreshed the staging data.
    pub fn reset(&mut self, rows: Vec<StagedPart>) {
        self.rows = rows;
        self.hidden.clear();
        sort_by_quantity(&mut self.rows);

        if self.hide_ignored {
            self.hide_no_import_rows();
        }

        let present: BTreeSet<UniqueNumber> = self.rows.iter().map(|r| r.unique_number).collect();
        self.selection.retain(|u| present.contains(u));
    }

    // ---- selection ----

    pub fn select(&mut self, unique_number: UniqueNumber) -> Result<(), CoreError> {
        if !self.rows.iter().any(|r| r.unique_number == unique_number) {
            return Err(not_found(unique_number));
        }
        self.selection.insert(unique_number);
        Ok(())
    }

    pub fn deselect(&mut self, unique_number: UniqueNumber) {
        self.selection.remove(&unique_number);
    }

    pub fn select_all(&mut self) {
        self.selection = self.rows.iter().map(|r| r.unique_number).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ---- edits ----

    /// Set `Status` on every listed row that is currently shown.
    ///
    /// Label allocation is not recomputed, not even for `SUMMARIZE`; the
    /// operator fixes labels per row afterwards. Returns the number of rows
    /// changed.
    pub fn bulk_set_status<'a>(
        &mut self,
        selected: impl IntoIterator<Item = &'a UniqueNumber>,
        status: ImportStatus,
    ) -> usize {
        let selected: BTreeSet<UniqueNumber> = selected.into_iter().copied().collect();
        let mut changed = 0;
        for row in self.rows.iter_mut().filter(|r| selected.contains(&r.unique_number)) {
            row.status = status;
            changed += 1;
        }
        changed
    }

    /// [`bulk_set_status`](Self::bulk_set_status) over the current selection.
    pub fn bulk_set_selected_status(&mut self, status: ImportStatus) -> usize {
        let selected = self.selection.clone();
        self.bulk_set_status(&selected, status)
    }

    /// Change one row's status, applying the `SUMMARIZE` side effect.
    pub fn set_status(&mut self, unique_number: UniqueNumber, status: ImportStatus) -> Result<(), CoreError> {
        self.row_mut(unique_number)?.set_status(status);
        Ok(())
    }

    /// Apply an operator-entered `LabelsNeeded` to one row.
    ///
    /// A rejected value leaves the row unchanged; the outcome carries the
    /// value to restore in the input field.
    pub fn set_labels_needed(
        &mut self,
        unique_number: UniqueNumber,
        labels_needed: i64,
    ) -> Result<LabelEdit, CoreError> {
        let row = self.row_mut(unique_number)?;
        Ok(match row.apply_labels_needed(labels_needed) {
            Ok(allocation) => LabelEdit::Accepted(allocation),
            Err(rejection) => LabelEdit::Rejected(rejection),
        })
    }

    fn row_mut(&mut self, unique_number: UniqueNumber) -> Result<&mut StagedPart, CoreError> {
        self.rows
            .iter_mut()
            .find(|r| r.unique_number == unique_number)
            .ok_or_else(|| not_found(unique_number))
    }

    // ---- derived views ----

    /// Records to submit: everything except `NO_IMPORT`, ordered by parent
    /// piecemark descending.
    pub fn commit_records(&self) -> Vec<StagedPart> {
        let mut records: Vec<StagedPart> = self
            .all_rows()
            .filter(|r| r.status != ImportStatus::NoImport)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.parent_piecemark.cmp(&a.parent_piecemark));
        records
    }

    pub fn bucket_counts(&self) -> BucketCounts {
        BucketCounts::tally(self.all_rows())
    }

    /// Rows failing structural validation.
    pub fn invalid_rows(&self) -> Vec<(UniqueNumber, ValidationErrors)> {
        self.all_rows()
            .filter_map(|r| r.validate().err().map(|e| (r.unique_number, e)))
            .collect()
    }
}

fn sort_by_quantity(rows: &mut [StagedPart]) {
    rows.sort_by(|a, b| b.import_quantity.cmp(&a.import_quantity));
}

fn not_found(unique_number: UniqueNumber) -> CoreError {
    CoreError::NotFound {
        entity: "staged part",
        id: unique_number,
    }
}
