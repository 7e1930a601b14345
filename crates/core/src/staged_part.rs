//! One row of the import grid.
//!
//! Field names follow the shop API's PascalCase JSON. Descriptive columns
//! the engine does not interpret (weights, dimensions, shape, ...) are kept
//! in [`StagedPart::extra`] and round-trip untouched.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::label_allocation::{self, LabelAllocation, LabelRejection};
use crate::status::ImportStatus;
use crate::types::UniqueNumber;

fn default_labels_needed() -> i64 {
    1
}

/// A part record awaiting import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct StagedPart {
    #[serde(rename = "UniqueNumber")]
    pub unique_number: UniqueNumber,

    #[serde(rename = "ImportQuantity")]
    #[validate(range(min = 1))]
    pub import_quantity: i64,

    /// Quantity already stored downstream for this piecemark.
    #[serde(rename = "STSQuantity", default)]
    #[validate(range(min = 0))]
    pub sts_quantity: i64,

    #[serde(rename = "LabelsNeeded", default = "default_labels_needed")]
    #[validate(range(min = 1))]
    pub labels_needed: i64,

    #[serde(rename = "PerLabelMarks", default)]
    pub per_label_marks: i64,

    #[serde(rename = "MarksOnFullBarcodes", default)]
    pub marks_on_full_barcodes: i64,

    #[serde(rename = "MarksOnPartialLabel", default)]
    pub marks_on_partial_label: i64,

    #[serde(rename = "Status")]
    pub status: ImportStatus,

    #[serde(rename = "Piecemark", default)]
    pub piecemark: String,

    #[serde(rename = "ParentPiecemark", default)]
    pub parent_piecemark: String,

    /// Pass-through columns.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StagedPart {
    /// A `CREATE` row printed one item per label.
    pub fn new(unique_number: UniqueNumber, import_quantity: i64) -> Self {
        let mut part = Self {
            unique_number,
            import_quantity,
            sts_quantity: 0,
            labels_needed: 1,
            per_label_marks: 0,
            marks_on_full_barcodes: 0,
            marks_on_partial_label: 0,
            status: ImportStatus::Create,
            piecemark: String::new(),
            parent_piecemark: String::new(),
            extra: serde_json::Map::new(),
        };
        part.write_allocation(label_allocation::summarized(import_quantity));
        part
    }

    /// The derived label counts currently stored on the row.
    pub fn allocation(&self) -> LabelAllocation {
        LabelAllocation {
            per_label_marks: self.per_label_marks,
            marks_on_full_barcodes: self.marks_on_full_barcodes,
            marks_on_partial_label: self.marks_on_partial_label,
            is_fractional: self.labels_needed > 0 && self.import_quantity % self.labels_needed != 0,
        }
    }

    /// Whether the operator must fill in `LabelsNeeded` for this row.
    pub fn labels_needed_required(&self) -> bool {
        label_allocation::labels_needed_required(self.import_quantity)
    }

    /// Apply an operator-entered `LabelsNeeded`.
    ///
    /// On rejection the row is left exactly as it was and the error carries
    /// the restored value.
    pub fn apply_labels_needed(&mut self, labels_needed: i64) -> Result<LabelAllocation, LabelRejection> {
        match label_allocation::validate(self.import_quantity, labels_needed) {
            Ok(allocation) => {
                self.labels_needed = labels_needed;
                self.write_allocation(allocation);
                Ok(allocation)
            }
            Err(reason) => Err(LabelRejection {
                reason,
                attempted: labels_needed,
                restored: self.labels_needed,
            }),
        }
    }

    /// Change the disposition of this row.
    ///
    /// Moving to `SUMMARIZE` forces one label per item. Moving away from it
    /// leaves `LabelsNeeded` at 1; the operator re-enters it.
    pub fn set_status(&mut self, status: ImportStatus) {
        self.status = status;
        if status == ImportStatus::Summarize {
            self.labels_needed = 1;
            self.write_allocation(label_allocation::summarized(self.import_quantity));
        }
    }

    /// `PLM = ceil(q / n)`, `MOFB + MOPL = q` and `0 <= MOPL <= PLM`.
    pub fn is_consistent(&self) -> bool {
        match label_allocation::calculate(self.import_quantity, self.labels_needed) {
            Ok(expected) => {
                expected.per_label_marks == self.per_label_marks
                    && self.marks_on_full_barcodes + self.marks_on_partial_label
                        == self.import_quantity
                    && (0..=self.per_label_marks).contains(&self.marks_on_partial_label)
            }
            Err(_) => false,
        }
    }

    fn write_allocation(&mut self, allocation: LabelAllocation) {
        self.per_label_marks = allocation.per_label_marks;
        self.marks_on_full_barcodes = allocation.marks_on_full_barcodes;
        self.marks_on_partial_label = allocation.marks_on_partial_label;
    }
}
