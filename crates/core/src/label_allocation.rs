//! Label allocation arithmetic for staged parts.
//!
//! A part's `ImportQuantity` is spread across `LabelsNeeded` printed labels.
//! Every full label carries `per_label_marks` marks; when the quantity does
//! not divide evenly the trailing label is a partial one carrying the
//! remainder.
//!
//! All arithmetic is exact integer arithmetic: `ceil(q / n)` is computed as
//! `(q + n - 1) / n` and the fractional flag as `q % n != 0`.

use serde::{Deserialize, Serialize};

/// Derived label counts for one quantity / labels-needed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAllocation {
    /// Marks printed on each full label (PLM).
    pub per_label_marks: i64,
    /// Total marks carried by the full labels (MOFB).
    pub marks_on_full_barcodes: i64,
    /// Marks left for the trailing partial label (MOPL). Negative when the
    /// requested label count cannot be honoured.
    pub marks_on_partial_label: i64,
    /// `true` when `import_quantity / labels_needed` is not a whole number.
    pub is_fractional: bool,
}

/// Why a `LabelsNeeded` value was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// `LabelsNeeded` was zero or negative.
    NoLabels,
    /// More labels were requested than there are items.
    MoreLabelsThanQuantity,
    /// The full labels already account for more marks than exist.
    NegativePartialLabel,
    /// The split is fractional yet nothing is left for the partial label.
    EmptyPartialLabel,
    /// The partial label would carry more marks than a full one.
    PartialExceedsFull,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoLabels => "labels needed must be at least 1",
            Self::MoreLabelsThanQuantity => "labels needed exceeds the import quantity",
            Self::NegativePartialLabel => "full labels exceed the import quantity",
            Self::EmptyPartialLabel => "the trailing partial label would be empty",
            Self::PartialExceedsFull => "the partial label would exceed a full label",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A refused `LabelsNeeded` edit.
///
/// Carries the value the operator attempted and the last known good value
/// that the row keeps, so the host form can reset its input field without
/// consulting any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Labels needed {attempted} rejected ({reason}); keeping {restored}")]
pub struct LabelRejection {
    pub reason: RejectReason,
    pub attempted: i64,
    pub restored: i64,
}

/// Compute the label split for `import_quantity` items over `labels_needed`
/// labels.
///
/// Only fails for `labels_needed < 1`. The result is *not* checked for
/// consistency; use [`validate`] for that.
pub fn calculate(import_quantity: i64, labels_needed: i64) -> Result<LabelAllocation, RejectReason> {
    if labels_needed < 1 {
        return Err(RejectReason::NoLabels);
    }

    let per_label_marks = ceil_div(import_quantity, labels_needed);
    let is_fractional = import_quantity % labels_needed != 0;
    let full_labels = if is_fractional {
        labels_needed - 1
    } else {
        labels_needed
    };
    let marks_on_full_barcodes = per_label_marks.saturating_mul(full_labels);

    Ok(LabelAllocation {
        per_label_marks,
        marks_on_full_barcodes,
        marks_on_partial_label: import_quantity.saturating_sub(marks_on_full_barcodes),
        is_fractional,
    })
}

/// `ceil(quantity / labels)` for `labels >= 1`, without the overflow of
/// `quantity + labels - 1`. Integer division already rounds non-positive
/// quotients up.
fn ceil_div(quantity: i64, labels: i64) -> i64 {
    if quantity > 0 {
        (quantity - 1) / labels + 1
    } else {
        quantity / labels
    }
}

/// Compute and gate a label split.
///
/// Rejects when any of the following hold: fewer items than labels, a
/// negative partial label, an empty partial label on a fractional split,
/// or a partial label larger than a full one.
pub fn validate(import_quantity: i64, labels_needed: i64) -> Result<LabelAllocation, RejectReason> {
    if labels_needed < 1 {
        return Err(RejectReason::NoLabels);
    }
    if import_quantity < labels_needed {
        return Err(RejectReason::MoreLabelsThanQuantity);
    }
    let allocation = calculate(import_quantity, labels_needed)?;

    if allocation.marks_on_partial_label < 0 {
        return Err(RejectReason::NegativePartialLabel);
    }
    if allocation.is_fractional && allocation.marks_on_partial_label == 0 {
        return Err(RejectReason::EmptyPartialLabel);
    }
    if allocation.marks_on_partial_label > allocation.per_label_marks {
        return Err(RejectReason::PartialExceedsFull);
    }

    Ok(allocation)
}

/// The allocation a summarized row always receives: one label per item.
pub fn summarized(import_quantity: i64) -> LabelAllocation {
    LabelAllocation {
        per_label_marks: import_quantity,
        marks_on_full_barcodes: import_quantity,
        marks_on_partial_label: 0,
        is_fractional: false,
    }
}

/// Whether the operator must supply `LabelsNeeded` for a row.
///
/// Single-unit rows never need it.
pub fn labels_needed_required(import_quantity: i64) -> bool {
    import_quantity != 1
}
