//! Pure domain logic for the KISS import reconciliation engine.
//!
//! No I/O, no async: label allocation arithmetic, row classification, the
//! staged record set, and the pre-commit confirmation state machine. The
//! remote API and the commit protocol live in `kiss-client`.

pub mod commit_flow;
pub mod error;
pub mod filters;
pub mod label_allocation;
pub mod preferences;
pub mod record_set;
pub mod staged_part;
pub mod status;
pub mod types;
