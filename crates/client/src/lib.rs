//! KISS import client library.
//!
//! Talks to the shop API's import endpoints, follows commit progress over a
//! server-sent event channel, and drives an operator's import session from
//! the settings confirmations through to the committed import.

pub mod api;
pub mod commit;
pub mod messages;
pub mod progress;
pub mod prompt;
pub mod session;
pub mod settings;
