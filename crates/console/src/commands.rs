//! Operator commands typed at the console prompt.

use kiss_core::filters::FilterField;
use kiss_core::preferences::DiscardSetting;
use kiss_core::status::ImportStatus;
use kiss_core::types::UniqueNumber;

pub const HELP: &str = "\
Commands:
  list                         show the staged rows
  labels <unique> <n>          set LabelsNeeded on one row
  status <unique> <STATUS>     set one row's status (CREATE, UPDATE, SUMMARIZE, NO_IMPORT)
  select <unique>... | all | none
  bulk <STATUS>                set the status of every selected row
  hide on|off                  hide or show NO_IMPORT rows
  filter <field> <values>      set LotNumbers, PieceMarks, Sequences or SheetNumbers
  route <id> <code> | none     choose the routing code
  minors on|off                keep minor parts
  discard <shape> excluded|summarized|none
  settings                     show routing, minors, discard types and filters
  import                       confirm settings and commit the import
  help
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Labels {
        unique_number: UniqueNumber,
        labels_needed: i64,
    },
    Status {
        unique_number: UniqueNumber,
        status: ImportStatus,
    },
    Select(Vec<UniqueNumber>),
    SelectAll,
    ClearSelection,
    Bulk(ImportStatus),
    Hide(bool),
    Filter {
        field: FilterField,
        value: String,
    },
    Route {
        route_code_id: i64,
        route_code: String,
    },
    ClearRoute,
    Minors(bool),
    Discard {
        shape: String,
        setting: DiscardSetting,
    },
    Settings,
    Import,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'; type 'help'")]
    Unknown(String),

    #[error("Missing {0}")]
    Missing(&'static str),

    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("'{0}' is not a status the operator can choose")]
    InvalidStatus(String),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Expected on or off, got '{0}'")]
    InvalidToggle(String),

    #[error("Expected excluded, summarized or none, got '{0}'")]
    InvalidDiscardSetting(String),
}

/// Parse one input line. Returns `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "list" | "ls" => Command::List,
        "labels" => Command::Labels {
            unique_number: number(words.next(), "row number")?,
            labels_needed: number(words.next(), "labels needed")?,
        },
        "status" => Command::Status {
            unique_number: number(words.next(), "row number")?,
            status: status(words.next())?,
        },
        "select" => {
            let rest: Vec<&str> = words.collect();
            match rest.as_slice() {
                [] => return Err(CommandError::Missing("row numbers")),
                ["all"] => Command::SelectAll,
                ["none"] => Command::ClearSelection,
                ids => Command::Select(
                    ids.iter()
                        .map(|id| number(Some(*id), "row number"))
                        .collect::<Result<_, _>>()?,
                ),
            }
        }
        "bulk" => Command::Bulk(status(words.next())?),
        "hide" => Command::Hide(toggle(words.next())?),
        "minors" => Command::Minors(toggle(words.next())?),
        "filter" => {
            let field = words.next().ok_or(CommandError::Missing("filter field"))?;
            let field = FilterField::from_name(field)
                .ok_or_else(|| CommandError::UnknownFilter(field.to_string()))?;
            Command::Filter {
                field,
                value: words.collect::<Vec<_>>().join(" "),
            }
        }
        "route" => match words.next() {
            Some("none") => Command::ClearRoute,
            id => Command::Route {
                route_code_id: number(id, "routing code id")?,
                route_code: words
                    .next()
                    .ok_or(CommandError::Missing("routing code"))?
                    .to_string(),
            },
        },
        "discard" => Command::Discard {
            shape: words
                .next()
                .ok_or(CommandError::Missing("shape"))?
                .to_string(),
            setting: discard_setting(words.next())?,
        },
        "settings" => Command::Settings,
        "import" | "commit" => Command::Import,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn number(word: Option<&str>, what: &'static str) -> Result<i64, CommandError> {
    let word = word.ok_or(CommandError::Missing(what))?;
    word.parse()
        .map_err(|_| CommandError::NotANumber(word.to_string()))
}

fn toggle(word: Option<&str>) -> Result<bool, CommandError> {
    match word {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(CommandError::InvalidToggle(other.to_string())),
        None => Err(CommandError::Missing("on or off")),
    }
}

fn discard_setting(word: Option<&str>) -> Result<DiscardSetting, CommandError> {
    let word = word.ok_or(CommandError::Missing("discard setting"))?;
    match word.to_ascii_lowercase().as_str() {
        "excluded" | "exclude" => Ok(DiscardSetting::Excluded),
        "summarized" | "summarize" => Ok(DiscardSetting::Summarized),
        "none" => Ok(DiscardSetting::Imported),
        _ => Err(CommandError::InvalidDiscardSetting(word.to_string())),
    }
}

fn status(word: Option<&str>) -> Result<ImportStatus, CommandError> {
    let word = word.ok_or(CommandError::Missing("status"))?;
    let upper = word.to_ascii_uppercase();
    match ImportStatus::from_str_wire(&upper) {
        Ok(status) if status.is_operator_selectable() => Ok(status),
        _ => Err(CommandError::InvalidStatus(word.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn blank_line_is_no_command() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn labels_and_status() {
        assert_eq!(
            parse("labels 17 3"),
            Ok(Some(Command::Labels {
                unique_number: 17,
                labels_needed: 3
            }))
        );
        assert_eq!(
            parse("status 4 no_import"),
            Ok(Some(Command::Status {
                unique_number: 4,
                status: ImportStatus::NoImport
            }))
        );
    }

    #[test]
    fn review_statuses_are_not_selectable() {
        assert_matches!(parse("bulk REVIEW_LABEL"), Err(CommandError::InvalidStatus(_)));
        assert_matches!(parse("bulk DELETE"), Err(CommandError::InvalidStatus(_)));
    }

    #[test]
    fn selection_forms() {
        assert_eq!(parse("select 1 2 3"), Ok(Some(Command::Select(vec![1, 2, 3]))));
        assert_eq!(parse("select all"), Ok(Some(Command::SelectAll)));
        assert_eq!(parse("select none"), Ok(Some(Command::ClearSelection)));
        assert_eq!(parse("select"), Err(CommandError::Missing("row numbers")));
        assert_eq!(parse("select 1 x"), Err(CommandError::NotANumber("x".into())));
    }

    #[test]
    fn hide_toggle() {
        assert_eq!(parse("hide on"), Ok(Some(Command::Hide(true))));
        assert_eq!(parse("hide maybe"), Err(CommandError::InvalidToggle("maybe".into())));
    }

    #[test]
    fn filter_keeps_raw_value() {
        assert_eq!(
            parse("filter SheetNumbers E1 E2,E3"),
            Ok(Some(Command::Filter {
                field: FilterField::SheetNumbers,
                value: "E1 E2,E3".into()
            }))
        );
        assert_matches!(parse("filter Colour red"), Err(CommandError::UnknownFilter(_)));
    }

    #[test]
    fn route_forms() {
        assert_eq!(
            parse("route 5 FAB"),
            Ok(Some(Command::Route {
                route_code_id: 5,
                route_code: "FAB".into()
            }))
        );
        assert_eq!(parse("route none"), Ok(Some(Command::ClearRoute)));
        assert_eq!(parse("route 5"), Err(CommandError::Missing("routing code")));
        assert_eq!(parse("route FAB"), Err(CommandError::NotANumber("FAB".into())));
        assert_eq!(parse("route"), Err(CommandError::Missing("routing code id")));
    }

    #[test]
    fn minors_toggle() {
        assert_eq!(parse("minors on"), Ok(Some(Command::Minors(true))));
        assert_eq!(parse("minors off"), Ok(Some(Command::Minors(false))));
        assert_eq!(parse("minors"), Err(CommandError::Missing("on or off")));
    }

    #[test]
    fn discard_settings() {
        assert_eq!(
            parse("discard PL excluded"),
            Ok(Some(Command::Discard {
                shape: "PL".into(),
                setting: DiscardSetting::Excluded
            }))
        );
        assert_eq!(
            parse("discard L Summarized"),
            Ok(Some(Command::Discard {
                shape: "L".into(),
                setting: DiscardSetting::Summarized
            }))
        );
        assert_eq!(
            parse("discard PL none"),
            Ok(Some(Command::Discard {
                shape: "PL".into(),
                setting: DiscardSetting::Imported
            }))
        );
        assert_matches!(parse("discard PL later"), Err(CommandError::InvalidDiscardSetting(_)));
        assert_eq!(parse("discard"), Err(CommandError::Missing("shape")));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(parse("frobnicate"), Err(CommandError::Unknown("frobnicate".into())));
    }
}
