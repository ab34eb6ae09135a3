// Intvboot Config Parser - Binding File Lines
// Tokenizes and classifies lines of the keyboard binding file

use smallvec::SmallVec;
use strum_macros::{Display, EnumString};

use crate::combo::ComboError;
use crate::mapping::MAP_COUNT;

/// Fields of this many characters or more are rejected
pub const MAX_FIELD_LEN: usize = 255;

/// A line holds at most a command and three arguments
pub const MAX_FIELDS: usize = 4;

/// Binding file keywords. Matching ignores case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Keyword {
    Map,
    AddCombo,
    ComboDelay,
}

/// One parsed line of a binding file
#[derive(Debug, Clone, PartialEq)]
pub enum Command<'a> {
    /// `MAP n`: select the map for subsequent bindings
    Map(usize),
    /// `ADD_COMBO id A B`
    AddCombo {
        id: i64,
        base_a: &'a str,
        base_b: &'a str,
    },
    /// `COMBO_DELAY ms`
    ComboDelay(f64),
    /// `key action`
    Bind { key: &'a str, action: &'a str },
}

/// What was wrong with a binding file line
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DslErrorKind {
    #[error(
        "argument too long (field {field} reaches the {limit} character limit)",
        limit = MAX_FIELD_LEN
    )]
    FieldTooLong { field: usize },

    #[error("too many arguments")]
    TooManyFields,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{0} expects an argument")]
    MissingArgument(Keyword),

    #[error("invalid number '{value}' for {command}")]
    InvalidNumber { command: Keyword, value: String },

    #[error("map number out of range: {0} (valid range 0..{max})", max = MAP_COUNT - 1)]
    MapOutOfRange(i64),

    #[error(transparent)]
    Combo(#[from] ComboError),

    #[error("invalid event action '{0}'")]
    UnknownAction(String),

    #[error("unknown key or event '{0}'")]
    UnknownKey(String),
}

/// Split a raw line into fields.
///
/// Everything from the first `;` on is a comment. Line terminators are
/// dropped and fields are separated by any run of whitespace.
pub fn tokenize(line: &str) -> Result<SmallVec<[&str; MAX_FIELDS]>, DslErrorKind> {
    let content = match line.find(';') {
        Some(pos) => &line[..pos],
        None => line,
    };

    let mut fields = SmallVec::new();
    for (i, field) in content.split_whitespace().enumerate() {
        if i >= MAX_FIELDS {
            return Err(DslErrorKind::TooManyFields);
        }
        if field.chars().count() >= MAX_FIELD_LEN {
            return Err(DslErrorKind::FieldTooLong { field: i + 1 });
        }
        fields.push(field);
    }

    Ok(fields)
}

/// Parse one line. Blank and comment-only lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Command<'_>>, DslErrorKind> {
    let fields = tokenize(line)?;
    let Some(&cmd) = fields.first() else {
        return Ok(None);
    };
    let keyword = cmd.parse::<Keyword>().ok();

    if keyword == Some(Keyword::AddCombo) {
        if fields.len() < MAX_FIELDS {
            return Err(DslErrorKind::MissingArgument(Keyword::AddCombo));
        }
        let id = parse_number::<i64>(Keyword::AddCombo, fields[1])?;
        return Ok(Some(Command::AddCombo {
            id,
            base_a: fields[2],
            base_b: fields[3],
        }));
    }

    if fields.len() > 2 {
        return Err(DslErrorKind::TooManyFields);
    }

    match keyword {
        Some(Keyword::Map) => {
            let arg = fields
                .get(1)
                .ok_or(DslErrorKind::MissingArgument(Keyword::Map))?;
            let map = parse_number::<i64>(Keyword::Map, arg)?;
            usize::try_from(map)
                .ok()
                .filter(|m| *m < MAP_COUNT)
                .map(|m| Some(Command::Map(m)))
                .ok_or(DslErrorKind::MapOutOfRange(map))
        }
        Some(Keyword::ComboDelay) => {
            let arg = fields
                .get(1)
                .ok_or(DslErrorKind::MissingArgument(Keyword::ComboDelay))?;
            let ms = parse_number::<f64>(Keyword::ComboDelay, arg)?;
            Ok(Some(Command::ComboDelay(ms)))
        }
        _ => match fields.get(1) {
            Some(&action) => Ok(Some(Command::Bind { key: cmd, action })),
            None => Err(DslErrorKind::UnknownCommand(cmd.to_string())),
        },
    }
}

fn parse_number<T: std::str::FromStr>(command: Keyword, value: &str) -> Result<T, DslErrorKind> {
    value.parse().map_err(|_| DslErrorKind::InvalidNumber {
        command,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   \t  "), Ok(None));
        assert_eq!(parse_line("; just a comment"), Ok(None));
        assert_eq!(parse_line("\r\n"), Ok(None));
    }

    #[test]
    fn test_bind_line() {
        assert_eq!(
            parse_line("  A   PD0L_KP1  ; fire\r\n"),
            Ok(Some(Command::Bind {
                key: "A",
                action: "PD0L_KP1"
            }))
        );
    }

    #[test]
    fn test_keywords_ignore_case() {
        assert_eq!(parse_line("map 2"), Ok(Some(Command::Map(2))));
        assert_eq!(parse_line("Map 3"), Ok(Some(Command::Map(3))));
        assert_eq!(
            parse_line("add_combo 1 A B"),
            Ok(Some(Command::AddCombo {
                id: 1,
                base_a: "A",
                base_b: "B"
            }))
        );
        assert_eq!(
            parse_line("Combo_Delay 12.5"),
            Ok(Some(Command::ComboDelay(12.5)))
        );
    }

    #[test]
    fn test_map_out_of_range() {
        assert_eq!(parse_line("MAP 7"), Err(DslErrorKind::MapOutOfRange(7)));
        assert_eq!(parse_line("MAP -1"), Err(DslErrorKind::MapOutOfRange(-1)));
    }

    #[test]
    fn test_missing_and_invalid_arguments() {
        assert_eq!(
            parse_line("MAP"),
            Err(DslErrorKind::MissingArgument(Keyword::Map))
        );
        assert_eq!(
            parse_line("ADD_COMBO 1 A"),
            Err(DslErrorKind::MissingArgument(Keyword::AddCombo))
        );
        assert_eq!(
            parse_line("COMBO_DELAY soon"),
            Err(DslErrorKind::InvalidNumber {
                command: Keyword::ComboDelay,
                value: "soon".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_single_field_command() {
        assert_eq!(
            parse_line("FROBNICATE"),
            Err(DslErrorKind::UnknownCommand("FROBNICATE".to_string()))
        );
    }

    #[test]
    fn test_too_many_fields() {
        assert_eq!(parse_line("A B C"), Err(DslErrorKind::TooManyFields));
        assert_eq!(parse_line("MAP 1 2"), Err(DslErrorKind::TooManyFields));
        assert_eq!(
            parse_line("ADD_COMBO 1 A B C"),
            Err(DslErrorKind::TooManyFields)
        );
    }

    #[test]
    fn test_field_length_limit() {
        let ok = "K".repeat(MAX_FIELD_LEN - 1);
        assert!(tokenize(&format!("{ok} QUIT")).is_ok());

        let long = "K".repeat(MAX_FIELD_LEN);
        assert_eq!(
            parse_line(&format!("A {long}")),
            Err(DslErrorKind::FieldTooLong { field: 2 })
        );
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(Keyword::AddCombo.to_string(), "ADD_COMBO");
        assert_eq!(Keyword::ComboDelay.to_string(), "COMBO_DELAY");
    }
}
