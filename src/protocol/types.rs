//! Command and Response Frame Types
//!
//! Every WebSocket frame carries one JSON object.
//!
//! ## Frame Format
//!
//! Inbound:
//! `{"action":"insert","parameters":[{"key":"key","value":"pk1"},{"key":"identifier","value":"alice"}]}`
//!
//! Outbound:
//! `{"action":"insert","message":"inserted"}`
//!
//! ## Parameters
//!
//! Parameters are an ordered list of key/value pairs, not a map. Keys may
//! repeat; the first pair with a matching key wins. A parameter that is
//! absent reads as the empty string. Missing or `null` `key`/`value` fields
//! inside a pair also default to empty (see `parser` for the decoding rules).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Response action used when the command's action is not recognized.
pub const UNRECOGNIZED_ACTION: &str = "*";

/// Response message used when the command's action is not recognized.
pub const UNRECOGNIZED_MESSAGE: &str = "unrecognized command";

/// A single named parameter of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A decoded inbound frame.
///
/// The zero value (empty action, no parameters) is what a frame that fails
/// to decode turns into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl Command {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a parameter, builder style.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(key, value));
        self
    }

    /// Returns the value of the first parameter named `name`, or `""`.
    pub fn param(&self, name: &str) -> &str {
        self.parameters
            .iter()
            .find(|p| p.key == name)
            .map(|p| p.value.as_str())
            .unwrap_or("")
    }
}

/// The actions this service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Echo,
    Count,
    ReadIdentifier,
    IsIdentifierExist,
    Insert,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Echo,
        Action::Count,
        Action::ReadIdentifier,
        Action::IsIdentifierExist,
        Action::Insert,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Echo => "echo",
            Action::Count => "count",
            Action::ReadIdentifier => "read_identifier",
            Action::IsIdentifierExist => "is_identifier_exist",
            Action::Insert => "insert",
        }
    }

    /// Looks up an action by its exact (case-sensitive) wire name.
    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command with its parameters resolved into named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Echo,
    Count,
    ReadIdentifier { key: String },
    IsIdentifierExist { identifier: String },
    Insert { key: String, identifier: String },
    Unrecognized,
}

impl From<&Command> for Request {
    fn from(command: &Command) -> Self {
        match Action::from_name(&command.action) {
            Some(Action::Echo) => Request::Echo,
            Some(Action::Count) => Request::Count,
            Some(Action::ReadIdentifier) => Request::ReadIdentifier {
                key: command.param("key").to_owned(),
            },
            Some(Action::IsIdentifierExist) => Request::IsIdentifierExist {
                identifier: command.param("identifier").to_owned(),
            },
            Some(Action::Insert) => Request::Insert {
                key: command.param("key").to_owned(),
                identifier: command.param("identifier").to_owned(),
            },
            None => Request::Unrecognized,
        }
    }
}

/// The reply to exactly one command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub action: String,
    pub message: String,
}

impl Response {
    pub fn new(action: Action, message: impl Into<String>) -> Self {
        Self {
            action: action.as_str().to_owned(),
            message: message.into(),
        }
    }

    /// A response with an empty message.
    pub fn empty(action: Action) -> Self {
        Self::new(action, "")
    }

    pub fn unrecognized() -> Self {
        Self {
            action: UNRECOGNIZED_ACTION.to_owned(),
            message: UNRECOGNIZED_MESSAGE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_first_match_wins() {
        let cmd = Command::new("insert")
            .with_param("key", "first")
            .with_param("key", "second");
        assert_eq!(cmd.param("key"), "first");
    }

    #[test]
    fn test_param_missing_is_empty() {
        let cmd = Command::new("read_identifier").with_param("other", "x");
        assert_eq!(cmd.param("key"), "");
    }

    #[test]
    fn test_action_names() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_name("COUNT"), None);
        assert_eq!(Action::from_name(""), None);
    }

    #[test]
    fn test_request_from_command() {
        let cmd = Command::new("insert")
            .with_param("identifier", "alice")
            .with_param("key", "pk1");
        assert_eq!(
            Request::from(&cmd),
            Request::Insert {
                key: "pk1".into(),
                identifier: "alice".into()
            }
        );

        assert_eq!(
            Request::from(&Command::new("is_identifier_exist")),
            Request::IsIdentifierExist {
                identifier: String::new()
            }
        );

        assert_eq!(Request::from(&Command::default()), Request::Unrecognized);
        assert_eq!(
            Request::from(&Command::new("frobnicate").with_param("key", "x")),
            Request::Unrecognized
        );
    }

    #[test]
    fn test_unrecognized_response() {
        let response = Response::unrecognized();
        assert_eq!(response.action, "*");
        assert_eq!(response.message, "unrecognized command");
    }
}
