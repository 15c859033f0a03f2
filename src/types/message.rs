use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a conversation turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The persona/behavior contract given to the model.
    System,

    /// The person at the keyboard.
    Human,

    /// The model.
    Assistant,
}

impl Role {
    /// The tag printed in front of this role's text.
    pub fn tag(self) -> &'static str {
        match self {
            Role::System => "[system]",
            Role::Human => "[you]",
            Role::Assistant => "[cloff]",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::Human => write!(f, "human"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One role-tagged turn of a conversation.
///
/// The role is fixed by the variant and cannot change once the message exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "text", rename_all = "lowercase")]
pub enum Message {
    /// A system message.
    System(String),

    /// A message typed by the human.
    Human(String),

    /// A reply from the model.
    Assistant(String),
}

impl Message {
    /// Create a message for `role` holding `text`.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        let text = text.into();
        match role {
            Role::System => Message::System(text),
            Role::Human => Message::Human(text),
            Role::Assistant => Message::Assistant(text),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a human message.
    pub fn human(text: impl Into<String>) -> Self {
        Self::new(Role::Human, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// The role of this message.
    pub fn role(&self) -> Role {
        match self {
            Message::System(_) => Role::System,
            Message::Human(_) => Role::Human,
            Message::Assistant(_) => Role::Assistant,
        }
    }

    /// The text payload of this message.
    pub fn text(&self) -> &str {
        match self {
            Message::System(text) | Message::Human(text) | Message::Assistant(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn message_serializes_role_and_text() {
        let message = Message::human("hi");
        let json = to_value(&message).unwrap();

        assert_eq!(
            json,
            json!({
                "role": "human",
                "text": "hi"
            })
        );
    }

    #[test]
    fn message_role_matches_constructor() {
        assert_eq!(Message::system("s").role(), Role::System);
        assert_eq!(Message::human("h").role(), Role::Human);
        assert_eq!(Message::assistant("a").role(), Role::Assistant);
        assert_eq!(Message::new(Role::Assistant, "x"), Message::assistant("x"));
    }

    #[test]
    fn empty_text_is_valid() {
        let message = Message::assistant("");
        assert_eq!(message.text(), "");
    }

    #[test]
    fn role_tags() {
        assert_eq!(Role::Assistant.tag(), "[cloff]");
        assert_eq!(Role::Human.tag(), "[you]");
        assert_eq!(Role::System.tag(), "[system]");
    }
}
