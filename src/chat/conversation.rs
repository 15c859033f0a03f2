//! The in-memory conversation log.

use crate::types::{Message, Role};

/// Persona given to the model at the start of every conversation.
pub const DEFAULT_PERSONA: &str =
    "You are a chatbot named cloff. You answer human's queries as concisely as possible.";

/// The assistant's opening line.
pub const DEFAULT_GREETING: &str = "Hello! What would you like to know?";

/// An ordered, role-tagged message log.
///
/// The log always starts with the system persona followed by the assistant greeting.  It only
/// grows, except through [`Conversation::reset`], which restores those two messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    persona: String,
    greeting: String,
    messages: Vec<Message>,
    last_assistant: String,
}

impl Conversation {
    /// Start a conversation with the given persona and greeting.
    pub fn new(persona: impl Into<String>, greeting: impl Into<String>) -> Self {
        let persona = persona.into();
        let greeting = greeting.into();
        let mut conversation = Self {
            last_assistant: greeting.clone(),
            persona,
            greeting,
            messages: Vec::new(),
        };
        conversation.reset();
        conversation
    }

    /// Append a message.  Assistant messages also become the last assistant text.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        let message = Message::new(role, text);
        if let Message::Assistant(text) = &message {
            self.last_assistant.clone_from(text);
        }
        self.messages.push(message);
    }

    /// Discard every message and restore `[persona, greeting]`.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.append(Role::System, self.persona.clone());
        self.append(Role::Assistant, self.greeting.clone());
    }

    /// The full ordered history.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent assistant text, or the greeting when nothing was said since the last
    /// reset.
    pub fn last_assistant_text(&self) -> &str {
        &self.last_assistant
    }

    /// Number of messages, including the persona and greeting.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: a conversation holds at least the persona and greeting.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The configured persona.
    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// The configured greeting.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_PERSONA, DEFAULT_GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_persona_and_greeting() {
        let conversation = Conversation::default();
        assert_eq!(
            conversation.history(),
            &[
                Message::system(DEFAULT_PERSONA),
                Message::assistant(DEFAULT_GREETING)
            ]
        );
        assert_eq!(conversation.last_assistant_text(), DEFAULT_GREETING);
        assert!(!conversation.is_empty());
    }

    #[test]
    fn appends_preserve_order() {
        let mut conversation = Conversation::default();
        let turns = [
            (Role::Human, "one"),
            (Role::Assistant, "two"),
            (Role::Human, "three"),
            (Role::Human, ""),
            (Role::Assistant, "five"),
        ];
        for (role, text) in turns {
            conversation.append(role, text);
        }
        assert_eq!(conversation.len(), turns.len() + 2);
        for (message, (role, text)) in conversation.history()[2..].iter().zip(turns) {
            assert_eq!(message.role(), role);
            assert_eq!(message.text(), text);
        }
    }

    #[test]
    fn last_assistant_tracks_assistant_appends_only() {
        let mut conversation = Conversation::new("persona", "hi there");
        conversation.append(Role::Human, "question");
        assert_eq!(conversation.last_assistant_text(), "hi there");
        conversation.append(Role::Assistant, "answer");
        assert_eq!(conversation.last_assistant_text(), "answer");
        conversation.append(Role::Human, "follow-up");
        assert_eq!(conversation.last_assistant_text(), "answer");
        conversation.append(Role::Assistant, "");
        assert_eq!(conversation.last_assistant_text(), "");
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut conversation = Conversation::new("persona", "hi there");
        let initial = conversation.clone();
        conversation.append(Role::Human, "question");
        conversation.append(Role::Assistant, "answer");
        conversation.reset();
        assert_eq!(conversation, initial);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.last_assistant_text(), "hi there");

        conversation.reset();
        assert_eq!(conversation, initial);
    }
}
