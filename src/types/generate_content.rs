use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

/// A single piece of content on the wire.  Only text parts are produced or consumed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// The text of this part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Set on parts that carry the model's reasoning rather than its answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }
}

/// A run of parts attributed to one wire role (`user` or `model`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    /// `user` or `model`; absent on system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The parts of this content.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// The concatenated text of all non-thought parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|part| !part.thought.unwrap_or(false))
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

/// Body of a `streamGenerateContent` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// The persona, sent out of band from the turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,

    /// The conversation turns, oldest first.
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    /// Build a request from the full conversation history.
    ///
    /// System messages are gathered into the system instruction.  Adjacent turns with the same
    /// wire role are merged into one content so the request always alternates.
    pub fn from_history(history: &[Message]) -> Self {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Content> = Vec::new();
        for message in history {
            let wire_role = match message.role() {
                Role::System => {
                    system_parts.push(Part::text(message.text()));
                    continue;
                }
                Role::Human => "user",
                Role::Assistant => "model",
            };
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(wire_role) => {
                    last.parts.push(Part::text(message.text()));
                }
                _ => contents.push(Content {
                    role: Some(wire_role.to_string()),
                    parts: vec![Part::text(message.text())],
                }),
            }
        }
        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system_parts,
            })
        };
        Self {
            system_instruction,
            contents,
        }
    }
}

/// One candidate reply inside a response chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The content produced so far for this chunk.
    #[serde(default)]
    pub content: Option<Content>,

    /// Why generation stopped, present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Index of the candidate.
    #[serde(default)]
    pub index: Option<u32>,
}

/// Feedback about the prompt, present when the prompt itself was blocked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    /// The reason the prompt was blocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

/// Token accounting attached to response chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u64,

    /// Tokens across all candidates.
    #[serde(default)]
    pub candidates_token_count: u64,

    /// Total tokens.
    #[serde(default)]
    pub total_token_count: u64,
}

/// One server-sent chunk of a streamed reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidate replies; cloff only reads the first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Set when the prompt was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,

    /// Token accounting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,

    /// The model version that served the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// The text carried by the first candidate of this chunk, if any.
    pub fn text(&self) -> Option<String> {
        let text = self.candidates.first()?.content.as_ref()?.text();
        if text.is_empty() { None } else { Some(text) }
    }

    /// The block reason when the prompt was rejected outright.
    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }
}

/// Error body returned by the API, both as an HTTP response and inside a stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    /// The error details.
    pub error: ApiErrorDetail,
}

/// Details of an API error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ApiErrorDetail {
    /// HTTP-equivalent status code.
    #[serde(default)]
    pub code: Option<u16>,

    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,

    /// Canonical status, e.g. `RESOURCE_EXHAUSTED`.
    #[serde(default)]
    pub status: Option<String>,
}
