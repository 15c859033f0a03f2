// Public modules
pub mod generate_content;
pub mod message;

// Re-exports
pub use generate_content::{
    ApiErrorBody, ApiErrorDetail, Candidate, Content, GenerateContentRequest,
    GenerateContentResponse, Part, PromptFeedback, UsageMetadata,
};
pub use message::{Message, Role};
