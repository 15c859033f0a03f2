//! The seam between the chat session and whatever produces replies.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::Message;

/// A lazy, finite, non-restartable sequence of reply fragments.
///
/// Concatenating the `Ok` items in arrival order yields the full reply.  The first `Err` ends
/// the reply; consumers stop reading at that point.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A model that answers a conversation with a streamed reply.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// The model identifier, for display.
    fn name(&self) -> &str;

    /// Start streaming a reply to `history`.
    ///
    /// `history` is the exact conversation so far, the persona first and the newest human turn
    /// last.  Errors returned here mean the reply never started.
    async fn stream(&self, history: &[Message]) -> Result<FragmentStream>;
}
