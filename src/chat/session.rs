//! Core chat session management.
//!
//! This module provides the `ChatSession` struct, which owns the conversation, runs commands
//! and streams replies from a [`ChatModel`] to a [`Renderer`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::sync::Notify;

use crate::chat::commands::{CommandRegistry, Dispatch, chat_commands};
use crate::chat::config::{ChatConfig, Settings, persist_show_stats};
use crate::chat::conversation::Conversation;
use crate::error::{Error, Result};
use crate::model::ChatModel;
use crate::observability::{
    CHAT_COMMANDS, CHAT_INTERRUPTS, CHAT_TURN_DURATION, CHAT_TURN_ERRORS, CHAT_TURNS,
    SETTINGS_PERSIST_ERRORS, STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_TIMEOUTS,
    STREAM_TTFB,
};
use crate::render::{Renderer, TerminalRenderer};
use crate::types::Role;

/// Shown when the human presses Ctrl+C.
pub const INTERRUPT_HINT: &str = "Type 'exit' to exit.";

/// Appended to errors that may go away when the message is sent again.
pub const RETRY_HINT: &str = "temporary; send the message again to retry";

/// Shown by the `exit` command.
pub const FAREWELL: &str = "Goodbye!";

////////////////////////////////////////////// Interrupt /////////////////////////////////////////////

/// A cancellation flag shared between the signal handler and the session.
///
/// Cloning yields another handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Interrupt {
    /// Creates a lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake the session.  Safe to call from any thread.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Returns whether the flag is raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is raised.
    pub async fn wait(&self) {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            if self.is_raised() {
                return;
            }
            notified.await;
        }
    }
}

// Race `future` against the interrupt and the idle timeout.
async fn bounded<F: Future>(future: F, interrupt: &Interrupt, idle: Duration) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = interrupt.wait() => Err(Error::Interrupted),
        output = future => Ok(output),
        _ = tokio::time::sleep(idle) => {
            STREAM_TIMEOUTS.click();
            Err(Error::timeout(
                "no reply from the model",
                Some(idle.as_secs_f64()),
            ))
        }
    }
}

///////////////////////////////////////////// ChatSession ////////////////////////////////////////////

/// An interactive conversation with one model.
pub struct ChatSession<M: ChatModel> {
    model: M,
    conversation: Conversation,
    settings: Settings,
    settings_path: Option<PathBuf>,
    renderer: Box<dyn Renderer>,
    interrupt: Interrupt,
    timeout: Duration,
    commands: Arc<CommandRegistry<Self>>,
}

impl<M: ChatModel> ChatSession<M> {
    /// Creates a session that renders to the terminal.
    pub fn new(model: M, config: ChatConfig) -> Self {
        let renderer = TerminalRenderer::new(config.palette, config.settings.use_color);
        Self::with_renderer(model, config, Box::new(renderer))
    }

    /// Creates a session that renders through `renderer`.
    pub fn with_renderer(model: M, config: ChatConfig, renderer: Box<dyn Renderer>) -> Self {
        Self {
            model,
            conversation: Conversation::new(config.persona, config.greeting),
            settings: config.settings,
            settings_path: config.settings_path,
            renderer,
            interrupt: Interrupt::new(),
            timeout: config.timeout,
            commands: Arc::new(chat_commands()),
        }
    }

    /// Returns the conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the current settings.
    pub fn settings(&self) -> Settings {
        self.settings
    }

    /// Returns the settings file `stats` writes to, if any.
    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    /// Returns a handle to this session's interrupt flag.
    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Returns the model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Returns the command table.
    pub fn commands(&self) -> &CommandRegistry<Self> {
        &self.commands
    }

    /// The input prompt.
    pub fn prompt(&self) -> String {
        self.renderer.prompt()
    }

    /// Print the greeting (or the latest reply).
    pub fn greet(&mut self) {
        self.renderer
            .print_message(Role::Assistant, self.conversation.last_assistant_text());
    }

    /// Handle one line of input.  Returns `true` when the loop should stop.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        let commands = Arc::clone(&self.commands);
        match commands.dispatch(self, line) {
            Dispatch::Command { keyword, exit } => {
                CHAT_COMMANDS.click();
                tracing::debug!(keyword, exit, "ran command");
                exit
            }
            Dispatch::Message => {
                if !line.trim().is_empty() {
                    if let Err(err) = self.send(line).await {
                        self.report(&err);
                    }
                }
                false
            }
        }
    }

    /// Tell the human how to leave after a Ctrl+C.
    pub fn interrupted(&mut self) {
        CHAT_INTERRUPTS.click();
        self.interrupt.clear();
        self.renderer.print_message(Role::Assistant, INTERRUPT_HINT);
    }

    /// Run one turn: append `text`, stream the reply, and append the reply.
    ///
    /// On error the human message stays in the conversation and no assistant message is
    /// appended.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        CHAT_TURNS.click();
        self.interrupt.clear();
        self.conversation.append(Role::Human, text);
        let start = Instant::now();
        let result = self.stream_reply(start).await;
        CHAT_TURN_DURATION.add(start.elapsed().as_secs_f64());
        match result {
            Ok(reply) => {
                let elapsed = self.settings.show_stats.then(|| start.elapsed());
                self.renderer.finish_reply(elapsed);
                self.conversation.append(Role::Assistant, reply.clone());
                Ok(reply)
            }
            Err(err) => {
                CHAT_TURN_ERRORS.click();
                self.renderer.abort_reply();
                Err(err)
            }
        }
    }

    async fn stream_reply(&mut self, start: Instant) -> Result<String> {
        tracing::debug!(
            model = self.model.name(),
            messages = self.conversation.len(),
            "requesting reply"
        );
        let mut stream = bounded(
            self.model.stream(self.conversation.history()),
            &self.interrupt,
            self.timeout,
        )
        .await??;
        let mut reply = String::new();
        while let Some(fragment) = bounded(stream.next(), &self.interrupt, self.timeout).await? {
            let fragment = fragment.inspect_err(|_| STREAM_ERRORS.click())?;
            if fragment.is_empty() {
                continue;
            }
            if reply.is_empty() {
                STREAM_TTFB.add(start.elapsed().as_secs_f64());
                self.renderer.start_reply();
            }
            STREAM_FRAGMENTS.click();
            STREAM_BYTES.count(fragment.len() as u64);
            self.renderer.print_fragment(&fragment);
            reply.push_str(&fragment);
        }
        if reply.is_empty() {
            return Err(Error::EmptyReply);
        }
        Ok(reply)
    }

    fn report(&mut self, err: &Error) {
        if err.is_interrupted() {
            self.interrupted();
        } else {
            tracing::debug!(error = %err, retryable = err.is_retryable(), "turn failed");
            if err.is_retryable() {
                self.renderer.print_error(&format!("{err} ({RETRY_HINT})"));
            } else {
                self.renderer.print_error(&err.to_string());
            }
        }
    }

    /// Say goodbye.
    pub fn farewell(&mut self) {
        self.renderer.print_message(Role::Assistant, FAREWELL);
    }

    /// Clear the screen and show the latest reply again.
    pub fn clear_screen(&mut self) {
        self.renderer.clear_screen();
        self.greet();
    }

    /// Start the conversation over.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.renderer.print_info("Conversation reset.");
        self.greet();
    }

    /// Print every message followed by a count line.
    pub fn print_history(&mut self) {
        for message in self.conversation.history() {
            self.renderer.print_message(message.role(), message.text());
        }
        let count = self.conversation.len();
        self.renderer.print_info(&format!("{count} messages"));
    }

    /// Print the command listing.
    pub fn print_help(&mut self, help: &str) {
        self.renderer.print_info(help);
    }

    /// Flip timing statistics and try to persist the new value.
    pub fn toggle_stats(&mut self) {
        self.settings.show_stats = !self.settings.show_stats;
        let show_stats = self.settings.show_stats;
        match &self.settings_path {
            Some(path) => {
                if let Err(err) = persist_show_stats(path, show_stats) {
                    SETTINGS_PERSIST_ERRORS.click();
                    tracing::warn!(path = %path.display(), error = %err, "could not save settings");
                    self.renderer.print_error(&format!(
                        "could not save settings ({err}); the change applies to this session only"
                    ));
                }
            }
            None => {
                self.renderer
                    .print_info("No settings file; the change applies to this session only.");
            }
        }
        let state = if show_stats { "on" } else { "off" };
        self.renderer.print_info(&format!("Timing stats {state}."));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::FragmentStream;
    use crate::types::Message;

    struct Canned(Vec<&'static str>);

    #[async_trait::async_trait]
    impl ChatModel for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn stream(&self, _history: &[Message]) -> Result<FragmentStream> {
            let fragments: Vec<Result<String>> =
                self.0.iter().map(|s| Ok(s.to_string())).collect();
            Ok(Box::pin(futures::stream::iter(fragments)))
        }
    }

    #[derive(Default)]
    struct Silent;

    impl Renderer for Silent {
        fn print_message(&mut self, _: Role, _: &str) {}
        fn start_reply(&mut self) {}
        fn print_fragment(&mut self, _: &str) {}
        fn finish_reply(&mut self, _: Option<Duration>) {}
        fn abort_reply(&mut self) {}
        fn print_info(&mut self, _: &str) {}
        fn print_error(&mut self, _: &str) {}
        fn clear_screen(&mut self) {}
        fn prompt(&self) -> String {
            String::new()
        }
    }

    fn session(fragments: Vec<&'static str>) -> ChatSession<Canned> {
        ChatSession::with_renderer(
            Canned(fragments),
            ChatConfig::new("canned"),
            Box::new(Silent),
        )
    }

    #[tokio::test]
    async fn send_concatenates_fragments() {
        let mut session = session(vec!["Hel", "", "lo"]);
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply, "Hello");
        assert_eq!(session.conversation().len(), 4);
        assert_eq!(session.conversation().last_assistant_text(), "Hello");
    }

    #[tokio::test]
    async fn empty_reply_appends_nothing() {
        let mut session = session(vec![]);
        let err = session.send("hi").await.unwrap_err();
        assert!(matches!(err, Error::EmptyReply));
        assert_eq!(session.conversation().len(), 3);
        assert_eq!(
            session.conversation().history()[2],
            Message::human("hi")
        );
    }

    #[tokio::test]
    async fn empty_lines_are_ignored() {
        let mut session = session(vec!["unused"]);
        assert!(!session.handle_line("   ").await);
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn toggle_without_settings_file() {
        let mut session = session(vec![]);
        assert!(!session.settings().show_stats);
        assert!(!session.handle_line("stats").await);
        assert!(session.settings().show_stats);
        assert!(!session.handle_line("stats").await);
        assert!(!session.settings().show_stats);
    }

    #[tokio::test]
    async fn interrupt_wait_returns_once_raised() {
        let interrupt = Interrupt::new();
        let handle = interrupt.clone();
        let waiter = tokio::spawn(async move { interrupt.wait().await });
        tokio::task::yield_now().await;
        handle.raise();
        waiter.await.unwrap();
        assert!(handle.is_raised());
        handle.clear();
        assert!(!handle.is_raised());
    }

    #[tokio::test]
    async fn bounded_prefers_interrupt() {
        let interrupt = Interrupt::new();
        interrupt.raise();
        let err = bounded(async { 7 }, &interrupt, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_interrupted());
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_times_out() {
        let interrupt = Interrupt::new();
        let err = bounded(
            futures::future::pending::<()>(),
            &interrupt,
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }
}
