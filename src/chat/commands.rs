//! Keyword commands for the chat application.
//!
//! A line that exactly matches a registered keyword (after trimming) runs that command locally
//! instead of being sent to the model.  The table is declared statically by
//! [`chat_commands`]; every other line is a conversational turn.

use crate::chat::ChatSession;
use crate::model::ChatModel;

/// A command handler.
///
/// Handlers act on their context (and may read the registry, e.g. to print help) and return
/// `true` when the interactive loop should stop.
pub type Handler<C> = fn(&mut C, &CommandRegistry<C>) -> bool;

/// One entry of a [`CommandRegistry`].
pub struct CommandSpec<C> {
    /// The keyword that triggers the command.
    pub keyword: &'static str,
    /// Extra keywords that trigger the same command.
    pub aliases: &'static [&'static str],
    /// One-line description shown in the help listing.
    pub description: &'static str,
    /// The handler.
    pub handler: Handler<C>,
}

impl<C> CommandSpec<C> {
    /// Declare a command without aliases.
    pub fn new(keyword: &'static str, description: &'static str, handler: Handler<C>) -> Self {
        Self {
            keyword,
            aliases: &[],
            description,
            handler,
        }
    }

    /// Add aliases to this command.
    pub fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn matches(&self, word: &str) -> bool {
        self.keyword == word || self.aliases.contains(&word)
    }
}

/// The outcome of dispatching one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A command ran.
    Command {
        /// The primary keyword of the command that ran.
        keyword: &'static str,
        /// Whether the loop should stop.
        exit: bool,
    },
    /// The line is not a command; it belongs to the conversation.
    Message,
}

/// A fixed table of commands, built once at startup.
pub struct CommandRegistry<C> {
    commands: Vec<CommandSpec<C>>,
}

impl<C> CommandRegistry<C> {
    /// Build a registry from a list of commands.
    ///
    /// # Panics
    ///
    /// Panics if a keyword or alias is empty, contains whitespace, or is registered twice.
    pub fn new(commands: Vec<CommandSpec<C>>) -> Self {
        let mut seen: Vec<&str> = Vec::new();
        for word in commands
            .iter()
            .flat_map(|spec| std::iter::once(spec.keyword).chain(spec.aliases.iter().copied()))
        {
            assert!(
                !word.is_empty() && !word.chars().any(char::is_whitespace),
                "invalid command keyword {word:?}"
            );
            assert!(!seen.contains(&word), "duplicate command keyword {word:?}");
            seen.push(word);
        }
        Self { commands }
    }

    /// The commands, in declaration order.
    pub fn commands(&self) -> &[CommandSpec<C>] {
        &self.commands
    }

    /// Find the command for `word`, by keyword or alias.
    pub fn lookup(&self, word: &str) -> Option<&CommandSpec<C>> {
        self.commands.iter().find(|spec| spec.matches(word))
    }

    /// Run the command named by `line`, if any.
    pub fn dispatch(&self, context: &mut C, line: &str) -> Dispatch {
        match self.lookup(line.trim()) {
            Some(spec) => Dispatch::Command {
                keyword: spec.keyword,
                exit: (spec.handler)(context, self),
            },
            None => Dispatch::Message,
        }
    }

    /// A help listing generated from the descriptions.
    pub fn help_text(&self) -> String {
        let names: Vec<String> = self
            .commands
            .iter()
            .map(|spec| {
                std::iter::once(spec.keyword)
                    .chain(spec.aliases.iter().copied())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();
        let width = names.iter().map(String::len).max().unwrap_or(0);
        let mut help = String::from("Available commands:");
        for (name, spec) in names.iter().zip(self.commands.iter()) {
            help.push_str(&format!("\n  {name:<width$}  {}", spec.description));
        }
        help
    }
}

/// The commands of an interactive chat session.
pub fn chat_commands<M: ChatModel>() -> CommandRegistry<ChatSession<M>> {
    CommandRegistry::new(vec![
        CommandSpec::new("exit", "Exit cloff", exit::<M>),
        CommandSpec::new(
            "clear",
            "Clear the screen and show the last reply again",
            clear::<M>,
        ),
        CommandSpec::new(
            "reset",
            "Forget the conversation and start over",
            reset::<M>,
        ),
        CommandSpec::new(
            "history",
            "Show every message in the conversation",
            history::<M>,
        ),
        CommandSpec::new("help", "Show this help message", help::<M>).with_aliases(&["?"]),
        CommandSpec::new(
            "stats",
            "Toggle timing statistics after each reply",
            stats::<M>,
        ),
    ])
}

fn exit<M: ChatModel>(session: &mut ChatSession<M>, _: &CommandRegistry<ChatSession<M>>) -> bool {
    session.farewell();
    true
}

fn clear<M: ChatModel>(session: &mut ChatSession<M>, _: &CommandRegistry<ChatSession<M>>) -> bool {
    session.clear_screen();
    false
}

fn reset<M: ChatModel>(session: &mut ChatSession<M>, _: &CommandRegistry<ChatSession<M>>) -> bool {
    session.reset();
    false
}

fn history<M: ChatModel>(
    session: &mut ChatSession<M>,
    _: &CommandRegistry<ChatSession<M>>,
) -> bool {
    session.print_history();
    false
}

fn help<M: ChatModel>(
    session: &mut ChatSession<M>,
    commands: &CommandRegistry<ChatSession<M>>,
) -> bool {
    session.print_help(&commands.help_text());
    false
}

fn stats<M: ChatModel>(session: &mut ChatSession<M>, _: &CommandRegistry<ChatSession<M>>) -> bool {
    session.toggle_stats();
    false
}
