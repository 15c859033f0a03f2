//! Interactive terminal chat with a Gemini model.
//!
//! # Usage
//!
//! ```bash
//! # Model from the environment (or ./.env), settings from ./config.json
//! GEMINI_MODEL=gemini-2.0-flash cloff
//!
//! # Explicit model and settings file
//! cloff --model gemini-2.0-flash --config ~/.config/cloff.json
//!
//! # Disable colors (useful for piping output)
//! cloff --no-color
//! ```
//!
//! # Commands
//!
//! - `help` or `?` - Show available commands
//! - `clear` - Clear the screen and show the last reply
//! - `reset` - Start the conversation over
//! - `history` - Show the conversation so far
//! - `stats` - Toggle timing statistics
//! - `exit` - Exit the application

use std::path::Path;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use cloff::Gemini;
use cloff::chat::{ChatArgs, ChatConfig, ChatSession, load_env_file};

/// Environment variable holding the log filter.
const LOG_VARIABLE: &str = "CLOFF_LOG";

/// Optional `KEY=value` file read before the environment is consulted.
const ENV_FILE: &str = ".env";

/// Main entry point for cloff.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_VARIABLE).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = load_env_file(Path::new(ENV_FILE)) {
        eprintln!("cloff: {err}");
        std::process::exit(1);
    }

    let (args, free) = ChatArgs::from_command_line_relaxed("cloff [OPTIONS]");
    if !free.is_empty() {
        eprintln!("unexpected arguments: {}", free.join(" "));
        std::process::exit(1);
    }
    let config = match ChatConfig::from_args(args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cloff: {err}");
            std::process::exit(1);
        }
    };
    let client = match Gemini::new(config.model.clone(), None) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("cloff: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!(model = client.model(), "starting chat");

    let mut session = ChatSession::new(client, config);
    let mut rl = DefaultEditor::new()?;

    // Ctrl+C while a reply streams cancels the turn.
    let interrupt = session.interrupt();
    ctrlc::set_handler(move || interrupt.raise())?;

    session.clear_screen();
    loop {
        match rl.readline(&session.prompt()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                if session.handle_line(&line).await {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                session.interrupted();
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("cloff: input error: {err}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
