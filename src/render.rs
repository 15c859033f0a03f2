//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so the session never writes to the
//! terminal directly.  The default implementation paints role tags and text with 24-bit ANSI
//! colors taken from the configured [`Palette`].

use std::io::{self, Write};
use std::time::Duration;

use crate::chat::{Palette, Rgb};
use crate::types::Role;

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape codes that clear the screen and home the cursor.
const ANSI_CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Color of timing statistics and informational lines.
pub const GREY: Rgb = Rgb(179, 179, 179);

/// Trait for rendering chat output.
pub trait Renderer: Send {
    /// Print a whole message under its role tag.
    fn print_message(&mut self, role: Role, text: &str);

    /// Called before the first fragment of a streamed reply.
    fn start_reply(&mut self);

    /// Print one fragment of a streamed reply.
    fn print_fragment(&mut self, text: &str);

    /// Called once a streamed reply is complete.
    ///
    /// `elapsed` is set when timing statistics are enabled.
    fn finish_reply(&mut self, elapsed: Option<Duration>);

    /// Called when a reply stops before completing.
    fn abort_reply(&mut self);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Clear the terminal.
    fn clear_screen(&mut self);

    /// The input prompt shown before each line the human types.
    fn prompt(&self) -> String;
}

/// Renderer that writes ANSI-colored text to a pair of writers (stdout and stderr by default).
pub struct TerminalRenderer {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    palette: Palette,
    use_color: bool,
    in_reply: bool,
}

impl TerminalRenderer {
    /// Creates a renderer on stdout/stderr.
    pub fn new(palette: Palette, use_color: bool) -> Self {
        Self::with_writers(
            Box::new(io::stdout()),
            Box::new(io::stderr()),
            palette,
            use_color,
        )
    }

    /// Creates a renderer on arbitrary writers.
    pub fn with_writers(
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
        palette: Palette,
        use_color: bool,
    ) -> Self {
        Self {
            out,
            err,
            palette,
            use_color,
            in_reply: false,
        }
    }

    /// Returns whether ANSI colors are emitted.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn paint(&self, text: &str, color: Rgb) -> String {
        if self.use_color {
            color.paint(text)
        } else {
            text.to_string()
        }
    }

    fn tag(&self, role: Role) -> String {
        let color = match role {
            Role::System => GREY,
            Role::Human => self.palette.human.tag,
            Role::Assistant => self.palette.cloff.tag,
        };
        self.paint(role.tag(), color)
    }

    fn body(&self, role: Role, text: &str) -> String {
        let color = match role {
            Role::System => GREY,
            Role::Human => self.palette.human.text,
            Role::Assistant => self.palette.cloff.text,
        };
        self.paint(text, color)
    }

    fn write_out(&mut self, text: &str) {
        // Write failures are ignored.
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
    }
}

impl Renderer for TerminalRenderer {
    fn print_message(&mut self, role: Role, text: &str) {
        let line = format!("{} {}\n", self.tag(role), self.body(role, text));
        self.write_out(&line);
    }

    fn start_reply(&mut self) {
        let tag = format!("\n{} ", self.tag(Role::Assistant));
        self.write_out(&tag);
        self.in_reply = true;
    }

    fn print_fragment(&mut self, text: &str) {
        let text = self.body(Role::Assistant, text);
        self.write_out(&text);
    }

    fn finish_reply(&mut self, elapsed: Option<Duration>) {
        if let Some(elapsed) = elapsed {
            let stats = self.paint(&format!(" ({:.2}s)", elapsed.as_secs_f64()), GREY);
            self.write_out(&stats);
        }
        self.write_out("\n\n");
        self.in_reply = false;
    }

    fn abort_reply(&mut self) {
        if self.in_reply {
            if self.use_color {
                self.write_out(ANSI_RESET);
            }
            self.write_out("\n");
            self.in_reply = false;
        }
    }

    fn print_info(&mut self, info: &str) {
        let info = self.paint(info, GREY);
        self.write_out(&format!("{info}\n"));
    }

    fn print_error(&mut self, error: &str) {
        let _ = writeln!(self.err, "\nError: {error}");
        let _ = self.err.flush();
    }

    fn clear_screen(&mut self) {
        self.write_out(ANSI_CLEAR_SCREEN);
    }

    fn prompt(&self) -> String {
        format!("  {} ", self.tag(Role::Human))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn renderer(use_color: bool) -> (TerminalRenderer, Capture) {
        let capture = Capture::default();
        let renderer = TerminalRenderer::with_writers(
            Box::new(capture.clone()),
            Box::new(capture.clone()),
            Palette::default(),
            use_color,
        );
        (renderer, capture)
    }

    #[test]
    fn plain_message() {
        let (mut renderer, capture) = renderer(false);
        renderer.print_message(Role::Assistant, "Hello!");
        assert_eq!(capture.contents(), "[cloff] Hello!\n");
    }

    #[test]
    fn colored_message_uses_palette() {
        let (mut renderer, capture) = renderer(true);
        renderer.print_message(Role::Assistant, "Hello!");
        let palette = Palette::default();
        let expected = format!(
            "{} {}\n",
            palette.cloff.tag.paint("[cloff]"),
            palette.cloff.text.paint("Hello!")
        );
        assert_eq!(capture.contents(), expected);
    }

    #[test]
    fn streamed_reply_with_stats() {
        let (mut renderer, capture) = renderer(false);
        renderer.start_reply();
        renderer.print_fragment("Hel");
        renderer.print_fragment("lo");
        renderer.finish_reply(Some(Duration::from_millis(1250)));
        assert_eq!(capture.contents(), "\n[cloff] Hello (1.25s)\n\n");
    }

    #[test]
    fn streamed_reply_without_stats() {
        let (mut renderer, capture) = renderer(false);
        renderer.start_reply();
        renderer.print_fragment("Hi");
        renderer.finish_reply(None);
        assert_eq!(capture.contents(), "\n[cloff] Hi\n\n");
    }

    #[test]
    fn abort_only_after_start() {
        let (mut renderer, capture) = renderer(false);
        renderer.abort_reply();
        assert_eq!(capture.contents(), "");
        renderer.start_reply();
        renderer.print_fragment("par");
        renderer.abort_reply();
        assert_eq!(capture.contents(), "\n[cloff] par\n");
    }

    #[test]
    fn prompt_tags_human() {
        let (renderer, _) = renderer(false);
        assert_eq!(renderer.prompt(), "  [you] ");
    }

    #[test]
    fn error_goes_to_error_writer() {
        let (mut renderer, capture) = renderer(false);
        renderer.print_error("boom");
        assert_eq!(capture.contents(), "\nError: boom\n");
    }
}
