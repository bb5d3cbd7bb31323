//! Output rendering for the advisor chat.
//!
//! The [`Renderer`] trait receives transcript updates as they happen: a reply starting
//! (the "thinking" indicator), each streamed fragment, the end of the reply, and the
//! fallback notice when a reply cannot be delivered.

use std::io::{self, Stdout, Write};

use crate::transcript::ChatMessage;
use crate::types::Role;

/// Label shown while a reply placeholder waits for its first fragment.
pub const THINKING_LABEL: &str = "Analyzing...";

/// ANSI escape code for dim text (used for the thinking indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the thinking indicator).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the advisor label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for yellow text (used for fallback notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Return to column zero and clear the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Trait for rendering transcript updates.
///
/// Implementations decide how the thinking indicator and streamed text look; the
/// controller only reports what happened.
pub trait Renderer: Send {
    /// Print a complete message, e.g. the greeting or a history listing.
    fn print_message(&mut self, message: &ChatMessage);

    /// A reply placeholder was opened; show the thinking indicator.
    fn start_reply(&mut self);

    /// Print a chunk of reply text.
    ///
    /// This is called incrementally as fragments are streamed.  The first call replaces the
    /// thinking indicator.
    fn print_fragment(&mut self, text: &str);

    /// The reply ended, successfully or not.
    fn finish_reply(&mut self);

    /// Print the fallback notice appended after a failed reply.
    fn print_fallback(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Called when the reply is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// Writes to stdout unless constructed with [`PlainTextRenderer::with_writer`].
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    thinking: bool,
    line_start: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer over an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            thinking: false,
            line_start: true,
        }
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        self.line_start = text.ends_with('\n');
        let _ = self.out.flush();
    }

    fn styled(&mut self, style: &str, text: &str) {
        if self.use_color {
            self.write(&format!("{style}{text}{ANSI_RESET}"));
        } else {
            self.write(text);
        }
    }

    fn label(&mut self, role: Role) {
        match role {
            Role::User => self.styled(ANSI_GREEN, "You: "),
            Role::Model => self.styled(ANSI_CYAN, "Advisor: "),
        }
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }

    fn clear_thinking(&mut self) {
        if !self.thinking {
            return;
        }
        self.thinking = false;
        if self.use_color {
            self.write(ANSI_CLEAR_LINE);
        } else {
            self.write("\n");
        }
        self.label(Role::Model);
    }
}

impl Default for PlainTextRenderer<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &ChatMessage) {
        self.end_line();
        self.label(message.role);
        self.write(&message.text);
        self.end_line();
    }

    fn start_reply(&mut self) {
        self.end_line();
        self.thinking = true;
        if self.use_color {
            let label = format!("{ANSI_DIM}{ANSI_ITALIC}{THINKING_LABEL}{ANSI_RESET}");
            self.write(&label);
        } else {
            self.write(THINKING_LABEL);
        }
    }

    fn print_fragment(&mut self, text: &str) {
        self.clear_thinking();
        self.write(text);
    }

    fn finish_reply(&mut self) {
        if self.thinking {
            self.thinking = false;
            if self.use_color {
                self.write(ANSI_CLEAR_LINE);
            } else {
                self.write("\n");
            }
            return;
        }
        self.end_line();
    }

    fn print_fallback(&mut self, text: &str) {
        self.end_line();
        self.label(Role::Model);
        self.styled(ANSI_YELLOW, text);
        self.write("\n");
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write("\n");
    }

    fn print_interrupted(&mut self) {
        self.clear_thinking();
        self.end_line();
        self.write("[interrupted]\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    fn render(f: impl FnOnce(&mut PlainTextRenderer<Vec<u8>>)) -> String {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        f(&mut renderer);
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn streamed_reply() {
        let out = render(|r| {
            r.start_reply();
            r.print_fragment("CGPA is ");
            r.print_fragment("a weighted average.");
            r.finish_reply();
        });
        assert_eq!(out, "Analyzing...\nAdvisor: CGPA is a weighted average.\n");
    }

    #[test]
    fn empty_reply_clears_indicator() {
        let out = render(|r| {
            r.start_reply();
            r.finish_reply();
        });
        assert_eq!(out, "Analyzing...\n");
    }

    #[test]
    fn fallback_after_partial_reply() {
        let out = render(|r| {
            r.start_reply();
            r.print_fragment("partial");
            r.finish_reply();
            r.print_fallback("Please try again later.");
        });
        assert_eq!(
            out,
            "Analyzing...\nAdvisor: partial\nAdvisor: Please try again later.\n"
        );
    }

    #[test]
    fn messages_are_labelled() {
        let mut transcript = Transcript::with_greeting("Hello!");
        transcript.push_user("hi");
        let out = render(|r| {
            for message in transcript.messages() {
                r.print_message(message);
            }
        });
        assert_eq!(out, "Advisor: Hello!\nYou: hi\n");
    }

    #[test]
    fn color_clears_indicator_in_place() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.start_reply();
        renderer.print_fragment("x");
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(out.contains(THINKING_LABEL));
        assert!(out.contains(ANSI_CLEAR_LINE));
        assert!(out.ends_with('x'));
    }

    #[test]
    fn interrupted_reply() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        assert!(!renderer.should_interrupt());
        renderer.start_reply();
        renderer.print_fragment("Plan ");
        renderer.print_interrupted();
        let out = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(out, "Analyzing...\nAdvisor: Plan \n[interrupted]\n");
    }
}
