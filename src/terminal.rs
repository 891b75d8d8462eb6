use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::errors::RentClawResult;

/// One line typed by the user, or the signal to stop (Ctrl-C, Ctrl-D,
/// closed input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    Line(String),
    Interrupted,
}

/// Where the dialogue reads from and writes to. Blocking by nature.
pub trait Terminal {
    fn read_line(&mut self, prompt: &str) -> UserInput;
    fn show(&mut self, text: &str);
}

pub struct RustylineTerminal {
    editor: DefaultEditor,
}

impl RustylineTerminal {
    pub fn new() -> RentClawResult<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl Terminal for RustylineTerminal {
    fn read_line(&mut self, prompt: &str) -> UserInput {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                UserInput::Line(line)
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => UserInput::Interrupted,
            Err(e) => {
                tracing::error!(error = %e, "terminal read failed");
                UserInput::Interrupted
            }
        }
    }

    fn show(&mut self, text: &str) {
        println!("{text}\n");
    }
}
