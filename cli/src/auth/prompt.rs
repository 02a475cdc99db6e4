//! Terminal interaction used by the authentication flows and the shell.

use std::io::{BufRead, BufReader};
use std::sync::Mutex;

use console::Term;

use crate::error::{PatError, Result};

/// Line-oriented user interaction.
#[cfg_attr(test, mockall::automock)]
pub trait UserPrompt: Send + Sync {
    /// Prints a message on its own line.
    fn show(&self, message: &str) -> Result<()>;

    /// Prints `prompt` and reads one line of echoed input.
    fn read_line(&self, prompt: &str) -> Result<String>;

    /// Prints `prompt` and reads one line without echoing it.
    fn read_secret(&self, prompt: &str) -> Result<String>;
}

type LineSource = Mutex<Box<dyn BufRead + Send>>;

/// [`UserPrompt`] on the process's terminal.
///
/// When stdout is not attended (`azpat -i | tee log`) `console` cannot read
/// keys, so lines come from stdin instead and end of input cancels.
pub struct TerminalPrompt {
    term: Term,
    piped: Option<LineSource>,
}

impl TerminalPrompt {
    /// Prompt writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        let term = Term::stdout();
        if term.is_term() {
            Self { term, piped: None }
        } else {
            Self::with_input(term, BufReader::new(std::io::stdin()))
        }
    }

    /// Prompt that writes to `term` and reads lines from `input`.
    #[must_use]
    pub fn with_input(term: Term, input: impl BufRead + Send + 'static) -> Self {
        Self {
            term,
            piped: Some(Mutex::new(Box::new(input))),
        }
    }

    fn write_prompt(&self, prompt: &str) -> Result<()> {
        self.term.write_str(prompt)?;
        self.term.flush()?;
        Ok(())
    }
}

/// Next line from `source`, trimmed. A read of zero bytes is end of input.
fn next_line(source: &LineSource) -> Result<String> {
    let mut reader = source
        .lock()
        .map_err(|_| PatError::Io(std::io::Error::other("input reader poisoned")))?;
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(PatError::Cancelled);
    }
    Ok(line.trim().to_string())
}

impl UserPrompt for TerminalPrompt {
    fn show(&self, message: &str) -> Result<()> {
        self.term.write_line(message)?;
        Ok(())
    }

    fn read_line(&self, prompt: &str) -> Result<String> {
        self.write_prompt(prompt)?;
        if let Some(source) = &self.piped {
            return next_line(source);
        }
        match self.term.read_line() {
            Ok(line) => Ok(line.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(PatError::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    fn read_secret(&self, prompt: &str) -> Result<String> {
        if self.piped.is_some() {
            return Err(PatError::TerminalRequired);
        }
        self.write_prompt(prompt)?;
        match self.term.read_secure_line() {
            Ok(line) => Ok(line),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Err(PatError::Cancelled),
            Err(e) => Err(e.into()),
        }
    }
}
