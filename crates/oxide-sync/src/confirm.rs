//! Operator confirmation before a rebuild.

use std::io::{self, BufRead, Write};

use oxide_ddl::diff::SchemaDelta;

use crate::error::Result;

/// Decides whether a table may be rebuilt.
pub trait Confirm {
    /// Shows `delta` and returns true if the rebuild may go ahead.
    fn confirm(&mut self, delta: &SchemaDelta) -> Result<bool>;
}

/// Asks on a terminal.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl Prompt<io::StdinLock<'static>, io::Stderr> {
    /// Reads answers from stdin and writes questions to stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    /// Creates a prompt over the given streams.
    pub const fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for Prompt<R, W> {
    fn confirm(&mut self, delta: &SchemaDelta) -> Result<bool> {
        write!(self.output, "{delta}")?;
        write!(
            self.output,
            "Table '{}' must be rebuilt. A backup has been made. Proceed? [y/N] ",
            delta.table
        )?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim();
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}

/// Gives the same answer every time.
#[derive(Debug, Clone, Copy)]
pub struct Always(pub bool);

impl Confirm for Always {
    fn confirm(&mut self, _delta: &SchemaDelta) -> Result<bool> {
        Ok(self.0)
    }
}
