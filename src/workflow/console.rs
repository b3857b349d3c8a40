//! Operator prompts.
//!
//! All interactive input goes through [`Console`], which reads from any
//! `BufRead` and writes to any `Write` so the interactive steps can be
//! driven from tests.

use std::io::{self, BufRead, Write};

/// Line-oriented operator console.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    /// Console on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print a line.
    pub fn say(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", text.as_ref())
    }

    /// Print text without a trailing newline.
    pub fn print(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        write!(self.output, "{}", text.as_ref())?;
        self.output.flush()
    }

    /// Ask a question and read one trimmed line. `None` at end of input.
    pub fn prompt(&mut self, question: &str) -> io::Result<Option<String>> {
        write!(self.output, "{} ", question)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Ask a `[Y/n]` question. Empty input means yes; end of input means no.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        loop {
            let Some(answer) = self.prompt(&format!("{} [Y/n]", question))? else {
                return Ok(false);
            };
            match answer.to_lowercase().as_str() {
                "" | "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.")?,
            }
        }
    }

    /// Consume the console and return the output sink.
    pub fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_prompt_reads_trimmed_lines() {
        let mut c = console("  3 \nq\n");
        assert_eq!(c.prompt("Pick:").unwrap().as_deref(), Some("3"));
        assert_eq!(c.prompt("Pick:").unwrap().as_deref(), Some("q"));
        assert_eq!(c.prompt("Pick:").unwrap(), None);

        let out = String::from_utf8(c.into_output()).unwrap();
        assert!(out.starts_with("Pick: "));
    }

    #[test]
    fn test_confirm() {
        let mut c = console("\nn\nmaybe\nYES\n");
        assert!(c.confirm("Create issue?").unwrap());
        assert!(!c.confirm("Create issue?").unwrap());
        assert!(c.confirm("Create issue?").unwrap());
        assert!(!c.confirm("Create issue?").unwrap());

        let out = String::from_utf8(c.into_output()).unwrap();
        assert!(out.contains("Create issue? [Y/n]"));
        assert!(out.contains("Please answer y or n."));
    }
}
