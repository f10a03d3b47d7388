//! # Structured Step Descriptions
//!
//! A pipeline step is a well-typed command record rather than an opaque
//! shell string: an ordered pipe chain of program invocations plus optional
//! file redirections. That keeps construction safe (arguments are always
//! fully substituted values, never re-parsed text) and makes step equality
//! testable. `Display` renders the exact shell-equivalent form used for
//! diagnostics and the run log.

use std::fmt;
use std::path::{Path, PathBuf};

/// One external program invocation: a program name plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
}

impl Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

/// One pipeline unit, produced once by the builder and consumed once by the
/// executor, never mutated.
///
/// The stdin and stderr redirections apply to the first stage of the pipe
/// chain, the stdout redirection to the last; that is the only shape the
/// workflow needs. A best-effort step may fail without aborting the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    stages: Vec<Command>,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    best_effort: bool,
}

impl Step {
    pub fn cmd(command: Command) -> Self {
        Self {
            stages: vec![command],
            stdin: None,
            stdout: None,
            stderr: None,
            best_effort: false,
        }
    }

    /// Append a stage fed by the previous stage's stdout.
    pub fn pipe(mut self, command: Command) -> Self {
        self.stages.push(command);
        self
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    /// Mark this step's failure as non-fatal to the run.
    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    pub fn stdin(&self) -> Option<&Path> {
        self.stdin.as_deref()
    }

    pub fn stdout(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    pub fn stderr(&self) -> Option<&Path> {
        self.stderr.as_deref()
    }

    pub fn is_best_effort(&self) -> bool {
        self.best_effort
    }
}

fn shell_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    if word.is_empty() || word.contains(char::is_whitespace) {
        write!(f, "\"{word}\"")
    } else {
        f.write_str(word)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        shell_word(f, &self.program)?;
        for arg in &self.args {
            f.write_str(" ")?;
            shell_word(f, arg)?;
        }
        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{stage}")?;
            if i == 0 {
                if let Some(path) = &self.stdin {
                    write!(f, " < {}", path.display())?;
                }
                if let Some(path) = &self.stderr {
                    write!(f, " 2> {}", path.display())?;
                }
            }
        }
        if let Some(path) = &self.stdout {
            write!(f, " > {}", path.display())?;
        }
        Ok(())
    }
}
