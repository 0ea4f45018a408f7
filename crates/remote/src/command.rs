//! Remote command construction.

use std::borrow::Cow;
use std::fmt;

/// A command to run on a device, as a program plus discrete arguments.
///
/// Arguments are never concatenated into a shell string by callers. The SSH
/// transport renders the argv with [`quote_arg`] so every argument reaches
/// the remote program intact; the local transport executes the argv as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    program: String,
    args: Vec<String>,
}

impl RemoteCommand {
    /// Starts a command running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
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

    /// Program followed by its arguments.
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str))
    }

    /// Renders the command for a POSIX shell, quoting each word.
    pub fn to_shell(&self) -> String {
        self.argv().map(quote_arg).collect::<Vec<_>>().join(" ")
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell())
    }
}

/// Quotes one word for a POSIX shell.
///
/// Words made only of characters the shell never interprets pass through
/// unchanged; anything else is wrapped in single quotes, with embedded
/// single quotes written as `'\''`.
pub fn quote_arg(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}

/// Captured output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status, when the transport reports one.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Output with the given stdout and empty stderr.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Output carrying an error message on stderr.
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(1),
        }
    }

    /// Whether the command wrote anything besides whitespace to stderr.
    ///
    /// Deploy steps treat this as the failure signal regardless of the exit
    /// status.
    pub fn has_error_output(&self) -> bool {
        !self.stderr.trim().is_empty()
    }
}
