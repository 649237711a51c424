//! Output streams for commands.
//!
//! [`OutputWrapper`] is the stream a command writes its results, help and
//! errors to. It wraps one of several destinations:
//!
//! - `Stdout` / `Stderr` - the process streams
//! - `File` - append to a file
//! - `Buffer` - an in-memory capture, used by tests and by callers that want
//!   the output of `call_command` as a string
//!
//! Like the streams of the management framework it stands in for, every
//! [`write`](OutputWrapper::write) ends with a newline unless the message
//! already does.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use console::{Style, Term};

/// Destination for command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDestination {
    Stdout,
    Stderr,
    /// Append to a file.
    File(PathBuf),
    /// Capture in memory.
    Buffer,
}

#[derive(Debug)]
struct Sink {
    destination: OutputDestination,
    captured: String,
}

/// A command output stream. Clones share the same destination and buffer.
#[derive(Debug, Clone)]
pub struct OutputWrapper {
    sink: Rc<RefCell<Sink>>,
    ending: &'static str,
}

impl Default for OutputWrapper {
    fn default() -> Self {
        Self::stdout()
    }
}

impl OutputWrapper {
    pub fn new(destination: OutputDestination) -> Self {
        Self {
            sink: Rc::new(RefCell::new(Sink {
                destination,
                captured: String::new(),
            })),
            ending: "\n",
        }
    }

    pub fn stdout() -> Self {
        Self::new(OutputDestination::Stdout)
    }

    pub fn stderr() -> Self {
        Self::new(OutputDestination::Stderr)
    }

    /// An in-memory stream; read it back with [`contents`](Self::contents).
    pub fn buffer() -> Self {
        Self::new(OutputDestination::Buffer)
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(OutputDestination::File(path.into()))
    }

    pub fn destination(&self) -> OutputDestination {
        self.sink.borrow().destination.clone()
    }

    /// True when writing to an interactive terminal.
    pub fn is_terminal(&self) -> bool {
        match self.sink.borrow().destination {
            OutputDestination::Stdout => Term::stdout().is_term(),
            OutputDestination::Stderr => Term::stderr().is_term(),
            OutputDestination::File(_) | OutputDestination::Buffer => false,
        }
    }

    /// Writes `msg`, adding a trailing newline if it has none.
    pub fn write(&self, msg: &str) {
        if msg.ends_with(self.ending) {
            self.write_raw(msg);
        } else {
            self.write_raw(&format!("{}{}", msg, self.ending));
        }
    }

    /// Writes `msg` with `style` applied when `color` is set.
    pub fn write_styled(&self, msg: &str, style: &Style, color: bool) {
        if color {
            self.write(&style.apply_to(msg).force_styling(true).to_string());
        } else {
            self.write(msg);
        }
    }

    /// Writes `msg` exactly as given.
    pub fn write_raw(&self, msg: &str) {
        let mut guard = self.sink.borrow_mut();
        let sink = &mut *guard;
        let result = match &sink.destination {
            OutputDestination::Stdout => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(msg.as_bytes())
            }
            OutputDestination::Stderr => {
                let stderr = std::io::stderr();
                let mut handle = stderr.lock();
                handle.write_all(msg.as_bytes())
            }
            OutputDestination::File(path) => append_to(path, msg),
            OutputDestination::Buffer => {
                sink.captured.push_str(msg);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to write command output");
        }
    }

    pub fn flush(&self) {
        let result = match self.sink.borrow().destination {
            OutputDestination::Stdout => std::io::stdout().flush(),
            OutputDestination::Stderr => std::io::stderr().flush(),
            OutputDestination::File(_) | OutputDestination::Buffer => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to flush command output");
        }
    }

    /// Everything captured so far (empty unless this is a buffer).
    pub fn contents(&self) -> String {
        self.sink.borrow().captured.clone()
    }

    /// Flushes the stream when the returned guard is dropped.
    pub fn flush_on_drop(&self) -> FlushGuard {
        FlushGuard {
            output: self.clone(),
        }
    }
}

/// Flushes its stream on drop, on every exit path.
#[must_use = "the stream is flushed as soon as the guard is dropped"]
pub struct FlushGuard {
    output: OutputWrapper,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        self.output.flush();
    }
}

fn append_to(path: &Path, content: &str) -> std::io::Result<()> {
    validate_path(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())
}

/// Validates that a file path's parent directory exists.
fn validate_path(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Parent directory does not exist: {}", parent.display()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_adds_ending() {
        let out = OutputWrapper::buffer();
        out.write("hello");
        out.write("world\n");
        assert_eq!(out.contents(), "hello\nworld\n");
    }

    #[test]
    fn test_clones_share_buffer() {
        let out = OutputWrapper::buffer();
        let alias = out.clone();
        alias.write_raw("x");
        assert_eq!(out.contents(), "x");
        assert!(!out.is_terminal());
    }

    #[test]
    fn test_styled_without_color_is_plain() {
        let out = OutputWrapper::buffer();
        out.write_styled("oops", &Style::new().red(), false);
        assert_eq!(out.contents(), "oops\n");

        let colored = OutputWrapper::buffer();
        colored.write_styled("oops", &Style::new().red(), true);
        assert!(colored.contents().contains("\u{1b}["));
    }

    #[test]
    fn test_write_to_file_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("output.txt");
        let out = OutputWrapper::file(&file_path);

        out.write("one");
        out.write("two");

        let content = std::fs::read_to_string(file_path).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }

    #[test]
    fn test_write_to_invalid_path_is_logged_not_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("missing").join("output.txt");
        let out = OutputWrapper::file(&file_path);

        out.write("hello");
        assert!(!file_path.exists());
    }

    #[test]
    fn test_flush_guard_runs() {
        let out = OutputWrapper::buffer();
        {
            let _guard = out.flush_on_drop();
            out.write("inside");
        }
        assert_eq!(out.contents(), "inside\n");
    }
}
