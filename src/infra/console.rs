//! User-facing output and the optional interactive pause point.
//!
//! Call sites never print directly; they go through a [`Console`] handed to
//! them, so a harness can capture output and point the template lookup at a
//! different project root.

use std::{
    fmt::Display,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

const NULL_TEXT: &str = "(null)";

pub trait LogSink: Send + Sync {
    fn write_line(&self, line: Option<&str>);
}

pub trait PauseSource: Send + Sync {
    fn read_line(&self) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: Option<&str>) {
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{}", line.unwrap_or_default());
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPause;

impl PauseSource for StdinPause {
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_owned()),
        }
    }
}

#[derive(Clone)]
pub struct Console {
    sink: Arc<dyn LogSink>,
    pause: Arc<dyn PauseSource>,
    project_root: PathBuf,
    is_running_mocked: bool,
}

impl Default for Console {
    fn default() -> Self {
        Self {
            sink: Arc::new(StdoutSink),
            pause: Arc::new(StdinPause),
            project_root: PathBuf::from("."),
            is_running_mocked: false,
        }
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("project_root", &self.project_root)
            .field("is_running_mocked", &self.is_running_mocked)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(not(test), allow(dead_code))]
impl Console {
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_pause(mut self, pause: Arc<dyn PauseSource>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_mocked(mut self, mocked: bool) -> Self {
        self.is_running_mocked = mocked;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn is_running_mocked(&self) -> bool {
        self.is_running_mocked
    }

    pub fn log(&self, message: &str) {
        self.sink.write_line(Some(message));
    }

    /// Logs the rendered value, or `(null)` when there is none.
    pub fn log_value<T: Display + ?Sized>(&self, value: Option<&T>) {
        match value {
            Some(value) => self.sink.write_line(Some(&value.to_string())),
            None => self.sink.write_line(Some(NULL_TEXT)),
        }
    }

    pub fn log_empty(&self) {
        self.log("");
    }

    pub fn read_line(&self) -> Option<String> {
        self.pause.read_line()
    }
}
