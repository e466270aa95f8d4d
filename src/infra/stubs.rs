use std::{collections::VecDeque, sync::Mutex};

use crate::infra::console::{LogSink, PauseSource};

#[cfg(test)]
use anyhow::Result;

#[cfg(test)]
use crate::infra::{config::AppConfig, contracts::ConfigAdapter};

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct StubConfigAdapter;

#[cfg(test)]
impl ConfigAdapter for StubConfigAdapter {
    fn load(&self) -> Result<AppConfig> {
        Ok(AppConfig::default())
    }
}

/// Keeps every logged line in memory.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: Option<&str>) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.unwrap_or_default().to_owned());
        }
    }
}

/// Answers pause prompts from a fixed script, then reports end of input.
#[cfg_attr(not(test), allow(dead_code))]
#[derive(Debug, Default)]
pub struct ScriptedPause {
    answers: Mutex<VecDeque<String>>,
}

#[cfg_attr(not(test), allow(dead_code))]
impl ScriptedPause {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }
}

impl PauseSource for ScriptedPause {
    fn read_line(&self) -> Option<String> {
        self.answers.lock().ok()?.pop_front()
    }
}
