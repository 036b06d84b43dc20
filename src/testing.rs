//! Scripted runner and prompter for unit tests.

use crate::error::{Result, StagelyError};
use crate::process::{CommandSpec, ProcessResult, ProcessRunner};
use crate::prompt::Prompter;
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&CommandSpec) -> ProcessResult + Send + Sync>;

/// Answers every command from a closure and records what was run
pub struct ScriptedRunner {
    respond: Responder,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CommandSpec) -> ProcessResult + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(stdout: &str) -> ProcessResult {
        ProcessResult {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn fail(code: i32, stderr: &str) -> ProcessResult {
        ProcessResult {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    /// Number of recorded commands whose line starts with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl ProcessRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessResult> {
        self.calls.lock().unwrap().push(command.clone());
        Ok((self.respond)(command))
    }
}

/// Answers prompts from a queue; `None` takes the default
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<String>>>,
    selection: Mutex<Option<Vec<String>>>,
    questions: Mutex<Vec<String>>,
    offered: Mutex<Vec<(Vec<String>, Vec<String>)>>,
}

impl ScriptedPrompter {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        Self {
            answers: Mutex::new(
                answers
                    .into_iter()
                    .map(|a| a.map(str::to_string))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Zones to pick at the multi-select prompt instead of the defaults
    pub fn with_selection(self, selection: &[&str]) -> Self {
        *self.selection.lock().unwrap() = Some(selection.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    /// Choices and defaults shown at each multi-select prompt
    pub fn offered(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.offered.lock().unwrap().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, message: &str, default: &str) -> Result<String> {
        self.questions.lock().unwrap().push(message.to_string());
        match self.answers.lock().unwrap().pop_front() {
            Some(Some(answer)) => Ok(answer),
            Some(None) => Ok(default.to_string()),
            None => Err(StagelyError::Prompt {
                reason: format!("no scripted answer for '{message}'"),
            }),
        }
    }

    fn multi_select(
        &self,
        message: &str,
        choices: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>> {
        self.questions.lock().unwrap().push(message.to_string());
        self.offered
            .lock()
            .unwrap()
            .push((choices.to_vec(), defaults.to_vec()));
        Ok(self
            .selection
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| defaults.to_vec()))
    }
}
