//! Scripted runner for tests
//!
//! [`MockRunner`] never spawns a process. It answers each invocation from a
//! list of prefix rules and records every call so tests can assert on the
//! exact order of commands.

use crate::context::{Invocation, Runner};
use crate::types::CommandOutput;
use anyhow::Result;
use std::cell::RefCell;

/// A command runner that replays scripted responses
///
/// Unmatched invocations succeed with empty output. When several rules
/// match, the most recently added one wins.
#[derive(Debug, Default)]
pub struct MockRunner {
    rules: RefCell<Vec<(String, CommandOutput)>>,
    calls: RefCell<Vec<Invocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations whose command line starts with `prefix`
    pub fn respond(&self, prefix: &str, output: CommandOutput) -> &Self {
        self.rules.borrow_mut().push((prefix.to_string(), output));
        self
    }

    /// Make invocations starting with `prefix` exit unsuccessfully
    pub fn fail(&self, prefix: &str, stderr: &str) -> &Self {
        self.respond(prefix, CommandOutput::failed(stderr))
    }

    /// Every invocation seen so far, in order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Command lines of every invocation seen so far
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(Invocation::command_line).collect()
    }

    /// Whether any invocation started with `prefix`
    pub fn was_called(&self, prefix: &str) -> bool {
        self.command_lines().iter().any(|c| c.starts_with(prefix))
    }

    /// Index of the first invocation starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.command_lines().iter().position(|c| c.starts_with(prefix))
    }
}

impl Runner for MockRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(invocation.clone());
        let line = invocation.command_line();
        let output = self
            .rules
            .borrow()
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map_or_else(|| CommandOutput::ok(""), |(_, output)| output.clone());
        Ok(output)
    }
}
