//! Scripted command runner for tests.

use crate::backend::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted response.
#[derive(Debug, Clone)]
pub enum Reply {
    Output(CommandOutput),
    Timeout,
    NotFound,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Reply::Output(CommandOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        })
    }

    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Reply::Output(CommandOutput {
            stderr: stderr.to_string(),
            exit_code,
            ..Default::default()
        })
    }
}

struct Rule {
    prefix: String,
    replies: VecDeque<Reply>,
}

/// Replays scripted replies and records every invocation.
///
/// Replies are chosen by the longest rule prefix matching the command line.
/// The last reply of a rule repeats. Unscripted commands report not-found.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<I: IntoIterator<Item = Reply>>(&self, prefix: &str, replies: I) {
        self.rules.lock().unwrap().push(Rule {
            prefix: prefix.to_string(),
            replies: replies.into_iter().collect(),
        });
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every invocation, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    fn next_reply(&self, line: &str) -> Option<Reply> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .filter(|r| line.starts_with(&r.prefix))
            .max_by_key(|r| r.prefix.len())?;
        if rule.replies.len() > 1 {
            rule.replies.pop_front()
        } else {
            rule.replies.front().cloned()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        match self.next_reply(&spec.display()) {
            Some(Reply::Output(output)) => Ok(output),
            Some(Reply::Timeout) => Err(Error::Timeout {
                command: spec.display(),
                timeout: spec.timeout,
            }),
            Some(Reply::NotFound) | None => Err(Error::CommandNotFound(spec.program.clone())),
        }
    }
}
