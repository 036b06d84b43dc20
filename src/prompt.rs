//! Interactive questions.
//!
//! Answers are passed through as typed. Only an empty answer is replaced, by
//! the question's default.

use crate::error::{Result, StagelyError};
use std::io::{BufRead, Write};

/// Default AWS cli profile
pub const DEFAULT_PROFILE: &str = "default";
/// Default short cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "mycluster";
/// Default DNS hosted zone (gossip-based cluster)
pub const DEFAULT_HOSTED_ZONE: &str = "k8s.local";
/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Source of user answers
pub trait Prompter {
    /// Ask a free-text question; an empty answer yields `default`
    fn input(&self, message: &str, default: &str) -> Result<String>;

    /// Pick any number of `choices`; an empty answer yields `defaults`
    fn multi_select(
        &self,
        message: &str,
        choices: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>>;
}

/// Reads answers from stdin
#[derive(Debug, Clone, Default)]
pub struct TerminalPrompter;

impl TerminalPrompter {
    /// Create a terminal prompter
    pub fn new() -> Self {
        Self
    }

    fn read_answer(prompt: &str) -> Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{prompt}")?;
        stdout.flush()?;

        let mut input = String::new();
        let read = std::io::stdin().lock().read_line(&mut input)?;
        if read == 0 {
            return Err(StagelyError::Prompt {
                reason: "stdin closed before an answer was given".to_string(),
            });
        }
        Ok(input.trim().to_string())
    }
}

impl Prompter for TerminalPrompter {
    fn input(&self, message: &str, default: &str) -> Result<String> {
        let answer = Self::read_answer(&format!("? {message} ({default}) "))?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }

    fn multi_select(
        &self,
        message: &str,
        choices: &[String],
        defaults: &[String],
    ) -> Result<Vec<String>> {
        println!("? {message}");
        if choices.is_empty() {
            println!("  (nothing to choose from)");
            return Ok(Vec::new());
        }

        for (i, choice) in choices.iter().enumerate() {
            let mark = if defaults.contains(choice) { "x" } else { " " };
            println!("  [{mark}] {}) {choice}", i + 1);
        }

        let answer = Self::read_answer("  Numbers or names, separated by commas: ")?;
        Ok(parse_selection(&answer, choices, defaults))
    }
}

/// Turn a multi-select answer into the chosen values.
///
/// Tokens are 1-based indices into `choices` or literal values; tokens that
/// are neither are kept verbatim.
pub fn parse_selection(answer: &str, choices: &[String], defaults: &[String]) -> Vec<String> {
    let tokens: Vec<&str> = answer
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return defaults.to_vec();
    }

    let mut selected: Vec<String> = Vec::new();
    for token in tokens {
        let value = token
            .parse::<usize>()
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| choices.get(i))
            .cloned()
            .unwrap_or_else(|| token.to_string());
        if !selected.contains(&value) {
            selected.push(value);
        }
    }
    selected
}

/// Answers to the cluster questions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAnswers {
    /// Short cluster name
    pub name: String,
    /// DNS hosted zone
    pub hosted_zone: String,
    /// AWS region
    pub region: String,
}

/// Ask which AWS cli profile to use
pub fn ask_profile<P: Prompter>(prompter: &P) -> Result<String> {
    prompter.input("Enter the AWS cli profile you want to use.", DEFAULT_PROFILE)
}

/// Ask for cluster name, hosted zone and region, in that order
pub fn ask_cluster<P: Prompter>(prompter: &P) -> Result<ClusterAnswers> {
    let name = prompter.input("Enter a name for your cluster", DEFAULT_CLUSTER_NAME)?;
    let hosted_zone = prompter.input(
        "Enter the hosted zone for your cluster's DNS (ie. example.com)",
        DEFAULT_HOSTED_ZONE,
    )?;
    let region = prompter.input(
        "Enter the default region for your cluster.",
        DEFAULT_REGION,
    )?;

    Ok(ClusterAnswers {
        name,
        hosted_zone,
        region,
    })
}

/// Ask which of `available` zones to run in, defaulting to the first one
pub fn ask_zones<P: Prompter>(prompter: &P, available: &[String]) -> Result<Vec<String>> {
    let defaults: Vec<String> = available.first().cloned().into_iter().collect();
    prompter.multi_select(
        "Select the availability zones you would like your cluster to exist in.",
        available,
        &defaults,
    )
}
