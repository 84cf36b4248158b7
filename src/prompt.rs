//! Interactive questions on the terminal
//!
//! Prompts go through the [`Prompter`] trait so confirmation flows can be
//! driven by a script of answers in tests.

use crate::error::Result;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Source of answers to interactive questions
pub trait Prompter {
    /// Show `question` and return the answer without its line ending.
    /// End of input reads as an empty answer.
    fn ask(&mut self, question: &str) -> Result<String>;
}

/// Prompts on stdout, reads from stdin
#[derive(Debug, Default)]
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{}", question)?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Answers from a fixed list, recording every question asked
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }

    /// Questions asked so far
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front().unwrap_or_default())
    }
}

/// Outcome of a bounded confirmation loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
    /// No acceptable answer within the allowed attempts
    Exhausted,
}

/// Ask until the answer is exactly `accept` or `decline` (ignoring case),
/// at most `attempts` times.
pub fn confirm_with_retries(
    prompter: &mut dyn Prompter,
    question: &str,
    accept: &str,
    decline: &str,
    attempts: usize,
) -> Result<Confirmation> {
    for attempt in 1..=attempts {
        let answer = prompter.ask(question)?;
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case(accept) {
            return Ok(Confirmation::Confirmed);
        }
        if answer.eq_ignore_ascii_case(decline) {
            return Ok(Confirmation::Declined);
        }
        tracing::debug!("Unrecognized answer {:?} (attempt {}/{})", answer, attempt, attempts);
        if attempt < attempts {
            println!("Please answer \"{}\" or \"{}\".", accept, decline);
        }
    }
    Ok(Confirmation::Exhausted)
}

/// `[y/N]`-style question. An empty answer gives `default`; otherwise only
/// `y`/`Y` count as yes.
pub fn ask_yes_no(prompter: &mut dyn Prompter, question: &str, default: bool) -> Result<bool> {
    let answer = prompter.ask(question)?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(default);
    }
    Ok(answer.eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_accepts_case_insensitive() {
        let mut p = ScriptedPrompter::new(["YES"]);
        let result = confirm_with_retries(&mut p, "? ", "yes", "n", 3).unwrap();
        assert_eq!(result, Confirmation::Confirmed);

        let mut p = ScriptedPrompter::new(["N"]);
        let result = confirm_with_retries(&mut p, "? ", "yes", "n", 3).unwrap();
        assert_eq!(result, Confirmation::Declined);
    }

    #[test]
    fn test_confirm_exhausts_after_attempts() {
        let mut p = ScriptedPrompter::new(["y", "no", "sure", "yes"]);
        let result = confirm_with_retries(&mut p, "? ", "yes", "n", 3).unwrap();
        assert_eq!(result, Confirmation::Exhausted);
        assert_eq!(p.asked().len(), 3);
    }

    #[test]
    fn test_confirm_recovers_on_later_attempt() {
        let mut p = ScriptedPrompter::new(["maybe", "yes"]);
        let result = confirm_with_retries(&mut p, "? ", "yes", "n", 3).unwrap();
        assert_eq!(result, Confirmation::Confirmed);
        assert_eq!(p.asked().len(), 2);
    }

    #[test]
    fn test_ask_yes_no_defaults() {
        let mut p = ScriptedPrompter::new(["", "Y", "yes", "n"]);
        assert!(ask_yes_no(&mut p, "? ", true).unwrap());
        assert!(ask_yes_no(&mut p, "? ", false).unwrap());
        assert!(!ask_yes_no(&mut p, "? ", true).unwrap());
        assert!(!ask_yes_no(&mut p, "? ", true).unwrap());
        // Out of answers behaves like an empty line
        assert!(!ask_yes_no(&mut p, "? ", false).unwrap());
    }
}
