//! Operator prompts used when a value mapping is missing.
//!
//! The terminal prompter draws on stderr so the export document can go to
//! stdout. Invalid answers are rejected in place by the widgets.

#[cfg(test)]
use std::collections::VecDeque;

use dialoguer::console::Term;
use dialoguer::{Input, Select};

use crate::config::TargetValue;
use crate::error::{Result, TrackportError};

pub trait Prompter {
    /// Show one informational line to the operator.
    fn say(&mut self, line: &str) -> Result<()>;

    /// Pick one of `items`, returning its index.
    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize>;

    /// Ask for a target value. With `keyed` the answer must use the compound
    /// `{ID}:{name}` form.
    fn input(&mut self, prompt: &str, keyed: bool) -> Result<TargetValue>;

    /// Whether the operator can be asked at all.
    fn is_interactive(&self) -> bool {
        true
    }
}

/// Validate one answer to a value prompt.
pub fn parse_answer(answer: &str, keyed: bool) -> std::result::Result<TargetValue, String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err("a value is required".into());
    }
    if !keyed {
        return Ok(TargetValue::named(answer));
    }
    TargetValue::parse_keyed(answer).ok_or_else(|| {
        "the mapping has to be expressed using the {ID}:{identifying_name} form".into()
    })
}

/// Interactive prompter on the controlling terminal.
pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub fn stderr() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Prompter for TermPrompter {
    fn say(&mut self, line: &str) -> Result<()> {
        self.term.write_line(line)?;
        Ok(())
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
        let choice = Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_on(&self.term)?;
        Ok(choice)
    }

    fn input(&mut self, prompt: &str, keyed: bool) -> Result<TargetValue> {
        let mut accepted = None;
        Input::<String>::new()
            .with_prompt(prompt)
            .validate_with(|answer: &String| -> std::result::Result<(), String> {
                accepted = Some(parse_answer(answer, keyed)?);
                Ok(())
            })
            .interact_text_on(&self.term)?;
        accepted.ok_or(TrackportError::PromptClosed)
    }
}

/// Prompter for unattended runs: nothing can be asked.
#[derive(Debug, Default)]
pub struct NoPrompt;

impl Prompter for NoPrompt {
    fn say(&mut self, _line: &str) -> Result<()> {
        Ok(())
    }

    fn select(&mut self, _prompt: &str, _items: &[String]) -> Result<usize> {
        Err(TrackportError::PromptClosed)
    }

    fn input(&mut self, _prompt: &str, _keyed: bool) -> Result<TargetValue> {
        Err(TrackportError::PromptClosed)
    }

    fn is_interactive(&self) -> bool {
        false
    }
}

/// Prompter answering from a fixed script, recording what the operator
/// would have seen. Rejected answers are skipped the way the terminal
/// widgets ask again.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub transcript: String,
}

#[cfg(test)]
impl ScriptedPrompter {
    pub fn new<'s>(answers: impl IntoIterator<Item = &'s str>) -> Self {
        Self {
            answers: answers.into_iter().map(str::to_string).collect(),
            transcript: String::new(),
        }
    }

    fn next(&mut self) -> Result<String> {
        self.answers.pop_front().ok_or(TrackportError::PromptClosed)
    }
}

#[cfg(test)]
impl Prompter for ScriptedPrompter {
    fn say(&mut self, line: &str) -> Result<()> {
        self.transcript.push_str(line);
        self.transcript.push('\n');
        Ok(())
    }

    fn select(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
        self.say(prompt)?;
        for (index, item) in items.iter().enumerate() {
            self.say(&format!("{}) {item}", index + 1))?;
        }
        loop {
            let answer = self.next()?;
            match answer.parse::<usize>() {
                Ok(choice) if (1..=items.len()).contains(&choice) => return Ok(choice - 1),
                _ => self.say(&format!("rejected choice '{answer}'"))?,
            }
        }
    }

    fn input(&mut self, prompt: &str, keyed: bool) -> Result<TargetValue> {
        loop {
            self.say(prompt)?;
            let answer = self.next()?;
            match parse_answer(&answer, keyed) {
                Ok(value) => return Ok(value),
                Err(message) => self.say(&message)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_answers_need_the_compound_form() {
        assert_eq!(parse_answer(" 12:john ", true), Ok(TargetValue::keyed(12, "john")));
        assert!(parse_answer("john", true).unwrap_err().contains("{ID}:{identifying_name}"));
        assert!(parse_answer("x:john", true).is_err());
    }

    #[test]
    fn plain_answers_are_trimmed_and_required() {
        assert_eq!(parse_answer("  john.smith \r\n", false), Ok(TargetValue::named("john.smith")));
        assert_eq!(parse_answer("   ", false).unwrap_err(), "a value is required");
    }

    #[test]
    fn scripted_input_asks_again_after_a_rejected_answer() {
        let mut prompter = ScriptedPrompter::new(["john", "", "12:john"]);
        let value = prompter.input("> ", true).unwrap();
        assert_eq!(value, TargetValue::keyed(12, "john"));
        assert_eq!(prompter.transcript.matches("> ").count(), 3);
        assert!(prompter.transcript.contains("a value is required"));
    }

    #[test]
    fn exhausted_input_is_reported() {
        let mut prompter = ScriptedPrompter::new(["9"]);
        let items = vec!["a".to_string(), "b".to_string()];
        let err = prompter.select("Pick", &items).unwrap_err();
        assert!(matches!(err, TrackportError::PromptClosed));

        let err = NoPrompt.input("> ", false).unwrap_err();
        assert!(matches!(err, TrackportError::PromptClosed));
    }
}
