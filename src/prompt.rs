//! Operator input and the store-first resolution of configuration values.
//!
//! `PromptSource` only asks when the ConfigStore has nothing for a key, which
//! is what lets a resumed session skip every question already answered.
use crate::error::ProvisionError;
use crate::session::ConfigStore;
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{BufRead, IsTerminal, Write};

/// One configuration question.
#[derive(Debug, Clone, Copy)]
pub struct Question<'a> {
    pub key: &'a str,
    pub text: &'a str,
    pub default: Option<&'a str>,
    /// Secret answers are read without echo.
    pub secret: bool,
    /// Mandatory keys may not resolve to an empty value.
    pub required: bool,
}

impl<'a> Question<'a> {
    /// A mandatory, non-secret question without a default.
    pub fn new(key: &'a str, text: &'a str) -> Self {
        Self {
            key,
            text,
            default: None,
            secret: false,
            required: true,
        }
    }

    pub fn with_default(mut self, value: &'a str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Source of operator answers.
pub trait Elicit {
    fn elicit(&mut self, prompt: &str, secret: bool) -> Result<String>;
}

/// Line-oriented elicitor over any reader/writer pair.
pub struct LineElicitor<R, W> {
    input: R,
    output: W,
    terminal: bool,
}

impl<R: BufRead, W: Write> LineElicitor<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            terminal: false,
        }
    }
}

impl LineElicitor<std::io::StdinLock<'static>, std::io::Stdout> {
    /// Elicitor bound to the process terminal; secret answers are read in raw mode.
    pub fn stdio() -> Self {
        Self {
            input: std::io::stdin().lock(),
            output: std::io::stdout(),
            terminal: true,
        }
    }
}

impl<R: BufRead, W: Write> Elicit for LineElicitor<R, W> {
    fn elicit(&mut self, prompt: &str, secret: bool) -> Result<String> {
        write!(self.output, "{prompt}").context("write prompt")?;
        self.output.flush().context("flush prompt")?;

        if secret && self.terminal && std::io::stdin().is_terminal() {
            let answer = read_hidden()?;
            writeln!(self.output).context("write newline")?;
            return Ok(answer.trim().to_string());
        }
        let mut line = String::new();
        // EOF reads as an empty answer.
        self.input.read_line(&mut line).context("read answer")?;
        Ok(line.trim().to_string())
    }
}

/// Leaves raw mode when dropped.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        disable_raw_mode().ok();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum HiddenInput {
    Pending,
    Done,
    Interrupted,
}

/// Read one line from the terminal in raw mode so nothing is echoed.
fn read_hidden() -> Result<String> {
    let _raw = RawMode::enable()?;
    let mut answer = String::new();
    loop {
        let Event::Key(key) = event::read().context("read key")? else {
            continue;
        };
        match apply_key(&mut answer, key) {
            HiddenInput::Pending => {}
            HiddenInput::Done => return Ok(answer),
            HiddenInput::Interrupted => anyhow::bail!("input interrupted"),
        }
    }
}

fn apply_key(answer: &mut String, key: KeyEvent) -> HiddenInput {
    if key.kind != KeyEventKind::Press {
        return HiddenInput::Pending;
    }
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => HiddenInput::Done,
        KeyCode::Char('c') if control => HiddenInput::Interrupted,
        KeyCode::Char('d') if control => HiddenInput::Done,
        KeyCode::Char('u') if control => {
            answer.clear();
            HiddenInput::Pending
        }
        KeyCode::Char(c) if !control => {
            answer.push(c);
            HiddenInput::Pending
        }
        KeyCode::Backspace => {
            answer.pop();
            HiddenInput::Pending
        }
        _ => HiddenInput::Pending,
    }
}

/// Resolves configuration values store-first, eliciting only on a miss.
pub struct PromptSource<'a> {
    store: &'a mut ConfigStore,
    elicitor: &'a mut dyn Elicit,
}

impl<'a> PromptSource<'a> {
    pub fn new(store: &'a mut ConfigStore, elicitor: &'a mut dyn Elicit) -> Self {
        Self { store, elicitor }
    }

    pub fn store(&self) -> &ConfigStore {
        self.store
    }

    /// Return the stored value for the question's key, or ask, persist, and
    /// return the answer (falling back to the default on an empty answer).
    pub fn resolve(&mut self, question: &Question<'_>) -> Result<String> {
        self.resolve_checked(question, |_| Ok(()))
    }

    /// Like [`resolve`](Self::resolve), but a fresh answer must pass `check`
    /// before it is persisted. Stored values are trusted as-is.
    pub fn resolve_checked(
        &mut self,
        question: &Question<'_>,
        check: impl Fn(&str) -> std::result::Result<(), String>,
    ) -> Result<String> {
        if let Some(value) = self.store.get(question.key) {
            tracing::debug!(key = question.key, "config value reused");
            return Ok(value.to_string());
        }
        let value = self.ask(question)?;
        check(&value).map_err(|reason| ProvisionError::InvalidValue {
            key: question.key.to_string(),
            reason,
        })?;
        self.store.set(question.key, &value)?;
        Ok(value)
    }

    fn ask(&mut self, question: &Question<'_>) -> Result<String> {
        let prompt = match question.default {
            Some(default) if !default.is_empty() => format!("{} [{default}]: ", question.text),
            _ => format!("{}: ", question.text),
        };
        let answer = self.elicitor.elicit(&prompt, question.secret)?;
        let value = if answer.is_empty() {
            question.default.unwrap_or_default().to_string()
        } else {
            answer
        };
        if value.is_empty() && question.required {
            return Err(ProvisionError::RequiredValueMissing {
                key: question.key.to_string(),
            }
            .into());
        }
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Elicit;
    use anyhow::Result;
    use std::collections::VecDeque;

    /// Replays canned answers and records every prompt shown.
    #[derive(Default)]
    pub(crate) struct ScriptedElicitor {
        answers: VecDeque<String>,
        pub(crate) asked: Vec<(String, bool)>,
    }

    impl ScriptedElicitor {
        pub(crate) fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|answer| answer.to_string()).collect(),
                asked: Vec::new(),
            }
        }
    }

    impl Elicit for ScriptedElicitor {
        fn elicit(&mut self, prompt: &str, secret: bool) -> Result<String> {
            self.asked.push((prompt.to_string(), secret));
            Ok(self.answers.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
