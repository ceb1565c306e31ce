use tracing::warn;

/// Yes/no questions to the operator.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str, default: bool) -> bool;
}

/// Asks on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str, default: bool) -> bool {
        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("could not read an answer ({e}), assuming {}", yes_no(default));
                default
            }
        }
    }
}

/// Answers every question the same way; backs `--yes` and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, prompt: &str, _default: bool) -> bool {
        tracing::debug!("{prompt} [{}]", yes_no(self.0));
        self.0
    }
}

fn yes_no(answer: bool) -> &'static str {
    if answer {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_answer_ignores_default() {
        assert!(FixedAnswer(true).confirm("purge?", false));
        assert!(!FixedAnswer(false).confirm("purge?", true));
    }
}
