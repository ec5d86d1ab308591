use std::io::{self, BufRead, Write};

use siteswap_migrate::{DecisionPoint, DecisionProvider};

pub(crate) const UNKNOWN_RESPONSE: &str = "Unknown response, try again.";

/// Enter, `y` and `yes` accept; `n` and `no` decline.
pub(crate) fn parse_confirmation(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Asks until the answer parses. End of input declines.
pub(crate) fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    loop {
        write!(output, "{question} [Y/n] ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(false);
        }
        match parse_confirmation(&line) {
            Some(answer) => return Ok(answer),
            None => writeln!(output, "{UNKNOWN_RESPONSE}")?,
        }
    }
}

pub(crate) struct ConsoleDecisions<R, W> {
    input: R,
    output: W,
    assume_yes: bool,
    skip_restore: bool,
}

impl<R: BufRead, W: Write> ConsoleDecisions<R, W> {
    pub(crate) fn new(input: R, output: W, assume_yes: bool, skip_restore: bool) -> Self {
        Self {
            input,
            output,
            assume_yes,
            skip_restore,
        }
    }
}

impl<R: BufRead, W: Write> DecisionProvider for ConsoleDecisions<R, W> {
    fn confirm(&mut self, point: DecisionPoint) -> bool {
        if point == DecisionPoint::RestorePreservedFiles && self.skip_restore {
            return false;
        }
        if self.assume_yes {
            tracing::info!(decision = point.as_str(), "answered yes by --yes");
            return true;
        }
        match ask(&mut self.input, &mut self.output, point.question()) {
            Ok(answer) => answer,
            Err(err) => {
                tracing::warn!(decision = point.as_str(), error = %err, "prompt failed; treating as no");
                false
            }
        }
    }
}
