use anyhow::{anyhow, bail, ensure, Result};
use logos::{Lexer, Logos};
use std::{fmt, str::FromStr};

/// The offered traffics to run a scenario with.
///
/// Parsed from either a single value (`"1.5"`) or an inclusive range
/// `start..stop:step` (`"0.5..1.5:0.25"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadRange {
    start: f64,
    stop: f64,
    step: f64,
}

/// Tolerance on the last point of a range accumulated in floating point.
const EPSILON: f64 = 1e-9;

impl LoadRange {
    pub fn single(load: f64) -> Self {
        Self {
            start: load,
            stop: load,
            step: 1.0,
        }
    }

    pub fn len(&self) -> usize {
        ((self.stop - self.start) / self.step + EPSILON).floor() as usize + 1
    }

    /// a range always holds at least its start
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(|index| self.start + index as f64 * self.step)
    }
}

impl Default for LoadRange {
    fn default() -> Self {
        Self::single(1.0)
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\n\f]+")] // Ignore this regex pattern between tokens
enum Token {
    #[token("..")]
    Range,
    #[token(".")]
    Dot,
    #[token(":")]
    Step,

    #[regex("[0-9]+")]
    Value,
}

/// `digits` or `digits.digits`
fn value(lex: &mut Lexer<'_, Token>, s: &str) -> Result<f64> {
    match lex.next() {
        Some(Ok(Token::Value)) => {}
        Some(Ok(token)) => bail!("Expecting a number, got {token:?} in `{s}'"),
        Some(Err(())) => return Err(anyhow!("Failed to parse: {s}")),
        None => bail!("Expecting a number at the end of `{s}'"),
    }
    let start = lex.span().start;

    let mut ahead = lex.clone();
    if ahead.next() == Some(Ok(Token::Dot)) && ahead.next() == Some(Ok(Token::Value)) {
        *lex = ahead;
    }
    let number = &s[start..lex.span().end];
    number
        .parse()
        .map_err(|error| anyhow!("Failed to parse `{number}' in `{s}': {error}"))
}

impl FromStr for LoadRange {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut lex = Lexer::<'_, Token>::new(s);

        let start = value(&mut lex, s)?;
        let range = match lex.next() {
            None => return Ok(Self::single(start)),
            Some(Ok(Token::Range)) => {
                let stop = value(&mut lex, s)?;
                let Some(Ok(Token::Step)) = lex.next() else {
                    bail!("Expecting `:step' after the range in `{s}'")
                };
                let step = value(&mut lex, s)?;
                Self { start, stop, step }
            }
            Some(_) => bail!("Expecting `..' after the first number of `{s}'"),
        };

        ensure!(
            lex.next().is_none(),
            "Not expecting any other tokens to parse a load range"
        );
        ensure!(range.step > 0.0, "The step of `{s}' must be positive");
        ensure!(
            range.stop >= range.start,
            "The range `{s}' must not end before it starts"
        );
        Ok(range)
    }
}

impl fmt::Display for LoadRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.stop {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..{}:{}", self.start, self.stop, self.step)
        }
    }
}
