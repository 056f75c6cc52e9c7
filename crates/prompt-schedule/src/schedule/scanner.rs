//! Directive scanning and classification.
//!
//! [`scan_directive`] walks forward from an opening bracket and records
//! where the body ends and which top-level separators it contains.
//! [`classify`] is a pure function of that record: it decides whether the
//! body is an alternation, a windowed swap, a timed append or plain text.

use crate::error::ParseError;
use crate::schedule::escape::EscapeProtector;

/// Result of scanning one bracketed directive.
///
/// All indices are byte offsets into the scanned string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveScan {
    /// Index of the opening `[`.
    pub open: usize,
    /// Index of the matching `]`, or `None` if the directive never closes.
    pub end: Option<usize>,
    /// Top-level `:` separators.
    pub colons: Vec<usize>,
    /// Top-level `|` separators.
    pub pipes: Vec<usize>,
}

impl DirectiveScan {
    /// The directive body between the brackets, if the directive closed.
    pub fn body<'a>(&self, text: &'a str) -> Option<&'a str> {
        self.end.and_then(|end| text.get(self.open + 1..end))
    }
}

/// A classified directive body.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive<'a> {
    /// `[a|b|c]`: alternative `i` is active when `step % n == i`.
    Alternation(Vec<&'a str>),
    /// `[before:after:when]`.
    WindowedSwap {
        before: &'a str,
        after: &'a str,
        when: f64,
    },
    /// `[after:when]`.
    TimedAppend { after: &'a str, when: f64 },
    /// Anything else: the body is plain text.
    Literal(&'a str),
}

impl Directive<'_> {
    /// Whether this directive changes the text over the schedule.
    pub fn is_control(&self) -> bool {
        !matches!(self, Directive::Literal(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Alternation(_) => "alternation",
            Directive::WindowedSwap { .. } => "windowed_swap",
            Directive::TimedAppend { .. } => "timed_append",
            Directive::Literal(_) => "literal",
        }
    }
}

/// Scan the directive whose `[` sits at byte `open` of `text`.
///
/// Nested brackets raise the depth; the first `]` at depth zero closes the
/// body. `:` and `|` only count at depth zero, and whichever kind appears
/// first claims the directive so the other is no longer recorded.
pub fn scan_directive(text: &str, open: usize, protector: &EscapeProtector) -> DirectiveScan {
    let mut scan = DirectiveScan {
        open,
        ..Default::default()
    };
    let mut depth = 0usize;
    let mut skip = false;
    let mut chars = text.get(open + 1..).unwrap_or_default().char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        let index = open + 1 + offset;
        if c == '\\' && !skip && chars.peek().is_some_and(|&(_, n)| protector.is_escapable(n)) {
            skip = true;
        } else if skip {
            skip = false;
        } else {
            match c {
                '[' => depth += 1,
                ']' if depth == 0 => {
                    scan.end = Some(index);
                    break;
                }
                ']' => depth -= 1,
                ':' if depth == 0 && scan.pipes.is_empty() => scan.colons.push(index),
                '|' if depth == 0 && scan.colons.is_empty() => scan.pipes.push(index),
                _ => {}
            }
        }
    }
    scan
}

/// Classify a closed directive from its scan.
///
/// Returns `None` when the directive never closed.
pub fn classify<'a>(text: &'a str, scan: &DirectiveScan) -> Option<Result<Directive<'a>, ParseError>> {
    let body = scan.body(text)?;
    let base = scan.open + 1;

    let directive = if !scan.pipes.is_empty() {
        Ok(Directive::Alternation(split_on(body, &scan.pipes, base)))
    } else if scan.colons.len() == 2 {
        let parts = split_on(body, &scan.colons, base);
        parse_when(parts[2]).map(|when| Directive::WindowedSwap {
            before: parts[0],
            after: parts[1],
            when,
        })
    } else if scan.colons.len() == 1 {
        let parts = split_on(body, &scan.colons, base);
        parse_when(parts[1]).map(|when| Directive::TimedAppend {
            after: parts[0],
            when,
        })
    } else {
        Ok(Directive::Literal(body))
    };
    Some(directive)
}

/// Parse a `when` field. Surrounding whitespace is ignored.
pub fn parse_when(value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber {
            value: value.to_string(),
        })
}

/// Convert a `when` value to a step threshold.
///
/// Values below 1 are a fraction of `steps`; anything else is a step index.
pub fn when_threshold(when: f64, steps: usize) -> f64 {
    if when < 1.0 {
        when * steps as f64
    } else {
        when
    }
}

/// Split `body` at absolute separator indices (shifted by `base`).
fn split_on<'a>(body: &'a str, indices: &[usize], base: usize) -> Vec<&'a str> {
    let mut parts = Vec::with_capacity(indices.len() + 1);
    let mut start = 0;
    for &index in indices {
        let at = index - base;
        parts.push(body.get(start..at).unwrap_or_default());
        start = at + 1;
    }
    parts.push(body.get(start..).unwrap_or_default());
    parts
}
