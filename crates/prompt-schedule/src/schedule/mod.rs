//! Prompt scheduling: from an annotated prompt to step-ranged segments.
//!
//! | Module | Stage |
//! |--------|-------|
//! | [`escape`] | Placeholder protection of escapes and reserved keywords |
//! | [`scanner`] | Bracket scanning and directive classification |
//! | [`chunks`] | Recursive expansion into step-tagged chunks |
//! | [`segments`] | Per-step reconstruction and run-length merging |
//! | [`config`] | [`CompileConfig`] |
//!
//! [`plan`] runs all stages and returns a [`Schedule`]; encoding is left to
//! [`ScheduleCompiler`](crate::compiler::ScheduleCompiler).

pub mod chunks;
pub mod config;
pub mod escape;
pub mod scanner;
pub mod segments;

use serde::Serialize;

pub use chunks::{Chunk, ParsedPrompt, StepSet, parse_chunks};
pub use config::CompileConfig;
pub use escape::{EscapeDialect, EscapeProtector};
pub use scanner::{Directive, DirectiveScan};
pub use segments::{SEGMENT_EPSILON, Segment, merge_segments, reconstruct_step};

use crate::error::ParseError;

/// The resolved schedule for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub steps: usize,
    /// Leaf chunks produced by the parse.
    pub chunks: usize,
    /// Control directives found at any depth.
    pub directives: usize,
    /// Whether an unclosed bracket was absorbed as literal text.
    pub unterminated: bool,
    /// Segments in increasing step order, covering every step once.
    pub segments: Vec<Segment>,
}

impl Schedule {
    pub fn has_directives(&self) -> bool {
        self.directives > 0
    }

    /// The segment covering `step`.
    pub fn segment_at(&self, step: usize) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.start_step <= step && step < s.end_step)
    }
}

/// Parse `prompt` and split a `steps`-long schedule into segments.
///
/// Without any control directive the whole prompt is one segment over
/// `[0, 1]`.
///
/// ```
/// use prompt_schedule::schedule::{CompileConfig, plan};
///
/// let schedule = plan("[cat:dog:0.5]", 10, &CompileConfig::default()).unwrap();
/// assert_eq!(schedule.segments.len(), 2);
/// assert_eq!(schedule.segments[0].text, "cat");
/// assert_eq!(schedule.segments[1].text, "dog");
/// assert_eq!(schedule.segments[1].start_step, 5);
/// ```
pub fn plan(prompt: &str, steps: usize, config: &CompileConfig) -> Result<Schedule, ParseError> {
    let protector = config.protector();
    let protected = protector.protect(prompt);
    let parsed = parse_chunks(&protected, steps, &protector, config.max_depth)?;

    let segments = if parsed.has_directives() {
        merge_segments(&parsed.chunks, steps, &protector)
    } else {
        vec![Segment::new(protector.restore(&protected), 0, steps, steps)]
    };

    Ok(Schedule {
        steps,
        chunks: parsed.chunks.len(),
        directives: parsed.directives,
        unterminated: parsed.unterminated,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_directive_keeps_literal_brackets() {
        let schedule = plan("a [plain] prompt", 8, &CompileConfig::default()).unwrap();
        assert!(!schedule.has_directives());
        assert_eq!(schedule.segments.len(), 1);
        assert_eq!(schedule.segments[0].text, "a [plain] prompt");
    }

    #[test]
    fn segment_lookup_by_step() {
        let schedule = plan("[a|b]", 4, &CompileConfig::default()).unwrap();
        assert_eq!(schedule.segment_at(2).unwrap().text, "a");
        assert_eq!(schedule.segment_at(3).unwrap().text, "b");
        assert!(schedule.segment_at(4).is_none());
    }

    #[test]
    fn zero_steps_fail() {
        assert_eq!(
            plan("a", 0, &CompileConfig::default()),
            Err(ParseError::InvalidSteps { steps: 0 })
        );
    }
}
