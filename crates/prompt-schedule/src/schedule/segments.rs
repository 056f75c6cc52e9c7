//! Per-step text reconstruction and run-length merging into segments.

use serde::Serialize;

use crate::schedule::chunks::Chunk;
use crate::schedule::escape::EscapeProtector;

/// Padding applied to inner segment boundaries, in schedule fraction.
///
/// Downstream samplers convert percentages back to steps with floating
/// point; the pad keeps adjacent segments from leaving a one-step hole.
pub const SEGMENT_EPSILON: f64 = 0.001;

/// A maximal run of steps that share one resolved prompt text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Resolved text with escapes restored.
    pub text: String,
    /// First step of the run.
    pub start_step: usize,
    /// One past the last step of the run.
    pub end_step: usize,
    pub start_percent: f64,
    pub end_percent: f64,
}

impl Segment {
    /// Build a segment for steps `start..end` of a `steps`-long schedule.
    ///
    /// Inner boundaries are widened by [`SEGMENT_EPSILON`]; the schedule's
    /// outer edges stay exactly at 0 and 1.
    pub fn new(text: String, start: usize, end: usize, steps: usize) -> Self {
        let start_percent = if start == 0 {
            0.0
        } else {
            start as f64 / steps as f64 - SEGMENT_EPSILON
        };
        let end_percent = if end >= steps {
            1.0
        } else {
            end as f64 / steps as f64 + SEGMENT_EPSILON
        };
        Self {
            text,
            start_step: start,
            end_step: end,
            start_percent,
            end_percent,
        }
    }

    /// Number of steps covered.
    pub fn len(&self) -> usize {
        self.end_step - self.start_step
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Text active at `step`: every chunk containing the step, in order.
pub fn reconstruct_step(chunks: &[Chunk], step: usize) -> String {
    chunks
        .iter()
        .filter(|c| c.applies_to.contains(step))
        .map(|c| c.text.as_str())
        .collect()
}

/// Merge consecutive steps with identical text into segments.
///
/// Texts are compared in protected form and restored once per segment.
pub fn merge_segments(chunks: &[Chunk], steps: usize, protector: &EscapeProtector) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut open: Option<(String, usize)> = None;

    for step in 0..steps {
        let text = reconstruct_step(chunks, step);
        if let Some((previous, _)) = &open
            && *previous == text
        {
            continue;
        }
        if let Some((previous, start)) = open.take() {
            segments.push(Segment::new(protector.restore(&previous), start, step, steps));
        }
        open = Some((text, step));
    }

    if let Some((previous, start)) = open {
        segments.push(Segment::new(protector.restore(&previous), start, steps, steps));
    }
    segments
}
