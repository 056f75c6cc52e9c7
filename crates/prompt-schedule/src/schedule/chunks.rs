//! Recursive directive expansion into step-tagged text chunks.
//!
//! [`parse_chunks`] walks a protected prompt left to right. Literal text
//! becomes a [`Chunk`] active on the incoming step set; each directive
//! becomes one chunk per candidate text, active on the candidate's own step
//! set intersected with the incoming one. Candidates that still contain a
//! bracket are parsed again with that intersection as their limit.
//!
//! The accumulator is passed by value through every call and handed back,
//! so there is no shared mutable state between recursion levels.

use crate::error::ParseError;
use crate::schedule::escape::EscapeProtector;
use crate::schedule::scanner::{Directive, classify, scan_directive, when_threshold};

/// The set of steps a chunk contributes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSet {
    active: Vec<bool>,
}

impl StepSet {
    /// Every step in `0..steps`.
    pub fn all(steps: usize) -> Self {
        Self {
            active: vec![true; steps],
        }
    }

    /// Steps in `0..steps` for which `f` holds.
    pub fn from_fn(steps: usize, f: impl Fn(usize) -> bool) -> Self {
        Self {
            active: (0..steps).map(f).collect(),
        }
    }

    /// Steps present in both sets.
    pub fn intersect(&self, other: &StepSet) -> Self {
        Self {
            active: self
                .active
                .iter()
                .zip(&other.active)
                .map(|(a, b)| *a && *b)
                .collect(),
        }
    }

    pub fn contains(&self, step: usize) -> bool {
        self.active.get(step).copied().unwrap_or(false)
    }

    /// Number of active steps.
    pub fn count(&self) -> usize {
        self.active.iter().filter(|a| **a).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Total schedule length this set was built for.
    pub fn steps(&self) -> usize {
        self.active.len()
    }

    /// Active step indices in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.then_some(i))
    }
}

/// A leaf piece of prompt text and the steps it appears in.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Protected text (placeholders not yet restored).
    pub text: String,
    pub applies_to: StepSet,
}

/// Output of [`parse_chunks`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPrompt {
    pub chunks: Vec<Chunk>,
    /// Number of control directives found at any depth.
    pub directives: usize,
    /// Whether scanning stopped at a directive that never closed.
    pub unterminated: bool,
}

impl ParsedPrompt {
    pub fn has_directives(&self) -> bool {
        self.directives > 0
    }
}

/// Expand a protected prompt into chunks for a schedule of `steps` steps.
pub fn parse_chunks(
    protected: &str,
    steps: usize,
    protector: &EscapeProtector,
    max_depth: usize,
) -> Result<ParsedPrompt, ParseError> {
    if steps == 0 {
        return Err(ParseError::InvalidSteps { steps });
    }
    let parser = ChunkParser {
        steps,
        protector,
        max_depth,
    };
    parser.collect(protected, &StepSet::all(steps), 0, ParsedPrompt::default())
}

struct ChunkParser<'p> {
    steps: usize,
    protector: &'p EscapeProtector,
    max_depth: usize,
}

impl ChunkParser<'_> {
    fn collect(
        &self,
        text: &str,
        limit: &StepSet,
        depth: usize,
        mut acc: ParsedPrompt,
    ) -> Result<ParsedPrompt, ParseError> {
        if depth > self.max_depth {
            return Err(ParseError::NestingTooDeep {
                limit: self.max_depth,
            });
        }

        let all = StepSet::all(self.steps);
        let mut remaining = text;
        loop {
            let Some(open) = remaining.find('[') else {
                return self.append(remaining, &all, false, limit, depth, acc);
            };

            let scan = scan_directive(remaining, open, self.protector);
            let (Some(end), Some(directive)) = (scan.end, classify(remaining, &scan)) else {
                // Unterminated: the tail rides along with the last chunk.
                acc.unterminated = true;
                match acc.chunks.last_mut() {
                    Some(last) => last.text.push_str(remaining),
                    None => acc.chunks.push(Chunk {
                        text: remaining.to_string(),
                        applies_to: limit.clone(),
                    }),
                }
                return Ok(acc);
            };
            let directive = directive?;

            let before = remaining.get(..open).unwrap_or_default();
            acc = self.append(before, &all, false, limit, depth, acc)?;
            acc = self.expand(directive, limit, depth, acc)?;
            remaining = remaining.get(end + 1..).unwrap_or_default();
        }
    }

    fn expand(
        &self,
        directive: Directive<'_>,
        limit: &StepSet,
        depth: usize,
        mut acc: ParsedPrompt,
    ) -> Result<ParsedPrompt, ParseError> {
        let steps = self.steps;
        if directive.is_control() {
            acc.directives += 1;
        }
        match directive {
            Directive::Alternation(options) => {
                let n = options.len();
                for (i, option) in options.into_iter().enumerate() {
                    let active = StepSet::from_fn(steps, |s| s % n == i);
                    acc = self.append(option, &active, true, limit, depth, acc)?;
                }
                Ok(acc)
            }
            Directive::WindowedSwap {
                before,
                after,
                when,
            } => {
                let threshold = when_threshold(when, steps);
                let early = StepSet::from_fn(steps, |s| (s as f64) < threshold);
                let late = StepSet::from_fn(steps, |s| (s as f64) >= threshold);
                acc = self.append(before, &early, true, limit, depth, acc)?;
                self.append(after, &late, true, limit, depth, acc)
            }
            Directive::TimedAppend { after, when } => {
                let threshold = when_threshold(when, steps);
                let late = StepSet::from_fn(steps, |s| (s as f64) >= threshold);
                self.append(after, &late, true, limit, depth, acc)
            }
            Directive::Literal(body) => {
                self.append(body, &StepSet::all(steps), false, limit, depth, acc)
            }
        }
    }

    fn append(
        &self,
        text: &str,
        applies_to: &StepSet,
        expand: bool,
        limit: &StepSet,
        depth: usize,
        mut acc: ParsedPrompt,
    ) -> Result<ParsedPrompt, ParseError> {
        let applies_to = applies_to.intersect(limit);
        if expand && text.contains('[') {
            return self.collect(text, &applies_to, depth + 1, acc);
        }
        acc.chunks.push(Chunk {
            text: text.to_string(),
            applies_to,
        });
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(prompt: &str, steps: usize) -> ParsedPrompt {
        let p = EscapeProtector::default();
        parse_chunks(&p.protect(prompt), steps, &p, 64).unwrap()
    }

    fn steps_of(chunk: &Chunk) -> Vec<usize> {
        chunk.applies_to.iter().collect()
    }

    #[test]
    fn step_set_operations() {
        let evens = StepSet::from_fn(6, |s| s % 2 == 0);
        let early = StepSet::from_fn(6, |s| s < 3);
        let both = evens.intersect(&early);
        assert_eq!(both.iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(both.count(), 2);
        assert!(!both.contains(4));
        assert!(!both.contains(99));
        assert_eq!(both.steps(), 6);
        assert!(StepSet::from_fn(3, |_| false).is_empty());
    }

    #[test]
    fn plain_text_is_one_chunk() {
        let parsed = parse("a photo of a cat", 5);
        assert_eq!(parsed.chunks.len(), 1);
        assert!(!parsed.has_directives());
        assert_eq!(parsed.chunks[0].applies_to.count(), 5);
    }

    #[test]
    fn alternation_splits_by_remainder() {
        let parsed = parse("a[x|y|z]b", 7);
        assert_eq!(parsed.directives, 1);
        let texts: Vec<&str> = parsed.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "x", "y", "z", "b"]);
        assert_eq!(steps_of(&parsed.chunks[1]), vec![0, 3, 6]);
        assert_eq!(steps_of(&parsed.chunks[2]), vec![1, 4]);
        assert_eq!(steps_of(&parsed.chunks[3]), vec![2, 5]);
    }

    #[test]
    fn step_index_when_is_used_verbatim() {
        let parsed = parse("[a:b:3]", 10);
        assert_eq!(steps_of(&parsed.chunks[1]), vec![0, 1, 2]);
        assert_eq!(steps_of(&parsed.chunks[2]), (3..10).collect::<Vec<_>>());
    }

    #[test]
    fn timed_append_starts_late() {
        let parsed = parse("cat[ with hat:0.5]", 4);
        assert_eq!(parsed.chunks[1].text, " with hat");
        assert_eq!(steps_of(&parsed.chunks[1]), vec![2, 3]);
    }

    #[test]
    fn nested_directive_is_bounded_by_outer() {
        let parsed = parse("[[a:b:0.5]:c:0.8]", 10);
        assert_eq!(parsed.directives, 2);
        let a = parsed.chunks.iter().find(|c| c.text == "a").unwrap();
        let b = parsed.chunks.iter().find(|c| c.text == "b").unwrap();
        let c = parsed.chunks.iter().find(|c| c.text == "c").unwrap();
        assert_eq!(steps_of(a), vec![0, 1, 2, 3, 4]);
        assert_eq!(steps_of(b), vec![5, 6, 7]);
        assert_eq!(steps_of(c), vec![8, 9]);
    }

    #[test]
    fn literal_brackets_drop_and_do_not_recurse() {
        let parsed = parse("x[y [a|b]]", 2);
        assert!(!parsed.has_directives());
        assert_eq!(parsed.chunks[1].text, "y [a|b]");
    }

    #[test]
    fn unterminated_tail_joins_last_chunk() {
        let parsed = parse("x[a|b][c", 2);
        assert!(parsed.unterminated);
        let last = parsed.chunks.last().unwrap();
        assert_eq!(last.text, "b[c");
        assert_eq!(steps_of(last), vec![1]);
    }

    #[test]
    fn unterminated_at_start_makes_a_chunk() {
        let parsed = parse("[oops", 3);
        assert!(parsed.unterminated);
        assert_eq!(parsed.chunks.len(), 1);
        assert_eq!(parsed.chunks[0].text, "[oops");
        assert_eq!(parsed.chunks[0].applies_to.count(), 3);
    }

    #[test]
    fn zero_steps_is_rejected() {
        let p = EscapeProtector::default();
        assert_eq!(
            parse_chunks("a", 0, &p, 64),
            Err(ParseError::InvalidSteps { steps: 0 })
        );
    }

    #[test]
    fn nesting_ceiling_is_enforced() {
        let p = EscapeProtector::default();
        let prompt = "[[[[a|b]|c]|d]|e]";
        assert!(parse_chunks(prompt, 4, &p, 8).is_ok());
        assert_eq!(
            parse_chunks(prompt, 4, &p, 2),
            Err(ParseError::NestingTooDeep { limit: 2 })
        );
    }

    #[test]
    fn bad_when_propagates() {
        let p = EscapeProtector::default();
        let err = parse_chunks("a[b:c:later]", 4, &p, 64).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { .. }));
    }
}
