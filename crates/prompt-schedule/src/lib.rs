//! Step-scheduled prompt compiler for diffusion text conditioning.
//!
//! `prompt-schedule` turns a prompt annotated with bracket directives into
//! a schedule of sub-prompts over the sampling steps, then encodes each
//! distinct sub-prompt once through a caller-supplied encoder.
//!
//! # Prompt syntax
//!
//! | Directive | Meaning |
//! |-----------|---------|
//! | `[a\|b\|c]` | Alternate: step `s` uses option `s % 3` |
//! | `[before:after:when]` | Swap from `before` to `after` at step `when` |
//! | `[after:when]` | Add `after` from step `when` on |
//! | `[text]` | Plain text; the brackets are dropped |
//!
//! A `when` below 1 is a fraction of the total steps. Directives nest, and
//! an inner directive is only ever active while its enclosing one is.
//! `\[`, `\]`, `\:`, `\|`, `\(`, `\)`, `\<`, `\>` and `\\` escape the
//! character that follows; `embedding:` is never read as a separator.
//! `<break>` splits a resolved text into parts that are encoded separately
//! and concatenated.
//!
//! # Getting started
//!
//! ```
//! use prompt_schedule::prelude::*;
//!
//! let encoder = HashEncoder::new(8);
//! let records = ScheduleCompiler::new(&encoder, CompileConfig::default())
//!     .with_event_handler(&LoggingHandler)
//!     .compile("a photo of a [cat:dog:0.5]", 20)
//!     .unwrap();
//!
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[0].text, "a photo of a cat");
//! assert_eq!(records[0].start_percent, 0.0);
//! assert_eq!(records[1].end_percent, 1.0);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`schedule`] | Escape protection, directive scanning, chunk expansion, segment merging, [`plan`](schedule::plan) |
//! | [`encode`] | [`TextEncoder`](encode::TextEncoder) / [`AsyncTextEncoder`](encode::AsyncTextEncoder), per-call cache, hash encoder |
//! | [`compiler`] | [`ScheduleCompiler`](compiler::ScheduleCompiler) sync and async compile |
//! | [`events`] | [`CompileEvent`](events::CompileEvent) and handlers |
//! | [`error`] | [`ParseError`](error::ParseError), [`CompileError`](error::CompileError) |

pub mod compiler;
pub mod encode;
pub mod error;
pub mod events;
pub mod prelude;
pub mod schedule;

pub use compiler::{ConditioningRecord, ScheduleCompiler, compile};
pub use error::{CompileError, ParseError};
pub use schedule::{CompileConfig, SEGMENT_EPSILON, Schedule, Segment, plan};
