//! Convenience re-exports for common `prompt-schedule` types.
//!
//! ```ignore
//! use prompt_schedule::prelude::*;
//! ```
//!
//! Scanner internals (scan records, step sets, chunk parsing) are left out;
//! import those from [`schedule`](crate::schedule) directly.

// ── Compiling ───────────────────────────────────────────────────────
pub use crate::compiler::{ConditioningRecord, ScheduleCompiler, compile};
pub use crate::error::{CompileError, ParseError};

// ── Scheduling ──────────────────────────────────────────────────────
pub use crate::schedule::config::DEFAULT_BREAK_TOKEN;
pub use crate::schedule::{CompileConfig, EscapeDialect, SEGMENT_EPSILON, Schedule, Segment, plan};

// ── Encoding ────────────────────────────────────────────────────────
pub use crate::encode::{
    AsyncTextEncoder, EncodeFuture, HashEncoder, SequenceEmbedding, TextEncoder,
};

// ── Events ──────────────────────────────────────────────────────────
pub use crate::events::{CompileEvent, EventHandler, FnEventHandler, LoggingHandler, NoopHandler};
