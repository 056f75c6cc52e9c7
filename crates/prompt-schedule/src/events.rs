//! Compile events and handlers.
//!
//! [`ScheduleCompiler`](crate::compiler::ScheduleCompiler) reports what it
//! does through [`CompileEvent`]s. Callers implement [`EventHandler`] to
//! observe them; nothing a handler does can change the compile result.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Default; ignores everything |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures (counting encodes in tests, etc.) |

use tracing::{debug, trace, warn};

/// Events emitted during one compile call.
#[derive(Debug)]
pub enum CompileEvent<'a> {
    /// The prompt was parsed into chunks.
    Parsed {
        steps: usize,
        chunks: usize,
        directives: usize,
        unterminated: bool,
    },
    /// A segment of the schedule was resolved.
    SegmentPlanned {
        text: &'a str,
        start_step: usize,
        end_step: usize,
    },
    /// A distinct text is about to be sent to the encoder.
    Encoding { text: &'a str, parts: usize },
    /// A segment reused an earlier encode of the same text.
    CacheHit { text: &'a str },
    /// All segments have conditioning.
    Finished { segments: usize, encodes: usize },
}

/// Observer for [`CompileEvent`]s. The default implementation ignores them.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &CompileEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Logs events through `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &CompileEvent<'_>) {
        match event {
            CompileEvent::Parsed {
                steps,
                chunks,
                directives,
                unterminated,
            } => {
                debug!("[schedule] parsed {chunks} chunk(s), {directives} directive(s) over {steps} steps");
                if *unterminated {
                    warn!("[schedule] unclosed '[' kept as literal text");
                }
            }
            CompileEvent::SegmentPlanned {
                text,
                start_step,
                end_step,
            } => {
                trace!("[schedule] steps {start_step}..{end_step}: {text:?}");
            }
            CompileEvent::Encoding { text, parts } => {
                debug!("[encode] {} chars in {parts} part(s)", text.len());
                trace!("[encode] text: {text:?}");
            }
            CompileEvent::CacheHit { text } => {
                trace!("[encode] cache hit: {text:?}");
            }
            CompileEvent::Finished { segments, encodes } => {
                debug!("[schedule] {segments} segment(s), {encodes} encode(s)");
            }
        }
    }
}

/// An event handler backed by a closure.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use prompt_schedule::events::{CompileEvent, EventHandler, FnEventHandler};
///
/// let encodes = AtomicUsize::new(0);
/// let handler = FnEventHandler::new(|event| {
///     if let CompileEvent::Encoding { .. } = event {
///         encodes.fetch_add(1, Ordering::Relaxed);
///     }
/// });
/// handler.on_event(&CompileEvent::Encoding { text: "cat", parts: 1 });
/// assert_eq!(encodes.load(Ordering::Relaxed), 1);
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&CompileEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&CompileEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&CompileEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &CompileEvent<'_>) {
        (self.0)(event)
    }
}
