//! The schedule compiler: plan, then encode each distinct text once.
//!
//! # Example
//!
//! ```
//! use prompt_schedule::compiler::ScheduleCompiler;
//! use prompt_schedule::encode::HashEncoder;
//! use prompt_schedule::schedule::CompileConfig;
//! use std::sync::Arc;
//!
//! let encoder = HashEncoder::new(4);
//! let records = ScheduleCompiler::new(&encoder, CompileConfig::default())
//!     .compile("a [cat|dog]", 4)
//!     .unwrap();
//!
//! assert_eq!(records.len(), 4);
//! assert_eq!(records[0].text, "a cat");
//! assert_eq!(records[1].text, "a dog");
//! // Steps 0 and 2 resolve to the same text and share one encode.
//! assert!(Arc::ptr_eq(&records[0].conditioning, &records[2].conditioning));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::encode::{
    AsyncTextEncoder, EncodingCache, TextEncoder, encode_with_breaks, encode_with_breaks_async,
    split_parts,
};
use crate::error::{CompileError, ParseError};
use crate::events::{CompileEvent, EventHandler, NoopHandler};
use crate::schedule::{CompileConfig, Schedule, Segment, plan};

static NOOP: NoopHandler = NoopHandler;

/// Conditioning for one segment of the schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ConditioningRecord<C> {
    /// Resolved prompt text for the segment.
    pub text: String,
    /// Shared with every other record of the same text.
    pub conditioning: Arc<C>,
    pub start_percent: f64,
    pub end_percent: f64,
}

impl<C> ConditioningRecord<C> {
    fn new(segment: &Segment, conditioning: Arc<C>) -> Self {
        Self {
            text: segment.text.clone(),
            conditioning,
            start_percent: segment.start_percent,
            end_percent: segment.end_percent,
        }
    }
}

/// Compiles prompts into per-segment conditioning with a given encoder.
pub struct ScheduleCompiler<'a, E: ?Sized> {
    encoder: &'a E,
    config: CompileConfig,
    handler: &'a dyn EventHandler,
}

impl<'a, E: ?Sized> ScheduleCompiler<'a, E> {
    pub fn new(encoder: &'a E, config: CompileConfig) -> Self {
        Self {
            encoder,
            config,
            handler: &NOOP,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    /// Resolve the schedule without encoding anything.
    pub fn plan(&self, prompt: &str, steps: usize) -> Result<Schedule, ParseError> {
        let schedule = plan(prompt, steps, &self.config)?;
        self.handler.on_event(&CompileEvent::Parsed {
            steps,
            chunks: schedule.chunks,
            directives: schedule.directives,
            unterminated: schedule.unterminated,
        });
        for segment in &schedule.segments {
            self.handler.on_event(&CompileEvent::SegmentPlanned {
                text: &segment.text,
                start_step: segment.start_step,
                end_step: segment.end_step,
            });
        }
        Ok(schedule)
    }

    fn notify_encoding(&self, text: &str) {
        self.handler.on_event(&CompileEvent::Encoding {
            text,
            parts: split_parts(text, self.config.break_token()).len(),
        });
    }

    fn finish<C>(&self, records: &[ConditioningRecord<C>], encodes: usize) {
        self.handler.on_event(&CompileEvent::Finished {
            segments: records.len(),
            encodes,
        });
    }
}

impl<E: TextEncoder + ?Sized> ScheduleCompiler<'_, E> {
    /// Compile `prompt` for `steps` sampling steps.
    ///
    /// Each distinct segment text is encoded once; encoder errors are
    /// returned unchanged inside [`CompileError::Encode`].
    pub fn compile(
        &self,
        prompt: &str,
        steps: usize,
    ) -> Result<Vec<ConditioningRecord<E::Conditioning>>, CompileError<E::Error>> {
        let schedule = self.plan(prompt, steps)?;
        let mut cache = EncodingCache::new();
        let mut records = Vec::with_capacity(schedule.segments.len());

        for segment in &schedule.segments {
            let conditioning = match cache.get(&segment.text) {
                Some(hit) => {
                    self.handler
                        .on_event(&CompileEvent::CacheHit { text: &segment.text });
                    hit
                }
                None => {
                    self.notify_encoding(&segment.text);
                    let encoded =
                        encode_with_breaks(self.encoder, &segment.text, self.config.break_token())
                            .map_err(CompileError::Encode)?;
                    cache.insert(segment.text.clone(), encoded)
                }
            };
            records.push(ConditioningRecord::new(segment, conditioning));
        }

        self.finish(&records, cache.len());
        Ok(records)
    }
}

impl<E: AsyncTextEncoder + ?Sized> ScheduleCompiler<'_, E> {
    /// Async compile. Distinct texts are encoded concurrently when
    /// [`CompileConfig::parallel_encode`] is set, sequentially otherwise.
    /// Records always come back in segment order.
    pub async fn compile_async(
        &self,
        prompt: &str,
        steps: usize,
    ) -> Result<Vec<ConditioningRecord<E::Conditioning>>, CompileError<E::Error>> {
        let schedule = self.plan(prompt, steps)?;

        let mut distinct: Vec<&str> = Vec::new();
        for segment in &schedule.segments {
            if !distinct.contains(&segment.text.as_str()) {
                distinct.push(&segment.text);
            } else {
                self.handler
                    .on_event(&CompileEvent::CacheHit { text: &segment.text });
            }
        }
        for text in &distinct {
            self.notify_encoding(text);
        }

        let break_token = self.config.break_token();
        let results: Vec<Result<E::Conditioning, E::Error>> = if self.config.parallel_encode
            && distinct.len() > 1
        {
            let futures: Vec<_> = distinct
                .iter()
                .map(|text| encode_with_breaks_async(self.encoder, text, break_token))
                .collect();
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(distinct.len());
            for text in &distinct {
                let result = encode_with_breaks_async(self.encoder, text, break_token).await;
                let failed = result.is_err();
                results.push(result);
                if failed {
                    break;
                }
            }
            results
        };

        let mut encoded: HashMap<&str, Arc<E::Conditioning>> = HashMap::new();
        for (text, result) in distinct.iter().zip(results) {
            encoded.insert(*text, Arc::new(result.map_err(CompileError::Encode)?));
        }

        let mut records = Vec::with_capacity(schedule.segments.len());
        for segment in &schedule.segments {
            if let Some(conditioning) = encoded.get(segment.text.as_str()) {
                records.push(ConditioningRecord::new(segment, Arc::clone(conditioning)));
            }
        }

        self.finish(&records, encoded.len());
        Ok(records)
    }
}

/// Compile with the default configuration and no event handler.
pub fn compile<E: TextEncoder + ?Sized>(
    encoder: &E,
    prompt: &str,
    steps: usize,
) -> Result<Vec<ConditioningRecord<E::Conditioning>>, CompileError<E::Error>> {
    ScheduleCompiler::new(encoder, CompileConfig::default()).compile(prompt, steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{EncodeFuture, HashEncoder};
    use crate::events::FnEventHandler;
    use std::sync::Mutex;

    /// Counts encode calls per text; conditioning is the text itself.
    #[derive(Default)]
    struct CountingEncoder {
        calls: Mutex<Vec<String>>,
    }

    impl CountingEncoder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TextEncoder for CountingEncoder {
        type Conditioning = String;
        type Error = String;

        fn encode(&self, text: &str) -> Result<String, String> {
            self.calls.lock().unwrap().push(text.to_string());
            if text.contains("broken") {
                Err(format!("tokenizer rejected '{text}'"))
            } else {
                Ok(text.to_uppercase())
            }
        }

        fn concat(&self, head: String, tail: String) -> Result<String, String> {
            Ok(format!("{head}|{tail}"))
        }
    }

    impl AsyncTextEncoder for CountingEncoder {
        type Conditioning = String;
        type Error = String;

        fn encode<'a>(&'a self, text: &'a str) -> EncodeFuture<'a, String, String> {
            Box::pin(async move { TextEncoder::encode(self, text) })
        }

        fn concat(&self, head: String, tail: String) -> Result<String, String> {
            TextEncoder::concat(self, head, tail)
        }
    }

    #[test]
    fn repeated_text_is_encoded_once() {
        let encoder = CountingEncoder::default();
        let records = ScheduleCompiler::new(&encoder, CompileConfig::default())
            .compile("[a|b]", 6)
            .unwrap();
        assert_eq!(records.len(), 6);
        assert_eq!(encoder.calls(), vec!["a", "b"]);
        assert!(Arc::ptr_eq(&records[0].conditioning, &records[4].conditioning));
    }

    #[test]
    fn no_directive_prompt_is_one_record() {
        let encoder = CountingEncoder::default();
        let records = compile(&encoder, "just a cat", 30).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_percent, 0.0);
        assert_eq!(records[0].end_percent, 1.0);
        assert_eq!(*records[0].conditioning, "JUST A CAT");
    }

    #[test]
    fn break_parts_are_concatenated_and_cached_whole() {
        let encoder = CountingEncoder::default();
        let records = ScheduleCompiler::new(&encoder, CompileConfig::default())
            .compile("a<break>[b|c]", 4)
            .unwrap();
        assert_eq!(*records[0].conditioning, "A|B");
        assert_eq!(*records[1].conditioning, "A|C");
        assert_eq!(encoder.calls(), vec!["a", "b", "a", "c"]);
        assert!(Arc::ptr_eq(&records[0].conditioning, &records[2].conditioning));
    }

    #[test]
    fn disabled_break_token_encodes_verbatim() {
        let encoder = CountingEncoder::default();
        let config = CompileConfig::default().with_break_token(None::<String>);
        let records = ScheduleCompiler::new(&encoder, config)
            .compile("a<break>b", 2)
            .unwrap();
        assert_eq!(*records[0].conditioning, "A<BREAK>B");
    }

    #[test]
    fn encoder_error_propagates() {
        let encoder = CountingEncoder::default();
        let err = compile(&encoder, "[fine:broken:0.5]", 4).unwrap_err();
        assert_eq!(err, CompileError::Encode("tokenizer rejected 'broken'".into()));
    }

    #[test]
    fn parse_error_stops_before_encoding() {
        let encoder = CountingEncoder::default();
        let err = compile(&encoder, "[a:b:x]", 4).unwrap_err();
        assert!(matches!(err, CompileError::Parse(ParseError::InvalidNumber { .. })));
        assert!(encoder.calls().is_empty());
    }

    #[test]
    fn events_report_encodes_and_hits() {
        let encoder = HashEncoder::new(2);
        let log = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|event| {
            let tag = match event {
                CompileEvent::Parsed { .. } => "parsed",
                CompileEvent::SegmentPlanned { .. } => "planned",
                CompileEvent::Encoding { .. } => "encoding",
                CompileEvent::CacheHit { .. } => "hit",
                CompileEvent::Finished { .. } => "finished",
            };
            log.lock().unwrap().push(tag);
        });
        ScheduleCompiler::new(&encoder, CompileConfig::default())
            .with_event_handler(&handler)
            .compile("[x|y]", 3)
            .unwrap();
        let log = log.lock().unwrap();
        assert_eq!(log.iter().filter(|t| **t == "encoding").count(), 2);
        assert_eq!(log.iter().filter(|t| **t == "hit").count(), 1);
        assert_eq!(log.first(), Some(&"parsed"));
        assert_eq!(log.last(), Some(&"finished"));
    }

    #[tokio::test]
    async fn async_compile_matches_sync_order() {
        let encoder = CountingEncoder::default();
        let compiler = ScheduleCompiler::new(&encoder, CompileConfig::default());
        let records = compiler.compile_async("[a|b|c]", 5).await.unwrap();
        let texts: Vec<&str> = records.iter().map(|r| r.conditioning.as_str()).collect();
        assert_eq!(texts, vec!["A", "B", "C", "A", "B"]);

        let mut calls = encoder.calls();
        calls.sort();
        assert_eq!(calls, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn async_sequential_stops_at_first_error() {
        let encoder = CountingEncoder::default();
        let config = CompileConfig::default().with_parallel_encode(false);
        let err = ScheduleCompiler::new(&encoder, config)
            .compile_async("[broken|ok]", 2)
            .await
            .unwrap_err();
        assert_eq!(err, CompileError::Encode("tokenizer rejected 'broken'".into()));
        assert_eq!(encoder.calls(), vec!["broken"]);
    }

    #[tokio::test]
    async fn async_parallel_reports_error_in_segment_order() {
        let encoder = CountingEncoder::default();
        let err = ScheduleCompiler::new(&encoder, CompileConfig::default())
            .compile_async("[ok|broken one|broken two]", 3)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::Encode("tokenizer rejected 'broken one'".into())
        );
    }
}
