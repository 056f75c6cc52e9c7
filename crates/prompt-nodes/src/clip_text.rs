//! The advanced CLIP text encode node.
//!
//! Compiles a scheduled prompt into one conditioning entry per segment,
//! each carrying the side-channel values samplers read alongside the
//! embedding: pooled output, size hints, optional guidance and the active
//! schedule window.
//!
//! # Inputs
//!
//! | Field | Default | Range |
//! |-------|---------|-------|
//! | `steps` | 20 | 1..=10000 |
//! | `prompt` | required | |
//! | `width`, `height` | 1024 | 0..=16384 |
//! | `target_width`, `target_height` | 1024 | 0..=16384 |
//! | `guidance` | -1 (omitted) | -1..=100 |
//! | `llama_template` | none | text or alias |

use std::fmt;
use std::sync::Arc;

use prompt_schedule::encode::{SequenceEmbedding, TextEncoder};
use prompt_schedule::events::LoggingHandler;
use prompt_schedule::{CompileConfig, CompileError, ScheduleCompiler};
use schemars::JsonSchema;
use schemars::schema::{InstanceType, NumberValidation, Schema, SchemaObject};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::node::{NodeDefinition, validate_against};
use crate::templates::resolve_llama_template;
use crate::{MAX_RESOLUTION, json_schema_for};

const MAX_STEPS: usize = 10_000;
const MAX_GUIDANCE: f64 = 100.0;

// ── Inputs ──────────────────────────────────────────────────────────

/// Inputs of [`ClipTextEncodeAdvanced`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipTextInputs {
    /// Sampling steps; needed for per-step directives to resolve.
    #[serde(default = "default_steps")]
    #[schemars(range(min = 1, max = 10000))]
    pub steps: usize,
    /// Prompt text with bracket directives.
    pub prompt: String,
    /// Intended image width.
    #[serde(default = "default_resolution")]
    #[schemars(range(min = 0, max = 16384))]
    pub width: u32,
    /// Intended image height.
    #[serde(default = "default_resolution")]
    #[schemars(range(min = 0, max = 16384))]
    pub height: u32,
    /// Actual image width.
    #[serde(default = "default_resolution")]
    #[schemars(range(min = 0, max = 16384))]
    pub target_width: u32,
    /// Actual image height.
    #[serde(default = "default_resolution")]
    #[schemars(range(min = 0, max = 16384))]
    pub target_height: u32,
    /// Guidance value to embed. Negative means none.
    #[serde(default = "default_guidance")]
    #[schemars(schema_with = "guidance_schema")]
    pub guidance: f64,
    /// LLaMA template, or an alias such as `hunyuan_image`.
    #[serde(default)]
    pub llama_template: Option<String>,
}

fn default_steps() -> usize {
    20
}

fn default_resolution() -> u32 {
    1024
}

fn default_guidance() -> f64 {
    -1.0
}

fn guidance_schema(_: &mut schemars::r#gen::SchemaGenerator) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::Number.into()),
        number: Some(Box::new(NumberValidation {
            minimum: Some(-1.0),
            maximum: Some(MAX_GUIDANCE),
            ..Default::default()
        })),
        ..Default::default()
    }
    .into()
}

impl ClipTextInputs {
    /// Inputs for `prompt` with every other field at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            steps: default_steps(),
            prompt: prompt.into(),
            width: default_resolution(),
            height: default_resolution(),
            target_width: default_resolution(),
            target_height: default_resolution(),
            guidance: default_guidance(),
            llama_template: None,
        }
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_width = width;
        self.target_height = height;
        self
    }

    pub fn with_guidance(mut self, guidance: f64) -> Self {
        self.guidance = guidance;
        self
    }

    pub fn with_llama_template(mut self, template: impl Into<String>) -> Self {
        self.llama_template = Some(template.into());
        self
    }

    /// Range checks for inputs built in code rather than parsed from JSON.
    pub fn check(&self) -> Result<(), NodeError> {
        let mut problems = Vec::new();
        if !(1..=MAX_STEPS).contains(&self.steps) {
            problems.push(format!("/steps: {} is outside 1..={MAX_STEPS}", self.steps));
        }
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("target_width", self.target_width),
            ("target_height", self.target_height),
        ] {
            if value > MAX_RESOLUTION {
                problems.push(format!("/{name}: {value} is above {MAX_RESOLUTION}"));
            }
        }
        if !(-1.0..=MAX_GUIDANCE).contains(&self.guidance) {
            problems.push(format!("/guidance: {} is outside -1..={MAX_GUIDANCE}", self.guidance));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(NodeError::InvalidInputs(problems))
        }
    }
}

// ── Model capability ────────────────────────────────────────────────

/// Extra tokenizer inputs for multimodal text encoders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizeOptions {
    /// Resolved template text, never an alias.
    pub llama_template: Option<String>,
    /// Projected image embedding from a vision encoder.
    pub image_embeds: Vec<f32>,
}

/// Output of a CLIP vision encoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipVisionOutput {
    pub mm_projected: Vec<f32>,
}

/// A tokenizer plus text encoder.
pub trait ClipModel {
    type Tokens;

    /// Tokenize `text`. `options` is only `Some` when a vision output was
    /// supplied to the node.
    fn tokenize(&self, text: &str, options: Option<&TokenizeOptions>)
    -> Result<Self::Tokens, String>;

    fn encode_from_tokens(&self, tokens: Self::Tokens) -> Result<SequenceEmbedding, String>;
}

/// Presents a [`ClipModel`] as a [`TextEncoder`].
struct ClipAdapter<'m, M: ?Sized> {
    model: &'m M,
    options: Option<TokenizeOptions>,
}

impl<M: ClipModel + ?Sized> TextEncoder for ClipAdapter<'_, M> {
    type Conditioning = SequenceEmbedding;
    type Error = String;

    fn encode(&self, text: &str) -> Result<SequenceEmbedding, String> {
        let tokens = self.model.tokenize(text, self.options.as_ref())?;
        self.model.encode_from_tokens(tokens)
    }

    fn concat(
        &self,
        head: SequenceEmbedding,
        tail: SequenceEmbedding,
    ) -> Result<SequenceEmbedding, String> {
        if !head.is_empty() && !tail.is_empty() && head.width() != tail.width() {
            return Err(format!(
                "cannot join sequences of width {} and {}",
                head.width(),
                tail.width()
            ));
        }
        Ok(head.concat_sequence(tail))
    }
}

// ── Output ──────────────────────────────────────────────────────────

/// Side-channel values attached to each conditioning entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditioningMeta {
    pub pooled_output: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub crop_w: u32,
    pub crop_h: u32,
    pub target_width: u32,
    pub target_height: u32,
    /// Present only when the input guidance was non-negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<f64>,
    pub start_percent: f64,
    pub end_percent: f64,
}

/// One entry of the node's `CONDITIONING` output.
#[derive(Debug, Clone, Serialize)]
pub struct NodeConditioning {
    /// Resolved prompt text for this window.
    pub text: String,
    /// Shared with every entry of the same text.
    pub cond: Arc<SequenceEmbedding>,
    pub meta: ConditioningMeta,
}

/// Errors from running a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeError {
    /// Inputs failed schema or range checks; one message per violation.
    InvalidInputs(Vec<String>),
    /// The prompt did not parse or the model failed to encode.
    Compile(CompileError<String>),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInputs(problems) => {
                write!(f, "invalid node inputs:")?;
                for p in problems {
                    write!(f, "\n  - {p}")?;
                }
                Ok(())
            }
            Self::Compile(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<CompileError<String>> for NodeError {
    fn from(e: CompileError<String>) -> Self {
        Self::Compile(e)
    }
}

// ── Node ────────────────────────────────────────────────────────────

/// CLIP text encode with `<break>`, `[from:to:when]`, `[alter|nate]` and
/// friends.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipTextEncodeAdvanced;

impl ClipTextEncodeAdvanced {
    pub const CLASS_NAME: &'static str = "SwarmClipTextEncodeAdvanced";

    pub fn definition() -> NodeDefinition {
        NodeDefinition {
            class_name: Self::CLASS_NAME.into(),
            display_name: "CLIP Text Encode (Advanced)".into(),
            category: "SwarmUI/clip".into(),
            description: "Acts like the regular CLIPTextEncode, but supports more advanced \
                          special features like '<break>', '[from:to:when]', '[alter|nate]', ..."
                .into(),
            return_types: vec!["CONDITIONING".into()],
            input_schema: json_schema_for::<ClipTextInputs>(),
        }
    }

    /// Encode typed inputs.
    pub fn encode<M: ClipModel + ?Sized>(
        model: &M,
        inputs: &ClipTextInputs,
        vision: Option<&ClipVisionOutput>,
    ) -> Result<Vec<NodeConditioning>, NodeError> {
        inputs.check()?;

        let options = vision.map(|v| TokenizeOptions {
            llama_template: resolve_llama_template(inputs.llama_template.as_deref()),
            image_embeds: v.mm_projected.clone(),
        });
        let adapter = ClipAdapter { model, options };

        let records = ScheduleCompiler::new(&adapter, CompileConfig::default())
            .with_event_handler(&LoggingHandler)
            .compile(&inputs.prompt, inputs.steps)?;
        debug!("{} produced {} conditioning entries", Self::CLASS_NAME, records.len());

        let guidance = (inputs.guidance >= 0.0).then_some(inputs.guidance);
        Ok(records
            .into_iter()
            .map(|r| NodeConditioning {
                meta: ConditioningMeta {
                    pooled_output: r.conditioning.pooled.clone(),
                    width: inputs.width,
                    height: inputs.height,
                    crop_w: 0,
                    crop_h: 0,
                    target_width: inputs.target_width,
                    target_height: inputs.target_height,
                    guidance,
                    start_percent: r.start_percent,
                    end_percent: r.end_percent,
                },
                text: r.text,
                cond: r.conditioning,
            })
            .collect())
    }

    /// Validate raw JSON inputs against the input schema, then encode.
    pub fn encode_json<M: ClipModel + ?Sized>(
        model: &M,
        inputs: &serde_json::Value,
        vision: Option<&ClipVisionOutput>,
    ) -> Result<Vec<NodeConditioning>, NodeError> {
        validate_against(&json_schema_for::<ClipTextInputs>(), inputs)
            .map_err(NodeError::InvalidInputs)?;
        let typed: ClipTextInputs = serde_json::from_value(inputs.clone())
            .map_err(|e| NodeError::InvalidInputs(vec![e.to_string()]))?;
        Self::encode(model, &typed, vision)
    }
}
