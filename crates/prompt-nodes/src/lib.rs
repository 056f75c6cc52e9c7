//! Node graph bindings for `prompt-schedule`.
//!
//! A node graph host describes each node by a class name, a category and a
//! JSON Schema for its inputs, then calls it with a JSON object. This crate
//! provides that surface for the scheduled prompt encoder:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`node`] | [`NodeDefinition`], [`NodeRegistry`], input validation and loading |
//! | [`clip_text`] | [`ClipTextEncodeAdvanced`]: typed inputs, [`ClipModel`] adapter, side-channel metadata |
//! | [`templates`] | Built-in LLaMA prompt templates and alias resolution |
//!
//! The model itself stays outside: callers implement [`ClipModel`] for
//! whatever tokenizer and text encoder they run.

pub mod clip_text;
pub mod node;
pub mod templates;

use schemars::JsonSchema;

pub use clip_text::{
    ClipModel, ClipTextEncodeAdvanced, ClipTextInputs, ClipVisionOutput, ConditioningMeta,
    NodeConditioning, NodeError, TokenizeOptions,
};
pub use node::{NodeDefinition, NodeRegistry, load_node_inputs};

/// Largest width or height a node accepts.
pub const MAX_RESOLUTION: u32 = 16384;

/// Generate a JSON Schema `serde_json::Value` for a node's input type.
///
/// # Example
///
/// ```
/// use prompt_nodes::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct SeedInputs {
///     seed: u64,
///     #[serde(default)]
///     label: Option<String>,
/// }
///
/// let schema = json_schema_for::<SeedInputs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"seed".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}
