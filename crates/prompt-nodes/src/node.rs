//! Node definitions, the registry, and input validation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::clip_text::ClipTextEncodeAdvanced;

/// What a node graph host needs to know to list and call a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDefinition {
    /// Unique class name the host refers to the node by.
    pub class_name: String,
    pub display_name: String,
    /// Menu path, `/`-separated.
    pub category: String,
    pub description: String,
    /// Output socket types, in order.
    pub return_types: Vec<String>,
    /// JSON Schema of the input object.
    pub input_schema: serde_json::Value,
}

/// Node definitions keyed by class name.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeDefinition>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every node this crate ships.
    pub fn builtin() -> Self {
        Self::new().with(ClipTextEncodeAdvanced::definition())
    }

    /// Add a definition, replacing any with the same class name.
    pub fn register(&mut self, definition: NodeDefinition) {
        if self.nodes.contains_key(&definition.class_name) {
            warn!("replacing node definition '{}'", definition.class_name);
        }
        self.nodes.insert(definition.class_name.clone(), definition);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, definition: NodeDefinition) -> Self {
        self.register(definition);
        self
    }

    pub fn get(&self, class_name: &str) -> Option<&NodeDefinition> {
        self.nodes.get(class_name)
    }

    /// All definitions, ordered by class name.
    pub fn definitions(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check `inputs` against the node's input schema.
    ///
    /// Returns one message per violation, prefixed with the instance path.
    pub fn validate_inputs(
        &self,
        class_name: &str,
        inputs: &serde_json::Value,
    ) -> Result<(), Vec<String>> {
        let Some(definition) = self.get(class_name) else {
            return Err(vec![format!("unknown node '{class_name}'")]);
        };
        validate_against(&definition.input_schema, inputs)
    }
}

/// Validate `value` against a JSON Schema.
///
/// A schema that does not compile is treated as accepting everything.
pub(crate) fn validate_against(
    schema: &serde_json::Value,
    value: &serde_json::Value,
) -> Result<(), Vec<String>> {
    let validator = match jsonschema::validator_for(schema) {
        Ok(v) => v,
        Err(e) => {
            debug!("skipping input validation, schema did not compile: {e}");
            return Ok(());
        }
    };

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Read a JSON input object for a node from `path`.
pub fn load_node_inputs<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, String> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| format!("invalid node inputs in {}: {e}", path.display()))
}
