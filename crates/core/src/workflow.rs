//! Opaque workflow graph model.
//!
//! A workflow graph is the JSON document the engine executes: a map
//! from node id to `{"class_type": ..., "inputs": {...}}`. This layer
//! never interprets the graph. Callers only overwrite the specific
//! field paths each workflow file is known to expose (see
//! [`crate::templates`]); a malformed graph fails on the engine side.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A single node descriptor, used when a caller replaces a whole node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub class_type: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

impl NodeDescriptor {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: Map::new(),
        }
    }

    /// Builder-style helper for setting one input.
    pub fn with_input(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(field.to_string(), value.into());
        self
    }
}

/// A workflow graph keyed by node id.
///
/// Serializes transparently to the JSON object the engine expects in
/// the `prompt` field of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph(Map<String, Value>);

impl WorkflowGraph {
    /// Parse a graph from JSON text. The top level must be an object.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Workflow is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Wrap an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::Validation(format!(
                "Workflow must be a JSON object keyed by node id, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Read and parse a workflow file from disk.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("Failed to read workflow {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.0.contains_key(node_id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn node(&self, node_id: &str) -> Option<&Value> {
        self.0.get(node_id)
    }

    /// Read back one input field of one node.
    pub fn input(&self, node_id: &str, field: &str) -> Option<&Value> {
        self.0.get(node_id)?.get("inputs")?.get(field)
    }

    /// Overwrite one input field of an existing node.
    ///
    /// Fails if the node is absent: the field paths are a contract of
    /// the workflow file, so a missing node means the wrong file was
    /// loaded.
    pub fn set_input(
        &mut self,
        node_id: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), CoreError> {
        let inputs = self.inputs_mut(node_id)?;
        inputs.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Overwrite several input fields of an existing node at once,
    /// leaving its other inputs untouched.
    pub fn merge_inputs(
        &mut self,
        node_id: &str,
        values: Map<String, Value>,
    ) -> Result<(), CoreError> {
        let inputs = self.inputs_mut(node_id)?;
        inputs.extend(values);
        Ok(())
    }

    /// Insert or replace a whole node.
    pub fn replace_node(&mut self, node_id: &str, node: NodeDescriptor) {
        let value = serde_json::json!({
            "class_type": node.class_type,
            "inputs": node.inputs,
        });
        self.0.insert(node_id.to_string(), value);
    }

    /// The graph as a plain JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn inputs_mut(&mut self, node_id: &str) -> Result<&mut Map<String, Value>, CoreError> {
        let node = self
            .0
            .get_mut(node_id)
            .ok_or_else(|| CoreError::Validation(format!("Workflow has no node {node_id}")))?;

        let node = node.as_object_mut().ok_or_else(|| {
            CoreError::Validation(format!("Workflow node {node_id} is not an object"))
        })?;

        let inputs = node
            .entry("inputs")
            .or_insert_with(|| Value::Object(Map::new()));

        inputs.as_object_mut().ok_or_else(|| {
            CoreError::Validation(format!("Workflow node {node_id} has non-object inputs"))
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn sample() -> WorkflowGraph {
        WorkflowGraph::from_value(json!({
            "5": {"class_type": "EmptyLatentImage", "inputs": {"width": 512, "height": 512, "batch_size": 1}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "", "clip": ["11", 0]}},
        }))
        .unwrap()
    }

    #[test]
    fn set_input_overwrites_field() {
        let mut graph = sample();
        graph.set_input("5", "width", 768).unwrap();
        graph.set_input("5", "height", 1024).unwrap();

        assert_eq!(graph.input("5", "width"), Some(&json!(768)));
        assert_eq!(graph.input("5", "height"), Some(&json!(1024)));
        assert_eq!(graph.input("5", "batch_size"), Some(&json!(1)));
    }

    #[test]
    fn set_input_on_missing_node_fails() {
        let mut graph = sample();
        let err = graph.set_input("99", "text", "x").unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("99"));
    }

    #[test]
    fn set_input_creates_inputs_object_when_absent() {
        let mut graph = WorkflowGraph::from_value(json!({"1": {"class_type": "Foo"}})).unwrap();
        graph.set_input("1", "seed", 7).unwrap();
        assert_eq!(graph.input("1", "seed"), Some(&json!(7)));
    }

    #[test]
    fn merge_inputs_keeps_links() {
        let mut graph = sample();
        let mut values = Map::new();
        values.insert("text".into(), json!("a coffee bottle"));
        graph.merge_inputs("6", values).unwrap();

        assert_eq!(graph.input("6", "text"), Some(&json!("a coffee bottle")));
        assert_eq!(graph.input("6", "clip"), Some(&json!(["11", 0])));
    }

    #[test]
    fn replace_node_inserts_descriptor() {
        let mut graph = sample();
        graph.replace_node("3", NodeDescriptor::new("LoadImage").with_input("image", "a.png"));
        assert_eq!(graph.node("3").unwrap()["class_type"], "LoadImage");
        assert_eq!(graph.input("3", "image"), Some(&json!("a.png")));
    }

    #[test]
    fn serializes_transparently() {
        let graph = sample();
        let value = serde_json::to_value(&graph).unwrap();
        assert_eq!(value["5"]["inputs"]["width"], 512);
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert_matches!(
            WorkflowGraph::from_json("[1, 2, 3]"),
            Err(CoreError::Validation(msg)) if msg.contains("an array")
        );
        assert!(WorkflowGraph::from_json("not json").is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wf.json");
        std::fs::write(&path, r#"{"1": {"class_type": "X", "inputs": {}}}"#).unwrap();
        let graph = WorkflowGraph::load(&path).unwrap();
        assert!(graph.contains_node("1"));
        assert_eq!(graph.len(), 1);
    }
}
