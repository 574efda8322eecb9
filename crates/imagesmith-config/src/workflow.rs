use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::step::StepDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub name: String,
  pub project: String,
  pub zone: String,
  /// Steps keyed by step name.
  pub steps: BTreeMap<String, StepDef>,
  /// Step name -> names of the steps it waits on.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub dependencies: BTreeMap<String, Vec<String>>,
}

impl WorkflowDef {
  /// Parse a workflow definition from JSON.
  pub fn from_json(content: &str) -> serde_json::Result<Self> {
    serde_json::from_str(content)
  }
}
