use serde::{Deserialize, Serialize};

/// A single step in a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDef {
  /// Delete instances, images and disks created by this workflow.
  DeleteResources(DeleteResourcesDef),
  /// Wait until the listed instances have stopped.
  WaitForInstancesStopped(Vec<String>),
}

/// Resources to delete.
///
/// Instance and disk names are workflow-local and get the run suffix
/// applied. Image names must already be fully qualified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteResourcesDef {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub instances: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub disks: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<String>,
}
