//! Contexts handed to steps by the workflow runner.

use std::sync::Arc;

use imagesmith_compute::ComputeClient;
use tokio_util::sync::CancellationToken;

use crate::naming::resolve_name;
use crate::registry::DeletionRegistry;

/// Everything a step needs to run: where it runs, how names resolve, the
/// compute client and the workflow's cancellation token.
#[derive(Clone)]
pub struct StepContext {
  pub workflow_name: String,
  pub suffix: String,
  pub project: String,
  pub zone: String,
  pub compute: Arc<dyn ComputeClient>,
  pub cancel: CancellationToken,
}

impl StepContext {
  /// Create a context with a fresh cancellation token.
  pub fn new(
    workflow_name: impl Into<String>,
    suffix: impl Into<String>,
    project: impl Into<String>,
    zone: impl Into<String>,
    compute: Arc<dyn ComputeClient>,
  ) -> Self {
    Self {
      workflow_name: workflow_name.into(),
      suffix: suffix.into(),
      project: project.into(),
      zone: zone.into(),
      compute,
      cancel: CancellationToken::new(),
    }
  }

  /// Resolve a workflow-local resource name.
  pub fn resolve(&self, name: &str) -> String {
    resolve_name(name, &self.workflow_name, &self.suffix)
  }
}

/// What a step sees during validation.
pub struct ValidationContext<'a> {
  /// Name of the step being validated.
  pub step: &'a str,
  pub context: &'a StepContext,
  pub registry: &'a DeletionRegistry,
}
