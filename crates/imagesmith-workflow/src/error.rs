//! Step and workflow errors.

use imagesmith_compute::{ComputeError, ResourceKind};

/// Errors raised while validating a step, before anything runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
  /// A referenced instance or disk does not exist.
  #[error("cannot {action}: {kind} not found: {name}")]
  ResourceNotFound {
    action: &'static str,
    kind: ResourceKind,
    name: String,
  },

  /// The resource is already scheduled for deletion by another step.
  #[error("error scheduling {kind} for deletion: {name} already scheduled by step '{owner}'")]
  DuplicateSchedule {
    kind: ResourceKind,
    name: String,
    owner: String,
  },
}

impl ValidationError {
  pub(crate) fn not_found(
    action: &'static str,
    kind: ResourceKind,
    name: impl Into<String>,
  ) -> Self {
    Self::ResourceNotFound {
      action,
      kind,
      name: name.into(),
    }
  }
}

/// Errors raised while running a step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
  /// A compute operation on one resource failed.
  #[error("{kind} '{name}': {source}")]
  OperationFailed {
    kind: ResourceKind,
    name: String,
    #[source]
    source: ComputeError,
  },

  /// A resource task panicked.
  #[error("resource task failed: {message}")]
  TaskPanicked { message: String },
}

/// Errors raised by the workflow runner.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
  /// A dependency entry names a step that is not defined.
  #[error("dependency declared for unknown step '{step}'")]
  UnknownStep { step: String },

  /// A step depends on a step that is not defined.
  #[error("step '{step}' depends on unknown step '{dependency}'")]
  UnknownDependency { step: String, dependency: String },

  /// The dependency graph has a cycle.
  #[error("dependency cycle among steps: {steps:?}")]
  DependencyCycle { steps: Vec<String> },

  /// A step failed validation.
  #[error("step '{step}' failed validation: {source}")]
  Validation {
    step: String,
    #[source]
    source: ValidationError,
  },

  /// A step failed while running.
  #[error("step '{step}' failed: {source}")]
  StepFailed {
    step: String,
    #[source]
    source: StepError,
  },

  /// The workflow was cancelled.
  #[error("workflow cancelled")]
  Cancelled,
}
