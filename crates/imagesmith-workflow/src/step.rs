use imagesmith_config::StepDef;

use crate::context::{StepContext, ValidationContext};
use crate::delete_resources::DeleteResources;
use crate::error::{StepError, ValidationError};
use crate::wait_for_instances_stopped::WaitForInstancesStopped;

/// A runnable workflow step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
  DeleteResources(DeleteResources),
  WaitForInstancesStopped(WaitForInstancesStopped),
}

impl From<StepDef> for Step {
  fn from(def: StepDef) -> Self {
    match def {
      StepDef::DeleteResources(d) => Step::DeleteResources(d.into()),
      StepDef::WaitForInstancesStopped(instances) => {
        Step::WaitForInstancesStopped(WaitForInstancesStopped(instances))
      }
    }
  }
}

impl Step {
  /// Short type name used in logs.
  pub fn type_name(&self) -> &'static str {
    match self {
      Step::DeleteResources(_) => "delete_resources",
      Step::WaitForInstancesStopped(_) => "wait_for_instances_stopped",
    }
  }

  pub async fn validate(&self, cx: &ValidationContext<'_>) -> Result<(), ValidationError> {
    match self {
      Step::DeleteResources(s) => s.validate(cx).await,
      Step::WaitForInstancesStopped(s) => s.validate(cx).await,
    }
  }

  pub async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
    match self {
      Step::DeleteResources(s) => s.run(ctx).await,
      Step::WaitForInstancesStopped(s) => s.run(ctx).await,
    }
  }
}
