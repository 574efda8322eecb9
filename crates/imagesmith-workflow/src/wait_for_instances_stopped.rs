use imagesmith_compute::ResourceKind;
use tracing::instrument;

use crate::context::{StepContext, ValidationContext};
use crate::error::{StepError, ValidationError};
use crate::fanout::{Action, FanOut};

/// Waits until every listed instance has stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitForInstancesStopped(pub Vec<String>);

impl WaitForInstancesStopped {
  /// Every instance must exist. Nothing is claimed.
  pub async fn validate(&self, cx: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let ctx = cx.context;
    for instance in &self.0 {
      let name = ctx.resolve(instance);
      if !ctx.compute.instance_exists(&ctx.project, &ctx.zone, &name).await {
        return Err(ValidationError::not_found(
          "wait for instance stopped",
          ResourceKind::Instance,
          instance.as_str(),
        ));
      }
    }
    Ok(())
  }

  #[instrument(
    name = "wait_for_instances_stopped",
    skip_all,
    fields(workflow = %ctx.workflow_name, instances = self.0.len())
  )]
  pub async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
    let mut waits = FanOut::new(ctx);
    for instance in &self.0 {
      waits.spawn(Action::WaitForStopped, ctx.resolve(instance));
    }
    waits.join().await?;
    Ok(())
  }
}
