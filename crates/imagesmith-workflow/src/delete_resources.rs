use imagesmith_compute::ResourceKind;
use imagesmith_config::DeleteResourcesDef;
use tracing::{info, instrument};

use crate::context::{StepContext, ValidationContext};
use crate::error::{StepError, ValidationError};
use crate::fanout::{Action, Completion, FanOut};

/// Deletes instances, images and disks created by a workflow run.
///
/// Instances and images are deleted concurrently first. Disks are only
/// deleted once all of those deletes have succeeded, since a disk attached
/// to a live instance cannot be removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteResources {
  /// Workflow-local instance names.
  pub instances: Vec<String>,
  /// Workflow-local disk names.
  pub disks: Vec<String>,
  /// Fully qualified image names.
  pub images: Vec<String>,
}

impl From<DeleteResourcesDef> for DeleteResources {
  fn from(def: DeleteResourcesDef) -> Self {
    Self {
      instances: def.instances,
      disks: def.disks,
      images: def.images,
    }
  }
}

impl DeleteResources {
  /// Check that every disk and instance exists and schedule it for deletion.
  ///
  /// Disks are checked before instances. Claims made before a failure are
  /// kept. Images are neither checked nor claimed.
  pub async fn validate(&self, cx: &ValidationContext<'_>) -> Result<(), ValidationError> {
    let ctx = cx.context;

    for disk in &self.disks {
      let name = ctx.resolve(disk);
      if !ctx.compute.disk_exists(&ctx.project, &ctx.zone, &name).await {
        return Err(ValidationError::not_found(
          "delete disk",
          ResourceKind::Disk,
          disk.as_str(),
        ));
      }
      cx.registry.disks().schedule(&name, cx.step)?;
    }

    for instance in &self.instances {
      let name = ctx.resolve(instance);
      if !ctx.compute.instance_exists(&ctx.project, &ctx.zone, &name).await {
        return Err(ValidationError::not_found(
          "delete instance",
          ResourceKind::Instance,
          instance.as_str(),
        ));
      }
      cx.registry.instances().schedule(&name, cx.step)?;
    }

    Ok(())
  }

  /// Delete everything. Returns the first failure, or `Ok(())` if the
  /// workflow is cancelled before the deletes finish.
  #[instrument(
    name = "delete_resources",
    skip_all,
    fields(
      workflow = %ctx.workflow_name,
      instances = self.instances.len(),
      images = self.images.len(),
      disks = self.disks.len(),
    )
  )]
  pub async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
    let mut phase = FanOut::new(ctx);
    for instance in &self.instances {
      phase.spawn(Action::DeleteInstance, ctx.resolve(instance));
    }
    for image in &self.images {
      phase.spawn(Action::DeleteImage, image.clone());
    }

    if phase.join().await? == Completion::Cancelled {
      info!("cancelled before disk deletion");
      return Ok(());
    }

    let mut phase = FanOut::new(ctx);
    for disk in &self.disks {
      phase.spawn(Action::DeleteDisk, ctx.resolve(disk));
    }
    phase.join().await?;

    Ok(())
  }
}
