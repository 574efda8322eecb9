//! Concurrent per-resource operations with a single join point.
//!
//! Every resource gets its own task. [`FanOut::join`] resolves on the first
//! of: all tasks succeeded, the first error, or cancellation. Tasks are
//! never left running: on an error or cancellation the rest are aborted and
//! reaped. Outcomes that cannot be returned are logged.

use std::sync::Arc;

use imagesmith_compute::{ComputeClient, ComputeError, ResourceKind};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::StepContext;
use crate::error::StepError;

/// A compute operation on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
  DeleteInstance,
  DeleteDisk,
  DeleteImage,
  WaitForStopped,
}

impl Action {
  fn kind(self) -> ResourceKind {
    match self {
      Action::DeleteInstance | Action::WaitForStopped => ResourceKind::Instance,
      Action::DeleteDisk => ResourceKind::Disk,
      Action::DeleteImage => ResourceKind::Image,
    }
  }

  async fn perform(
    self,
    compute: &dyn ComputeClient,
    project: &str,
    zone: &str,
    name: &str,
  ) -> Result<(), ComputeError> {
    match self {
      Action::DeleteInstance => compute.delete_instance(project, zone, name).await,
      Action::DeleteDisk => compute.delete_disk(project, zone, name).await,
      Action::DeleteImage => compute.delete_image(project, name).await,
      Action::WaitForStopped => compute.wait_for_instance_stopped(project, zone, name).await,
    }
  }
}

/// How a join point finished when no error was returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
  /// Every task succeeded.
  Finished,
  /// The workflow was cancelled before all tasks finished.
  Cancelled,
}

type Outcome = (Action, String, Result<(), ComputeError>);

pub(crate) struct FanOut {
  compute: Arc<dyn ComputeClient>,
  project: Arc<str>,
  zone: Arc<str>,
  cancel: CancellationToken,
  tasks: JoinSet<Outcome>,
}

impl FanOut {
  pub(crate) fn new(ctx: &StepContext) -> Self {
    Self {
      compute: ctx.compute.clone(),
      project: Arc::from(ctx.project.as_str()),
      zone: Arc::from(ctx.zone.as_str()),
      cancel: ctx.cancel.clone(),
      tasks: JoinSet::new(),
    }
  }

  /// Launch `action` on the resolved resource `name`.
  pub(crate) fn spawn(&mut self, action: Action, name: String) {
    let compute = self.compute.clone();
    let project = self.project.clone();
    let zone = self.zone.clone();

    debug!(?action, name = %name, "resource operation started");
    self.tasks.spawn(async move {
      let result = action
        .perform(compute.as_ref(), &project, &zone, &name)
        .await;
      (action, name, result)
    });
  }

  /// Wait for every launched task, the first error, or cancellation.
  ///
  /// On the first error or on cancellation the remaining tasks are aborted
  /// and reaped before returning.
  pub(crate) async fn join(mut self) -> Result<Completion, StepError> {
    loop {
      tokio::select! {
        biased;
        _ = self.cancel.cancelled() => {
          let outstanding = self.tasks.len();
          self.tasks.abort_all();
          self.reap().await;
          info!(outstanding, "resource operations cancelled");
          return Ok(Completion::Cancelled);
        }
        joined = self.tasks.join_next() => {
          let Some(joined) = joined else {
            return Ok(Completion::Finished);
          };
          if let Some(e) = outcome(joined) {
            error!(error = %e, remaining = self.tasks.len(), "resource operation failed");
            self.tasks.abort_all();
            self.reap().await;
            return Err(e);
          }
        }
      }
    }
  }

  /// Drain aborted tasks. Failures that landed before the abort are logged.
  async fn reap(&mut self) {
    while let Some(joined) = self.tasks.join_next().await {
      if let Some(e) = outcome(joined) {
        warn!(error = %e, "discarding resource operation failure");
      }
    }
  }
}

fn outcome(joined: Result<Outcome, JoinError>) -> Option<StepError> {
  match joined {
    Ok((action, name, Ok(()))) => {
      debug!(?action, name = %name, "resource operation completed");
      None
    }
    Ok((action, name, Err(source))) => Some(StepError::OperationFailed {
      kind: action.kind(),
      name,
      source,
    }),
    Err(e) if e.is_cancelled() => None,
    Err(e) => Some(StepError::TaskPanicked {
      message: e.to_string(),
    }),
  }
}
