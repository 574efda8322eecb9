//! Workflow runner.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use imagesmith_compute::ComputeClient;
use imagesmith_config::WorkflowDef;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::context::{StepContext, ValidationContext};
use crate::error::WorkflowError;
use crate::graph::Graph;
use crate::naming::random_suffix;
use crate::registry::DeletionRegistry;
use crate::step::Step;

/// A workflow run: its steps, their dependencies and the shared step
/// context.
///
/// One run owns one [`DeletionRegistry`]. Call [`Workflow::validate`] once,
/// then [`Workflow::run`].
pub struct Workflow {
  steps: BTreeMap<String, Step>,
  dependencies: BTreeMap<String, Vec<String>>,
  context: StepContext,
  registry: DeletionRegistry,
}

impl Workflow {
  /// Create a run with a random suffix.
  pub fn new(def: WorkflowDef, compute: Arc<dyn ComputeClient>) -> Self {
    Self::with_suffix(def, compute, random_suffix())
  }

  /// Create a run with a fixed suffix.
  pub fn with_suffix(
    def: WorkflowDef,
    compute: Arc<dyn ComputeClient>,
    suffix: impl Into<String>,
  ) -> Self {
    let context = StepContext::new(def.name, suffix, def.project, def.zone, compute);
    let steps = def
      .steps
      .into_iter()
      .map(|(name, step)| (name, Step::from(step)))
      .collect();

    Self {
      steps,
      dependencies: def.dependencies,
      context,
      registry: DeletionRegistry::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.context.workflow_name
  }

  pub fn suffix(&self) -> &str {
    &self.context.suffix
  }

  pub fn steps(&self) -> &BTreeMap<String, Step> {
    &self.steps
  }

  pub fn registry(&self) -> &DeletionRegistry {
    &self.registry
  }

  /// The token that cancels this run.
  pub fn cancel_token(&self) -> CancellationToken {
    self.context.cancel.clone()
  }

  /// Check dependencies, then validate every step concurrently.
  ///
  /// Reports the first failing step in name order.
  #[instrument(name = "workflow_validate", skip(self), fields(workflow = %self.name(), suffix = %self.suffix()))]
  pub async fn validate(&self) -> Result<(), WorkflowError> {
    self.graph()?;

    let validations = self.steps.iter().map(|(name, step)| async move {
      let cx = ValidationContext {
        step: name,
        context: &self.context,
        registry: &self.registry,
      };
      (name, step.validate(&cx).await)
    });

    for (name, result) in futures::future::join_all(validations).await {
      if let Err(source) = result {
        error!(step = %name, error = %source, "step_invalid");
        return Err(WorkflowError::Validation {
          step: name.clone(),
          source,
        });
      }
    }

    info!(steps = self.steps.len(), "workflow_validated");
    Ok(())
  }

  /// Run steps in dependency order, concurrently where possible.
  ///
  /// The first step failure cancels the run so sibling steps stop at their
  /// next join point, and is returned once they have all returned.
  #[instrument(name = "workflow_run", skip(self), fields(workflow = %self.name(), suffix = %self.suffix()))]
  pub async fn run(&self) -> Result<(), WorkflowError> {
    let graph = self.graph()?;
    let cancel = &self.context.cancel;
    let mut completed: HashSet<String> = HashSet::new();

    info!(steps = self.steps.len(), "workflow_started");

    loop {
      if cancel.is_cancelled() {
        warn!("workflow cancelled");
        return Err(WorkflowError::Cancelled);
      }

      let ready = graph.ready(&completed);
      if ready.is_empty() {
        break;
      }

      info!(ready_steps = ?ready, "running batch of ready steps");

      let mut running: FuturesUnordered<_> = ready
        .iter()
        .filter_map(|name| self.steps.get(name).map(|step| (name, step)))
        .map(|(name, step)| async move {
          info!(step = %name, step_type = step.type_name(), "step_started");
          (name, step.run(&self.context).await)
        })
        .collect();

      let mut failure = None;
      while let Some((name, result)) = running.next().await {
        match result {
          Ok(()) if cancel.is_cancelled() => {
            info!(step = %name, "step_stopped");
          }
          Ok(()) => {
            info!(step = %name, "step_completed");
            completed.insert(name.clone());
          }
          Err(source) => {
            error!(step = %name, error = %source, "step_failed");
            if failure.is_none() {
              cancel.cancel();
              failure = Some(WorkflowError::StepFailed {
                step: name.clone(),
                source,
              });
            }
          }
        }
      }

      if let Some(e) = failure {
        return Err(e);
      }
    }

    info!("workflow_completed");
    Ok(())
  }

  fn graph(&self) -> Result<Graph, WorkflowError> {
    Graph::new(self.steps.keys(), &self.dependencies)
  }
}
