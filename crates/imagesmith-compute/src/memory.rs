//! In-memory compute backend.
//!
//! Models a single project/zone. Instances carry a run state so
//! [`ComputeClient::wait_for_instance_stopped`] can poll it the way the real
//! API is polled. Failures, latency and never-completing calls can be
//! injected per operation and resource name.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::client::{ComputeClient, ResourceKind};
use crate::error::ComputeError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resources to seed an [`InMemoryCompute`] with.
///
/// Instance and disk names are logical (workflow-local) names; callers
/// resolve them before seeding. Image names are used as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
  #[serde(default)]
  pub instances: Vec<String>,
  #[serde(default)]
  pub stopped_instances: Vec<String>,
  #[serde(default)]
  pub disks: Vec<String>,
  #[serde(default)]
  pub images: Vec<String>,
}

/// Operations recorded by [`InMemoryCompute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
  DeleteInstance,
  DeleteDisk,
  DeleteImage,
  WaitForInstanceStopped,
}

impl Operation {
  fn kind(self) -> ResourceKind {
    match self {
      Operation::DeleteInstance | Operation::WaitForInstanceStopped => ResourceKind::Instance,
      Operation::DeleteDisk => ResourceKind::Disk,
      Operation::DeleteImage => ResourceKind::Image,
    }
  }
}

/// A recorded call. Each operation records one entry when it starts and
/// one when it finishes, in a single global order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
  pub operation: Operation,
  pub name: String,
  pub finished: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
  Running,
  Stopped,
}

#[derive(Default)]
struct State {
  instances: HashMap<String, RunState>,
  disks: HashSet<String>,
  images: HashSet<String>,
  failures: HashMap<(Operation, String), ComputeError>,
  delays: HashMap<(Operation, String), Duration>,
  held: HashSet<(Operation, String)>,
  calls: Vec<Call>,
}

/// A [`ComputeClient`] backed by in-process state.
pub struct InMemoryCompute {
  state: Mutex<State>,
  latency: Duration,
  poll_interval: Duration,
  wait_timeout: Option<Duration>,
}

impl InMemoryCompute {
  /// Create an empty backend.
  pub fn new() -> Self {
    Self {
      state: Mutex::new(State::default()),
      latency: Duration::ZERO,
      poll_interval: DEFAULT_POLL_INTERVAL,
      wait_timeout: None,
    }
  }

  /// Seed a backend from an inventory, resolving instance and disk names
  /// with `resolve`.
  pub fn from_inventory(inventory: &Inventory, resolve: impl Fn(&str) -> String) -> Self {
    let compute = Self::new();
    for name in &inventory.instances {
      compute.add_instance(resolve(name));
    }
    for name in &inventory.stopped_instances {
      compute.add_instance(resolve(name));
      compute.stop_instance(&resolve(name));
    }
    for name in &inventory.disks {
      compute.add_disk(resolve(name));
    }
    for name in &inventory.images {
      compute.add_image(name.clone());
    }
    compute
  }

  /// Apply a fixed latency to every operation.
  pub fn with_latency(mut self, latency: Duration) -> Self {
    self.latency = latency;
    self
  }

  /// Set how often `wait_for_instance_stopped` polls the run state.
  pub fn with_poll_interval(mut self, interval: Duration) -> Self {
    self.poll_interval = interval;
    self
  }

  /// Fail `wait_for_instance_stopped` with [`ComputeError::Timeout`] when a
  /// wait lasts longer than `timeout`. Waits are unbounded by default.
  pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
    self.wait_timeout = Some(timeout);
    self
  }

  /// Add a running instance.
  pub fn add_instance(&self, name: impl Into<String>) {
    self.state().instances.insert(name.into(), RunState::Running);
  }

  /// Add a disk.
  pub fn add_disk(&self, name: impl Into<String>) {
    self.state().disks.insert(name.into());
  }

  /// Add an image.
  pub fn add_image(&self, name: impl Into<String>) {
    self.state().images.insert(name.into());
  }

  /// Mark an instance as stopped. Returns false if it does not exist.
  pub fn stop_instance(&self, name: &str) -> bool {
    match self.state().instances.get_mut(name) {
      Some(state) => {
        *state = RunState::Stopped;
        true
      }
      None => false,
    }
  }

  /// Make `operation` on `name` fail with `error`.
  pub fn fail_on(&self, operation: Operation, name: impl Into<String>, error: ComputeError) {
    self.state().failures.insert((operation, name.into()), error);
  }

  /// Delay `operation` on `name` by `delay` before it takes effect.
  pub fn delay_on(&self, operation: Operation, name: impl Into<String>, delay: Duration) {
    self.state().delays.insert((operation, name.into()), delay);
  }

  /// Make `operation` on `name` never complete.
  pub fn hold(&self, operation: Operation, name: impl Into<String>) {
    self.state().held.insert((operation, name.into()));
  }

  /// Whether the instance still exists.
  pub fn has_instance(&self, name: &str) -> bool {
    self.state().instances.contains_key(name)
  }

  /// Whether the disk still exists.
  pub fn has_disk(&self, name: &str) -> bool {
    self.state().disks.contains(name)
  }

  /// Whether the image still exists.
  pub fn has_image(&self, name: &str) -> bool {
    self.state().images.contains(name)
  }

  /// All recorded calls in order.
  pub fn calls(&self) -> Vec<Call> {
    self.state().calls.clone()
  }

  /// Names `operation` was invoked on, in invocation order.
  pub fn invoked(&self, operation: Operation) -> Vec<String> {
    self
      .state()
      .calls
      .iter()
      .filter(|c| c.operation == operation && !c.finished)
      .map(|c| c.name.clone())
      .collect()
  }

  /// Position of a call in the global call order.
  pub fn position(&self, operation: Operation, name: &str, finished: bool) -> Option<usize> {
    self
      .state()
      .calls
      .iter()
      .position(|c| c.operation == operation && c.name == name && c.finished == finished)
  }

  fn state(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn record(&self, operation: Operation, name: &str, finished: bool) {
    self.state().calls.push(Call {
      operation,
      name: name.to_string(),
      finished,
    });
  }

  /// Record the start of a call and apply latency, holds and delays.
  /// Returns an injected failure if one is configured.
  async fn begin(&self, operation: Operation, name: &str) -> Option<ComputeError> {
    self.record(operation, name, false);
    debug!(?operation, name, "compute call started");

    let (held, delay) = {
      let state = self.state();
      let key = (operation, name.to_string());
      (state.held.contains(&key), state.delays.get(&key).copied())
    };

    if held {
      std::future::pending::<()>().await;
    }
    let delay = self.latency + delay.unwrap_or(Duration::ZERO);
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    self
      .state()
      .failures
      .get(&(operation, name.to_string()))
      .cloned()
  }

  fn finish(
    &self,
    operation: Operation,
    name: &str,
    result: Result<(), ComputeError>,
  ) -> Result<(), ComputeError> {
    self.record(operation, name, true);
    debug!(?operation, name, ok = result.is_ok(), "compute call finished");
    result
  }

  async fn delete(&self, operation: Operation, name: &str) -> Result<(), ComputeError> {
    if let Some(error) = self.begin(operation, name).await {
      return self.finish(operation, name, Err(error));
    }

    let removed = {
      let mut state = self.state();
      match operation {
        Operation::DeleteInstance => state.instances.remove(name).is_some(),
        Operation::DeleteDisk => state.disks.remove(name),
        Operation::DeleteImage => state.images.remove(name),
        Operation::WaitForInstanceStopped => false,
      }
    };

    let result = if removed {
      Ok(())
    } else {
      Err(ComputeError::not_found(operation.kind(), name))
    };
    self.finish(operation, name, result)
  }
}

impl Default for InMemoryCompute {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl ComputeClient for InMemoryCompute {
  async fn instance_exists(&self, _project: &str, _zone: &str, name: &str) -> bool {
    self.has_instance(name)
  }

  async fn disk_exists(&self, _project: &str, _zone: &str, name: &str) -> bool {
    self.has_disk(name)
  }

  async fn delete_instance(
    &self,
    _project: &str,
    _zone: &str,
    name: &str,
  ) -> Result<(), ComputeError> {
    self.delete(Operation::DeleteInstance, name).await
  }

  async fn delete_disk(&self, _project: &str, _zone: &str, name: &str) -> Result<(), ComputeError> {
    self.delete(Operation::DeleteDisk, name).await
  }

  async fn delete_image(&self, _project: &str, name: &str) -> Result<(), ComputeError> {
    self.delete(Operation::DeleteImage, name).await
  }

  async fn wait_for_instance_stopped(
    &self,
    _project: &str,
    _zone: &str,
    name: &str,
  ) -> Result<(), ComputeError> {
    let operation = Operation::WaitForInstanceStopped;
    if let Some(error) = self.begin(operation, name).await {
      return self.finish(operation, name, Err(error));
    }

    let deadline = self.wait_timeout.map(|t| Instant::now() + t);
    loop {
      let state = self.state().instances.get(name).copied();
      match state {
        None => {
          return self.finish(
            operation,
            name,
            Err(ComputeError::not_found(ResourceKind::Instance, name)),
          );
        }
        Some(RunState::Stopped) => return self.finish(operation, name, Ok(())),
        Some(RunState::Running) => {
          if deadline.is_some_and(|d| Instant::now() >= d) {
            return self.finish(
              operation,
              name,
              Err(ComputeError::Timeout {
                kind: ResourceKind::Instance,
                name: name.to_string(),
              }),
            );
          }
          tokio::time::sleep(self.poll_interval).await;
        }
      }
    }
  }
}
