use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// The kinds of compute resources a workflow step can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
  Instance,
  Disk,
  Image,
}

impl fmt::Display for ResourceKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      ResourceKind::Instance => "instance",
      ResourceKind::Disk => "disk",
      ResourceKind::Image => "image",
    };
    f.write_str(name)
  }
}

/// Client for the compute API.
///
/// Names passed to these methods are already resolved: instance and disk
/// names carry the workflow suffix, image names are fully qualified.
/// Implementations handle their own retries.
#[async_trait]
pub trait ComputeClient: Send + Sync {
  /// Whether the instance exists in the given project/zone.
  async fn instance_exists(&self, project: &str, zone: &str, name: &str) -> bool;

  /// Whether the disk exists in the given project/zone.
  async fn disk_exists(&self, project: &str, zone: &str, name: &str) -> bool;

  /// Delete an instance.
  async fn delete_instance(&self, project: &str, zone: &str, name: &str)
  -> Result<(), ComputeError>;

  /// Delete a disk.
  async fn delete_disk(&self, project: &str, zone: &str, name: &str) -> Result<(), ComputeError>;

  /// Delete an image by its fully qualified name.
  async fn delete_image(&self, project: &str, name: &str) -> Result<(), ComputeError>;

  /// Block until the instance reaches a stopped state.
  async fn wait_for_instance_stopped(
    &self,
    project: &str,
    zone: &str,
    name: &str,
  ) -> Result<(), ComputeError>;
}
