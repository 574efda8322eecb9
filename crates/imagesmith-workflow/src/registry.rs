//! Deletion registry.
//!
//! Tracks which step has scheduled each instance and disk for deletion so
//! two steps in the same workflow run cannot both delete one resource. A
//! registry is created per workflow run and handed to every step's
//! validation. Claims are never released.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use imagesmith_compute::ResourceKind;

use crate::error::ValidationError;

/// Resolved resource names of one kind, mapped to the step that claimed them.
#[derive(Debug)]
pub struct ClaimSet {
  kind: ResourceKind,
  claims: Mutex<HashMap<String, String>>,
}

impl ClaimSet {
  pub fn new(kind: ResourceKind) -> Self {
    Self {
      kind,
      claims: Mutex::new(HashMap::new()),
    }
  }

  /// Claim `name` for `step`. Returns false if it was already claimed, in
  /// which case the existing claim is left untouched.
  pub fn claim(&self, name: &str, step: &str) -> bool {
    self.schedule(name, step).is_ok()
  }

  /// Claim `name` for `step`, reporting the current owner on conflict.
  pub fn schedule(&self, name: &str, step: &str) -> Result<(), ValidationError> {
    let mut claims = self.lock();
    if let Some(owner) = claims.get(name) {
      return Err(ValidationError::DuplicateSchedule {
        kind: self.kind,
        name: name.to_string(),
        owner: owner.clone(),
      });
    }
    claims.insert(name.to_string(), step.to_string());
    Ok(())
  }

  /// The step that claimed `name`, if any.
  pub fn owner(&self, name: &str) -> Option<String> {
    self.lock().get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.lock().contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
    self.claims.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Instance and disk claims for one workflow run.
#[derive(Debug)]
pub struct DeletionRegistry {
  instances: ClaimSet,
  disks: ClaimSet,
}

impl DeletionRegistry {
  pub fn new() -> Self {
    Self {
      instances: ClaimSet::new(ResourceKind::Instance),
      disks: ClaimSet::new(ResourceKind::Disk),
    }
  }

  /// Instances scheduled for deletion.
  pub fn instances(&self) -> &ClaimSet {
    &self.instances
  }

  /// Disks scheduled for deletion.
  pub fn disks(&self) -> &ClaimSet {
    &self.disks
  }
}

impl Default for DeletionRegistry {
  fn default() -> Self {
    Self::new()
  }
}
