use thiserror::Error;

use crate::client::ResourceKind;

/// Errors returned by compute API operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
  /// The resource does not exist.
  #[error("{kind} not found: {name}")]
  NotFound { kind: ResourceKind, name: String },

  /// The API rejected or failed the operation.
  #[error("compute api error on {kind} '{name}': {message}")]
  Api {
    kind: ResourceKind,
    name: String,
    message: String,
  },

  /// The operation did not finish in time.
  #[error("timed out waiting on {kind} '{name}'")]
  Timeout { kind: ResourceKind, name: String },
}

impl ComputeError {
  /// Create a not-found error.
  pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
    Self::NotFound {
      kind,
      name: name.into(),
    }
  }

  /// Create an API error.
  pub fn api(kind: ResourceKind, name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Api {
      kind,
      name: name.into(),
      message: message.into(),
    }
  }
}
