//! Imagesmith Compute
//!
//! This crate defines the boundary between the workflow steps and the cloud
//! compute API. Steps only talk to a [`ComputeClient`]; the actual API client
//! lives outside this workspace.
//!
//! An [`InMemoryCompute`] implementation is provided for tests and for the
//! CLI simulator. It is seeded from an [`Inventory`] and records every call
//! it receives so ordering can be asserted.

mod client;
mod error;
mod memory;

pub use client::{ComputeClient, ResourceKind};
pub use error::ComputeError;
pub use memory::{Call, InMemoryCompute, Inventory, Operation};
