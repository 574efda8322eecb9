//! Imagesmith Workflow
//!
//! This crate provides the teardown steps of an image-build workflow and a
//! small runner that schedules them.
//!
//! # Architecture
//!
//! ```text
//! Workflow
//! ├── validate() - dependency checks, then every step's validate()
//! │                against one DeletionRegistry
//! └── run()      - runs ready steps concurrently, cancels on first failure
//!
//! Step
//! ├── DeleteResources         - instances + images, then disks
//! └── WaitForInstancesStopped - one wait per instance
//!
//! FanOut
//! └── one task per resource, first error wins, the rest aborted and reaped
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use imagesmith_workflow::Workflow;
//!
//! let workflow = Workflow::new(def, compute);
//! workflow.validate().await?;
//! workflow.run().await?;
//! ```

mod context;
mod delete_resources;
mod error;
mod fanout;
mod graph;
mod naming;
mod registry;
mod step;
mod wait_for_instances_stopped;
mod workflow;

pub use context::{StepContext, ValidationContext};
pub use delete_resources::DeleteResources;
pub use error::{StepError, ValidationError, WorkflowError};
pub use graph::Graph;
pub use naming::{random_suffix, resolve_name};
pub use registry::{ClaimSet, DeletionRegistry};
pub use step::Step;
pub use wait_for_instances_stopped::WaitForInstancesStopped;
pub use workflow::Workflow;
