//! Imagesmith Config
//!
//! This crate contains the serializable workflow configuration types for
//! imagesmith. These types represent workflow definitions before they are
//! turned into runnable steps by `imagesmith-workflow`.
//!
//! Definitions are loaded from JSON files (via the CLI).

mod step;
mod workflow;

pub use step::{DeleteResourcesDef, StepDef};
pub use workflow::WorkflowDef;
