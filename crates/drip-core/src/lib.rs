//! Core types for the drip workflow engine: graphs, executions,
//! components and the store seams the runtime implements.

pub mod campaign;
pub mod component;
pub mod config;
pub mod error;
pub mod execution;
pub mod graph;
pub mod mail;
pub mod store;
pub mod trigger;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use component::{Action, Component, ComponentRegistry, Logic, StepContext, Trigger};
pub use config::DripConfig;
pub use error::{DripError, Result};
pub use execution::{ExecutionRecord, ExecutionStatus, StepResult, StepStatus, Transition};
pub use graph::{Edge, Graph, Node, NodeType};

/// Derive macro for [`component::Component`].
pub use drip_macros::Component;
