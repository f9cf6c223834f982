//! drip - workflow execution engine for marketing automation.
//!
//! Embeds the runtime that advances workflow graphs, fires schedules and
//! serves the component and event HTTP API.

mod runtime;

#[doc(hidden)]
pub use drip_core;

pub use drip_core::Component;
pub use drip_runtime::builtin_registry;

pub use runtime::prelude;
pub use runtime::{init_tracing, Drip, DripBuilder};
