//! HTTP surface: component schemas, graph validation and saving, event
//! intake and execution lookups.

mod error;
mod handlers;
mod server;

pub use error::ApiError;
pub use server::{AppState, GatewayServer};
