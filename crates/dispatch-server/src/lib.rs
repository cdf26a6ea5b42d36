//! # Dispatch Server
//!
//! The gateway's dispatch core and transport:
//! - [`state::ServerState`] wires every component once at startup
//! - [`dispatcher::Dispatcher`] runs the per-invocation admission state machine
//! - [`server::Server`] frames requests over stdio and owns graceful shutdown

#![forbid(unsafe_code)]

pub mod dispatcher;
pub mod server;
pub mod state;

pub use dispatcher::{CallToolRequest, Dispatcher};
pub use server::{Server, ServerError};
pub use state::{ServerState, ServerStateBuilder};
