//! Trade card render worker.
//!
//! Exposes the building blocks (config, state, monitor, routes) so the
//! binary entrypoint and the integration tests share them.

pub mod background;
pub mod config;
pub mod error;
pub mod monitor;
pub mod restart;
pub mod router;
pub mod routes;
pub mod state;
