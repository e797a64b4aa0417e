//! Tradecard core library.
//!
//! Domain types and the process-local building blocks of the render worker:
//! the bounded artifact cache, the FIFO execution queue, job lifecycle
//! tracking, memory sampling, and the collaborator traits implemented by
//! `tradecard-sources`.

pub mod cache;
pub mod error;
pub mod hashing;
pub mod job;
pub mod memory;
pub mod queue;
pub mod sources;
pub mod tags;
pub mod types;
