//! Fuelcost Core - Shared types and the FIFO allocation algorithm.
//!
//! This crate provides the pieces every fuelcost component agrees on:
//! - `engine` - Allocation engine, persistence boundary, and reporting
//! - `store` - `PostgreSQL` ledger and repositories
//! - `cli` - Command-line tools for migrations, costing, and reports
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no async. Anything here can be tested with plain values.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, product codes, statuses, and presentation rounding
//! - [`batch`] - Inventory batches and their single mutation path
//! - [`allocation`] - The FIFO allocation algorithm and its result type

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod allocation;
pub mod batch;
pub mod types;

pub use allocation::{AllocationOutcome, AllocationResult, LineItem, allocate};
pub use batch::{Batch, BatchError, NewBatch};
pub use types::*;
