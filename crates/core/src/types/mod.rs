//! Core types for fuelcost.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod product;
pub mod status;

pub use id::*;
pub use money::{
    MAX_AMOUNT, MAX_UNIT_COST, MAX_VOLUME, MONEY_SCALE, VOLUME_SCALE, margin_pct, present_money,
    present_volume,
};
pub use product::{ProductCode, ProductCodeError};
pub use status::*;
