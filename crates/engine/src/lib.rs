//! Fuelcost Engine - FIFO costing over a pluggable batch ledger.
//!
//! # Overview
//!
//! - [`ledger`] - The [`BatchLedger`] persistence boundary
//! - [`memory`] - An in-process ledger for tests and file-driven runs
//! - [`engine`] - The per-scope [`AllocationEngine`] (simulate and commit)
//! - [`service`] - [`CostingService`], the public entry points
//! - [`report`] - Profitability reports and per-product analysis
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use chrono::NaiveDate;
//! use fuelcost_core::{CompanyId, NewBatch, ProductCode};
//! use fuelcost_engine::{CostingService, EngineConfig, InMemoryLedger};
//! use rust_decimal::Decimal;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let ledger = InMemoryLedger::new();
//! let gas = ProductCode::parse("GAS_C").unwrap();
//! ledger
//!     .record_purchase(NewBatch {
//!         company_id: CompanyId::new(1),
//!         product_code: gas.clone(),
//!         acquired_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
//!         volume: Decimal::from(100),
//!         unit_cost: Decimal::new(200, 2),
//!         reference: None,
//!     })
//!     .unwrap();
//!
//! let service = CostingService::new(Arc::new(ledger), EngineConfig::default());
//! let sold_on = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
//! let result = service
//!     .simulate(CompanyId::new(1), &gas, sold_on, Decimal::from(40))
//!     .await
//!     .unwrap();
//! assert_eq!(result.total_cost, Decimal::from(80));
//! # });
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod engine;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod report;
pub mod service;

pub use engine::{AllocationEngine, ConsumptionRequest, EngineConfig};
pub use error::CogsError;
pub use ledger::{BatchLedger, CommitRecord, LedgerError, Scope};
pub use memory::InMemoryLedger;
pub use report::{
    InventoryAdjustment, ProductAnalysis, ProfitabilityReport, ReportOptions, SaleRecord,
    product_analysis, profitability_report,
};
pub use service::CostingService;
