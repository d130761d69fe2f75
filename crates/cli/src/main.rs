//! Fuel COGS CLI - migrations, purchases, costing and reports.
//!
//! # Usage
//!
//! ```bash
//! # Create or upgrade the database schema
//! cogs-cli migrate
//!
//! # Record a purchase batch
//! cogs-cli purchase record -c 1 -p GAS_C -d 2025-01-05 --volume 10000 --unit-cost 5.4321
//!
//! # Simulate or commit a sale
//! cogs-cli cogs simulate -c 1 -p GAS_C -d 2025-02-01 --volume 120
//! cogs-cli cogs commit -c 1 -p GAS_C -s 42 -d 2025-02-01 --volume 120
//!
//! # Company profitability report
//! cogs-cli report profitability -c 1
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `purchase` - Record and list purchase batches
//! - `cutoff` - Show or change the cost-basis cutoff
//! - `cogs` - Simulate or commit sale costing
//! - `import` - Import sales and inventory adjustments from YAML
//! - `report` - Profitability reports, from the database or a scenario file
//!
//! Results are printed as JSON on stdout. Logs go to stderr; set
//! `COGS_LOG_FORMAT=json` for structured logs and `RUST_LOG` to filter.

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fuelcost_core::{CompanyId, ProductCode, SaleId};
use fuelcost_engine::ReportOptions;

use commands::CommandError;

mod commands;

#[derive(Parser)]
#[command(name = "cogs-cli")]
#[command(author, version, about = "FIFO cost of goods sold for fuel inventory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Record and list purchase batches
    Purchase {
        #[command(subcommand)]
        action: PurchaseAction,
    },
    /// Show or change the cost-basis cutoff
    Cutoff {
        #[command(subcommand)]
        action: CutoffAction,
    },
    /// Simulate or commit sale costing
    Cogs {
        #[command(subcommand)]
        action: CogsAction,
    },
    /// Import sales and inventory adjustments from a YAML file
    Import {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Path to the YAML file
        #[arg(short, long)]
        file: String,
    },
    /// Profitability reports
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
}

#[derive(Subcommand)]
enum PurchaseAction {
    /// Record a purchase as a new batch
    Record {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Product code (e.g. `GAS_C`)
        #[arg(short, long)]
        product: ProductCode,

        /// Acquisition date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Volume in litres
        #[arg(long)]
        volume: Decimal,

        /// Cost per litre
        #[arg(long)]
        unit_cost: Decimal,

        /// Invoice or delivery reference
        #[arg(short, long)]
        reference: Option<String>,
    },
    /// List every batch for a product
    List {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Product code
        #[arg(short, long)]
        product: ProductCode,
    },
}

#[derive(Subcommand)]
enum CutoffAction {
    /// Show company and product cutoffs
    Get {
        /// Company id
        #[arg(short, long)]
        company: i64,
    },
    /// Set or clear a cutoff
    Set {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Product code; omit to change the company-wide cutoff
        #[arg(short, long)]
        product: Option<ProductCode>,

        /// Ignore batches acquired before this date (YYYY-MM-DD)
        #[arg(short, long, required_unless_present = "clear", conflicts_with = "clear")]
        date: Option<NaiveDate>,

        /// Remove the cutoff
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum CogsAction {
    /// Cost a sale without consuming stock
    Simulate {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Product code
        #[arg(short, long)]
        product: ProductCode,

        /// Sale date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Volume in litres
        #[arg(long)]
        volume: Decimal,
    },
    /// Cost a sale and consume the stock
    Commit {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Product code
        #[arg(short, long)]
        product: ProductCode,

        /// Sale id; committing the same id again returns the stored result
        #[arg(short, long)]
        sale: i64,

        /// Sale date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Volume in litres
        #[arg(long)]
        volume: Decimal,
    },
}

#[derive(Subcommand)]
enum ReportKind {
    /// Company profitability report
    Profitability {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Cost uncommitted sales from this cutoff instead of the stored one
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Only sales on or after this date
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only sales on or before this date
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Per-product analysis with current stock
    Products {
        /// Company id
        #[arg(short, long)]
        company: i64,

        /// Cost uncommitted sales from this cutoff instead of the stored one
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
    /// Run a report over a YAML scenario file, without a database
    Scenario {
        /// Path to the scenario file
        #[arg(short, long)]
        file: String,

        /// Print the per-product analysis instead
        #[arg(long)]
        products: bool,

        /// Cost uncommitted sales from this cutoff instead of the scenario's
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
}

/// Initialize logging on stderr so stdout stays clean JSON.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let json = std::env::var("COGS_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Purchase { action } => match action {
            PurchaseAction::Record {
                company,
                product,
                date,
                volume,
                unit_cost,
                reference,
            } => {
                commands::purchase::record(
                    CompanyId::new(company),
                    product,
                    date,
                    volume,
                    unit_cost,
                    reference,
                )
                .await?;
            }
            PurchaseAction::List { company, product } => {
                commands::purchase::list(CompanyId::new(company), &product).await?;
            }
        },
        Commands::Cutoff { action } => match action {
            CutoffAction::Get { company } => {
                commands::cutoff::get(CompanyId::new(company)).await?;
            }
            CutoffAction::Set {
                company,
                product,
                date,
                clear,
            } => {
                let cutoff = if clear { None } else { date };
                commands::cutoff::set(CompanyId::new(company), product, cutoff).await?;
            }
        },
        Commands::Cogs { action } => match action {
            CogsAction::Simulate {
                company,
                product,
                date,
                volume,
            } => {
                commands::cogs::simulate(CompanyId::new(company), &product, date, volume).await?;
            }
            CogsAction::Commit {
                company,
                product,
                sale,
                date,
                volume,
            } => {
                commands::cogs::commit(
                    CompanyId::new(company),
                    &product,
                    SaleId::new(sale),
                    date,
                    volume,
                )
                .await?;
            }
        },
        Commands::Import { company, file } => {
            commands::import::run(CompanyId::new(company), &file).await?;
        }
        Commands::Report { kind } => match kind {
            ReportKind::Profitability {
                company,
                start_date,
                from,
                to,
            } => {
                let options = ReportOptions {
                    cutoff_override: start_date,
                };
                commands::report::profitability(CompanyId::new(company), options, from, to)
                    .await?;
            }
            ReportKind::Products {
                company,
                start_date,
            } => {
                let options = ReportOptions {
                    cutoff_override: start_date,
                };
                commands::report::products(CompanyId::new(company), options).await?;
            }
            ReportKind::Scenario {
                file,
                products,
                start_date,
            } => {
                let options = ReportOptions {
                    cutoff_override: start_date,
                };
                commands::report::scenario(&file, options, products).await?;
            }
        },
    }
    Ok(())
}
