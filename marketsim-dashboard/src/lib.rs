//! # Marketsim Dashboard
//! Streaming state layer of the market simulation dashboard.
//!
//! Independent [`marketsim_feed`] topics are folded into a consistent in-memory view:
//! * [`TraderRegistry`](registry::TraderRegistry): one entry per trader id, stubs created
//!   on first reference and enriched in place once parameters arrive.
//! * [`TransactionLedger`](ledger::TransactionLedger): every transaction in arrival order.
//! * [`OhlcSeriesStore`](series::OhlcSeriesStore): one candlestick series per currency pair.
//! * [`QuoteSeriesStore`](quotes::QuoteSeriesStore): one ask price line per currency pair.
//! * [`TransactionFlagOverlay`](flags::TransactionFlagOverlay): buy/sell markers for the
//!   selected trader, kept in sync with the ledger through the [`EventBus`](bus::EventBus).
//! * [`EvaluationReportStore`](reports::EvaluationReportStore) and
//!   [`AlertLog`](alerts::AlertLog).
//!
//! The [`Dashboard`] owns all of them and is driven by [`runtime::run`].

pub mod alerts;
pub mod bus;
pub mod config;
pub mod dashboard;
pub mod flags;
pub mod ledger;
pub mod quotes;
pub mod registry;
pub mod reports;
pub mod runtime;
pub mod series;

pub use config::DashboardConfig;
pub use dashboard::{Dashboard, FeedStats};
