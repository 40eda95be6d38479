//! Buy/sell markers for the transactions of one selected trader.

use crate::{
    ledger::{Transaction, TransactionLedger},
    registry::Trader,
    series::{OhlcSeriesStore, Series, SeriesKind},
};
use marketsim_feed::{SymbolId, TraderId};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};

/// Reserved id of the overlay series. Never produced by [`SymbolPair::id`] since it has
/// no '-'.
///
/// [`SymbolPair::id`]: marketsim_feed::SymbolPair::id
pub const FLAG_SERIES_ID: &str = "selectedTraderFlags";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagTitle {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "S")]
    Sell,
}

impl fmt::Display for FlagTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagTitle::Buy => f.write_str("B"),
            FlagTitle::Sell => f.write_str("S"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagPoint {
    /// Epoch milliseconds of the transaction.
    pub x: i64,
    pub title: FlagTitle,
}

impl FlagPoint {
    /// Marker for `transaction` from the point of view of `id`, buyer side first.
    pub fn for_trader(transaction: &Transaction, id: TraderId) -> Option<Self> {
        let title = if transaction.buyer.is(id) {
            FlagTitle::Buy
        } else if transaction.seller.is(id) {
            FlagTitle::Sell
        } else {
            return None;
        };

        Some(Self {
            x: transaction.timestamp,
            title,
        })
    }
}

/// Overlay series tracking the currently selected trader.
///
/// The series is created lazily on the first selection and reused afterwards. Its data is
/// recomputed from the ledger on every selection and extended incrementally as
/// transactions arrive.
#[derive(Debug, Default)]
pub struct TransactionFlagOverlay {
    selected: Option<Trader>,
    series: Option<Series<FlagPoint>>,
    anchor: Option<SymbolId>,
}

impl TransactionFlagOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_trader(
        &mut self,
        trader: Trader,
        ledger: &TransactionLedger,
        store: &OhlcSeriesStore,
    ) -> &Series<FlagPoint> {
        let name = series_name(&trader);
        let series = self.series.get_or_insert_with(|| {
            info!("creating transaction flag series");
            Series::new(FLAG_SERIES_ID, name.clone(), SeriesKind::Flags, true)
        });

        series.name = name;
        series.data = ledger
            .all()
            .iter()
            .filter_map(|transaction| FlagPoint::for_trader(transaction, trader.id))
            .collect();

        if self.anchor.is_none() {
            self.anchor = store.first_series_id().cloned();
        }

        debug!(trader_id = %trader.id, flags = series.data.len(), "watching trader");
        self.selected = Some(trader);

        series
    }

    /// Append a marker if `transaction` involves the selected trader. Returns true if one
    /// was added.
    pub fn on_transaction_appended(&mut self, transaction: &Transaction) -> bool {
        let (Some(trader), Some(series)) = (&self.selected, &mut self.series) else {
            return false;
        };

        match FlagPoint::for_trader(transaction, trader.id) {
            Some(point) => {
                series.data.push(point);
                true
            }
            None => false,
        }
    }

    /// Anchor an overlay created before any candlestick series existed to the newly
    /// created series `id`. Returns true if the anchor was set.
    pub fn on_series_created(&mut self, id: &SymbolId) -> bool {
        if self.series.is_none() || self.anchor.is_some() {
            return false;
        }

        debug!(symbol = %id, "transaction flags anchored");
        self.anchor = Some(id.clone());
        true
    }

    /// Refresh the series name when the selected trader is enriched or renamed.
    pub fn on_trader_updated(&mut self, trader: &Trader) -> bool {
        let (Some(selected), Some(series)) = (&mut self.selected, &mut self.series) else {
            return false;
        };
        if selected.id != trader.id {
            return false;
        }

        *selected = trader.clone();
        series.name = series_name(trader);
        true
    }

    pub fn selected(&self) -> Option<&Trader> {
        self.selected.as_ref()
    }

    pub fn series(&self) -> Option<&Series<FlagPoint>> {
        self.series.as_ref()
    }

    /// Candlestick series the flags are drawn on.
    pub fn anchor(&self) -> Option<&SymbolId> {
        self.anchor.as_ref()
    }

    pub fn points(&self) -> &[FlagPoint] {
        self.series
            .as_ref()
            .map(|series| series.data.as_slice())
            .unwrap_or_default()
    }
}

fn series_name(trader: &Trader) -> String {
    format!("Transactions of {}", trader.display_name())
}
