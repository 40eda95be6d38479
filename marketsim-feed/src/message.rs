//! Typed messages for every [`FeedTopic`](crate::topic::FeedTopic).
//!
//! Frames are validated here, at the connection boundary, so that the stores downstream
//! only ever see well formed records. Anything that fails validation becomes a
//! [`DecodeError`].

use crate::error::DecodeError;
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::{format_smolstr, SmolStr};
use std::collections::BTreeMap;
use tracing::debug;

/// Currency code as published by the backend (eg/ "EUR").
pub type Currency = SmolStr;

/// Symbol identifier derived from a currency pair (eg/ "EUR-USD").
pub type SymbolId = SmolStr;

/// Unique identifier of a simulated trader.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    From,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct TraderId(pub u64);

/// Decode a single text frame into a validated message.
pub trait Decode: Sized {
    fn decode(text: &str) -> Result<Self, DecodeError>;
}

/// Full trader record published on the trader-parameters topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderParameters {
    pub id: TraderId,
    pub name: String,
    pub strategy: String,
    /// Numeric strategy parameters, keyed by their wire name.
    pub parameters: BTreeMap<String, f64>,
}

#[derive(Deserialize)]
struct RawTraderParameters {
    id: i64,
    name: String,
    strategy: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Decode for TraderParameters {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw = serde_json::from_str::<RawTraderParameters>(text)?;
        Ok(Self {
            id: trader_id("id", raw.id)?,
            name: raw.name,
            strategy: raw.strategy,
            parameters: numeric_fields(raw.extra),
        })
    }
}

/// Trade event published on the transaction topic.
///
/// Counter-party ids are kept raw: negative values are the "external market maker"
/// sentinel, which is normalised by the ledger on ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub buyer_id: i64,
    pub seller_id: i64,
    pub price: f64,
    pub amount: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Decode for TransactionMessage {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let message = serde_json::from_str::<TransactionMessage>(text)?;
        positive("price", message.price)?;
        positive("amount", message.amount)?;
        Ok(message)
    }
}

/// Currency pair identifying one OHLC series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SymbolPair {
    pub what: Currency,
    pub with: Currency,
}

impl SymbolPair {
    pub fn new(what: impl AsRef<str>, with: impl AsRef<str>) -> Self {
        Self {
            what: SmolStr::new(what),
            with: SmolStr::new(with),
        }
    }

    pub fn id(&self) -> SymbolId {
        format_smolstr!("{}-{}", self.what, self.with)
    }

    pub fn name(&self) -> String {
        format!("{} to {}", self.what, self.with)
    }
}

/// Single price bar.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct OhlcBar {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// Price bar for one currency pair, published on the ohlc topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcMessage {
    pub pair: SymbolPair,
    pub bar: OhlcBar,
}

#[derive(Deserialize)]
struct RawCurrency {
    s: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOhlcMessage {
    what_c: RawCurrency,
    with_c: RawCurrency,
    ohlc: OhlcBar,
}

impl Decode for OhlcMessage {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw = serde_json::from_str::<RawOhlcMessage>(text)?;
        let bar = raw.ohlc;
        for (field, value) in [
            ("ohlc.open", bar.open),
            ("ohlc.high", bar.high),
            ("ohlc.low", bar.low),
            ("ohlc.close", bar.close),
        ] {
            finite(field, value)?;
        }
        if let Some(volume) = bar.volume {
            finite("ohlc.volume", volume)?;
        }

        Ok(Self {
            pair: SymbolPair {
                what: currency("whatC.s", &raw.what_c.s)?,
                with: currency("withC.s", &raw.with_c.s)?,
            },
            bar,
        })
    }
}

/// Performance summary of one trader, published on the evaluation-report topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReportMessage {
    pub trader_id: TraderId,
    pub currency: Currency,
    pub metrics: BTreeMap<String, f64>,
}

impl EvaluationReportMessage {
    pub fn total_returns(&self) -> Option<f64> {
        self.metrics.get("totalReturns").copied()
    }
}

#[derive(Deserialize)]
struct RawEvaluationReport {
    #[serde(rename = "traderId")]
    trader_id: i64,
    currency: RawCurrency,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Decode for EvaluationReportMessage {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw = serde_json::from_str::<RawEvaluationReport>(text)?;
        Ok(Self {
            trader_id: trader_id("traderId", raw.trader_id)?,
            currency: currency("currency.s", &raw.currency.s)?,
            metrics: numeric_fields(raw.extra),
        })
    }
}

/// Market price quote for one currency pair, published on the quote topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteMessage {
    pub pair: SymbolPair,
    /// Series display name, built from the full currency names when published
    /// (eg/ "Euro to US Dollar"), otherwise from the codes.
    pub name: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub ask: f64,
    pub bid: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuote {
    what_c: RawCurrency,
    with_c: RawCurrency,
    timestamp: i64,
    ask: f64,
    #[serde(default)]
    bid: Option<f64>,
}

impl Decode for QuoteMessage {
    fn decode(text: &str) -> Result<Self, DecodeError> {
        let raw = serde_json::from_str::<RawQuote>(text)?;
        positive("ask", raw.ask)?;
        if let Some(bid) = raw.bid {
            positive("bid", bid)?;
        }

        let pair = SymbolPair {
            what: currency("whatC.s", &raw.what_c.s)?,
            with: currency("withC.s", &raw.with_c.s)?,
        };
        let name = match (raw.what_c.name, raw.with_c.name) {
            (Some(what), Some(with)) if !what.is_empty() && !with.is_empty() => {
                format!("{what} to {with}")
            }
            _ => pair.name(),
        };

        Ok(Self {
            pair,
            name,
            timestamp: raw.timestamp,
            ask: raw.ask,
            bid: raw.bid,
        })
    }
}

fn trader_id(field: &str, raw: i64) -> Result<TraderId, DecodeError> {
    u64::try_from(raw)
        .map(TraderId)
        .map_err(|_| DecodeError::invalid(field, format!("must be >= 0, got {raw}")))
}

fn positive(field: &str, value: f64) -> Result<(), DecodeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DecodeError::invalid(field, format!("must be > 0, got {value}")))
    }
}

fn finite(field: &str, value: f64) -> Result<(), DecodeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DecodeError::invalid(field, format!("must be finite, got {value}")))
    }
}

// Codes are joined with '-' into symbol ids, so only alphanumerics are accepted.
fn currency(field: &str, code: &str) -> Result<Currency, DecodeError> {
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(SmolStr::new(code))
    } else {
        Err(DecodeError::invalid(
            field,
            format!("expected alphanumeric currency code, got {code:?}"),
        ))
    }
}

fn numeric_fields(extra: BTreeMap<String, Value>) -> BTreeMap<String, f64> {
    extra
        .into_iter()
        .filter_map(|(key, value)| match value.as_f64() {
            Some(number) => Some((key, number)),
            None => {
                debug!(%key, ?value, "ignoring non-numeric field");
                None
            }
        })
        .collect()
}
