use indexmap::IndexMap;
use marketsim_feed::{OhlcBar, SymbolId, SymbolPair};
use serde::Serialize;
use smol_str::{format_smolstr, SmolStr};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Candlestick,
    Flags,
    Line,
    Volume,
}

/// Named, ordered sequence of chart points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series<P> {
    pub id: SmolStr,
    pub name: String,
    pub visible: bool,
    pub kind: SeriesKind,
    pub data: Vec<P>,
}

impl<P> Series<P> {
    pub fn new(
        id: impl Into<SmolStr>,
        name: impl Into<String>,
        kind: SeriesKind,
        visible: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            visible,
            kind,
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Serialized as the `[timestamp, open, high, low, close]` tuple charts consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "(i64, f64, f64, f64, f64)")]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl From<&OhlcBar> for Candle {
    fn from(bar: &OhlcBar) -> Self {
        Self {
            timestamp: bar.timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        }
    }
}

impl From<Candle> for (i64, f64, f64, f64, f64) {
    fn from(candle: Candle) -> Self {
        (
            candle.timestamp,
            candle.open,
            candle.high,
            candle.low,
            candle.close,
        )
    }
}

/// Serialized as `[timestamp, volume]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "(i64, f64)")]
pub struct VolumePoint {
    pub timestamp: i64,
    pub volume: f64,
}

impl From<VolumePoint> for (i64, f64) {
    fn from(point: VolumePoint) -> Self {
        (point.timestamp, point.volume)
    }
}

/// Id of the volume series paired with candlestick series `symbol`.
pub fn volume_series_id(symbol: &str) -> SmolStr {
    format_smolstr!("{symbol}-volume")
}

/// One candlestick series per currency pair, created on the first bar for that pair.
///
/// Only the first series ever created starts visible. Optional volume series mirror the
/// candlestick series and share their visibility.
#[derive(Debug)]
pub struct OhlcSeriesStore {
    candles: IndexMap<SymbolId, Series<Candle>>,
    volumes: IndexMap<SymbolId, Series<VolumePoint>>,
    track_volume: bool,
    loading: bool,
}

impl Default for OhlcSeriesStore {
    fn default() -> Self {
        Self::new(false)
    }
}

impl OhlcSeriesStore {
    pub fn new(track_volume: bool) -> Self {
        Self {
            candles: IndexMap::new(),
            volumes: IndexMap::new(),
            track_volume,
            loading: true,
        }
    }

    /// Append `bar` to the series for `pair`. Returns true if the series was created.
    pub fn ingest(&mut self, pair: &SymbolPair, bar: OhlcBar) -> bool {
        let id = pair.id();
        let created = !self.candles.contains_key(&id);

        if created {
            let visible = self.candles.is_empty();
            info!(symbol = %id, visible, "new ohlc series");
            self.candles.insert(
                id.clone(),
                Series::new(id.clone(), pair.name(), SeriesKind::Candlestick, visible),
            );
            if self.track_volume {
                self.volumes.insert(
                    id.clone(),
                    Series::new(
                        volume_series_id(&id),
                        format!("{} volume", pair.name()),
                        SeriesKind::Volume,
                        visible,
                    ),
                );
            }
        }

        if let Some(series) = self.candles.get_mut(&id) {
            series.data.push(Candle::from(&bar));
        }
        if let (Some(volume), Some(series)) = (bar.volume, self.volumes.get_mut(&id)) {
            series.data.push(VolumePoint {
                timestamp: bar.timestamp,
                volume,
            });
        }

        if self.loading {
            debug!("first ohlc bar received");
            self.loading = false;
        }

        created
    }

    /// Id of the earliest created series, used to anchor overlays.
    pub fn first_series_id(&self) -> Option<&SymbolId> {
        self.candles.keys().next()
    }

    /// Candlestick series in creation order.
    pub fn series(&self) -> impl Iterator<Item = &Series<Candle>> {
        self.candles.values()
    }

    pub fn get(&self, id: &str) -> Option<&Series<Candle>> {
        self.candles.get(id)
    }

    /// Volume series paired with candlestick series `id`, if volume tracking is enabled.
    pub fn volume(&self, id: &str) -> Option<&Series<VolumePoint>> {
        self.volumes.get(id)
    }

    /// True until the first bar arrives.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn tracks_volume(&self) -> bool {
        self.track_volume
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: i64, close: f64, volume: Option<f64>) -> OhlcBar {
        OhlcBar {
            timestamp,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close,
            volume,
        }
    }

    #[test]
    fn test_series_created_per_pair_first_visible() {
        let mut store = OhlcSeriesStore::default();
        assert!(store.is_loading());
        assert_eq!(store.first_series_id(), None);

        let eur_usd = SymbolPair::new("EUR", "USD");
        let chf_jpy = SymbolPair::new("CHF", "JPY");

        assert!(store.ingest(&eur_usd, bar(1, 1.1, None)));
        assert!(!store.is_loading());
        assert!(store.ingest(&chf_jpy, bar(1, 120.0, None)));
        assert!(!store.ingest(&eur_usd, bar(2, 1.2, None)));

        let series: Vec<_> = store.series().collect();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].id, "EUR-USD");
        assert_eq!(series[0].name, "EUR to USD");
        assert_eq!(series[0].kind, SeriesKind::Candlestick);
        assert!(series[0].visible);
        assert!(!series[1].visible);

        let closes: Vec<_> = series[0].data.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.1, 1.2]);
        assert_eq!(store.first_series_id().map(|id| id.as_str()), Some("EUR-USD"));
    }

    #[test]
    fn test_volume_series_follow_candles() {
        let mut store = OhlcSeriesStore::new(true);
        let eur_usd = SymbolPair::new("EUR", "USD");
        let gbp_usd = SymbolPair::new("GBP", "USD");

        store.ingest(&eur_usd, bar(1, 1.1, Some(10.0)));
        store.ingest(&eur_usd, bar(2, 1.1, None));
        store.ingest(&gbp_usd, bar(1, 1.3, Some(3.0)));

        let volume = store.volume("EUR-USD").unwrap();
        assert_eq!(volume.id, "EUR-USD-volume");
        assert_eq!(volume.kind, SeriesKind::Volume);
        assert!(volume.visible);
        assert_eq!(
            volume.data,
            vec![VolumePoint {
                timestamp: 1,
                volume: 10.0
            }]
        );
        assert!(!store.volume("GBP-USD").unwrap().visible);
    }

    #[test]
    fn test_points_serialize_as_chart_tuples() {
        let mut store = OhlcSeriesStore::new(true);
        store.ingest(&SymbolPair::new("EUR", "USD"), bar(1700000000000, 1.25, Some(7.0)));

        let candles = serde_json::to_value(store.get("EUR-USD").unwrap()).unwrap();
        assert_eq!(candles["id"], "EUR-USD");
        assert_eq!(candles["kind"], "candlestick");
        assert_eq!(
            candles["data"],
            serde_json::json!([[1700000000000_i64, 1.0, 2.0, 0.5, 1.25]])
        );

        let volume = serde_json::to_value(store.volume("EUR-USD").unwrap()).unwrap();
        assert_eq!(volume["data"], serde_json::json!([[1700000000000_i64, 7.0]]));
    }

    #[test]
    fn test_volume_ignored_when_not_tracked() {
        let mut store = OhlcSeriesStore::new(false);
        store.ingest(&SymbolPair::new("EUR", "USD"), bar(1, 1.1, Some(10.0)));

        assert!(!store.tracks_volume());
        assert_eq!(store.volume("EUR-USD"), None);
        assert_eq!(store.get("EUR-USD").map(Series::len), Some(1));
    }
}
