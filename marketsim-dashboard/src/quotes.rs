use crate::series::{Series, SeriesKind};
use indexmap::IndexMap;
use marketsim_feed::{QuoteMessage, SymbolId};
use serde::Serialize;
use tracing::{debug, info};

/// Ask price at a point in time, serialized as `[timestamp, ask]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "(i64, f64)")]
pub struct QuotePoint {
    pub timestamp: i64,
    pub ask: f64,
}

impl From<QuotePoint> for (i64, f64) {
    fn from(point: QuotePoint) -> Self {
        (point.timestamp, point.ask)
    }
}

impl From<&QuoteMessage> for QuotePoint {
    fn from(quote: &QuoteMessage) -> Self {
        Self {
            timestamp: quote.timestamp,
            ask: quote.ask,
        }
    }
}

/// One ask price line per currency pair, in creation order. Only the first is visible.
#[derive(Debug)]
pub struct QuoteSeriesStore {
    lines: IndexMap<SymbolId, Series<QuotePoint>>,
    loading: bool,
}

impl Default for QuoteSeriesStore {
    fn default() -> Self {
        Self {
            lines: IndexMap::new(),
            loading: true,
        }
    }
}

impl QuoteSeriesStore {
    /// Append the ask price of `quote` to its pair's line. Returns true if the line was
    /// created.
    pub fn ingest(&mut self, quote: &QuoteMessage) -> bool {
        let id = quote.pair.id();
        let created = !self.lines.contains_key(&id);

        if created {
            let visible = self.lines.is_empty();
            info!(symbol = %id, name = %quote.name, visible, "new quote series");
            self.lines.insert(
                id.clone(),
                Series::new(id.clone(), quote.name.clone(), SeriesKind::Line, visible),
            );
        }
        if let Some(line) = self.lines.get_mut(&id) {
            line.data.push(QuotePoint::from(quote));
        }

        if self.loading {
            debug!("first quote received");
            self.loading = false;
        }

        created
    }

    pub fn series(&self) -> impl Iterator<Item = &Series<QuotePoint>> {
        self.lines.values()
    }

    pub fn get(&self, id: &str) -> Option<&Series<QuotePoint>> {
        self.lines.get(id)
    }

    /// True until the first quote arrives.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketsim_feed::Decode;

    fn quote(what: &str, with: &str, timestamp: i64, ask: f64) -> QuoteMessage {
        QuoteMessage::decode(&format!(
            r#"{{"whatC":{{"s":"{what}","name":"{what}x"}},"withC":{{"s":"{with}","name":"{with}x"}},"timestamp":{timestamp},"ask":{ask}}}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_quote_lines_per_pair_first_visible() {
        let mut store = QuoteSeriesStore::default();
        assert!(store.is_loading());

        assert!(store.ingest(&quote("EUR", "USD", 1, 1.08)));
        assert!(!store.is_loading());
        assert!(store.ingest(&quote("GBP", "USD", 1, 1.27)));
        assert!(!store.ingest(&quote("EUR", "USD", 2, 1.09)));

        let lines: Vec<_> = store.series().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, "EUR-USD");
        assert_eq!(lines[0].name, "EURx to USDx");
        assert_eq!(lines[0].kind, SeriesKind::Line);
        assert!(lines[0].visible);
        assert!(!lines[1].visible);
        assert_eq!(
            lines[0].data,
            vec![
                QuotePoint {
                    timestamp: 1,
                    ask: 1.08
                },
                QuotePoint {
                    timestamp: 2,
                    ask: 1.09
                },
            ]
        );
    }

    #[test]
    fn test_quote_line_serializes_points_as_pairs() {
        let mut store = QuoteSeriesStore::default();
        store.ingest(&quote("CHF", "JPY", 1700000000000, 165.5));

        let line = serde_json::to_value(store.get("CHF-JPY").unwrap()).unwrap();
        assert_eq!(line["kind"], "line");
        assert_eq!(line["data"], serde_json::json!([[1700000000000_i64, 165.5]]));
    }
}
