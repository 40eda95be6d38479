use crate::{
    bus::{BusEvent, EventBus},
    registry::TraderRegistry,
};
use indexmap::IndexMap;
use marketsim_feed::{Currency, EvaluationReportMessage, TraderId};
use tracing::{debug, warn};

pub type EvaluationReport = EvaluationReportMessage;

/// Latest evaluation report per trader.
#[derive(Debug, Default)]
pub struct EvaluationReportStore {
    reports: IndexMap<TraderId, EvaluationReport>,
    reference_currency: Option<Currency>,
}

impl EvaluationReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the report for its trader and announce it on
    /// [`Topic::ReportUpdated`](crate::bus::Topic::ReportUpdated).
    ///
    /// The first report received fixes the reference currency for all later ones.
    pub fn ingest(
        &mut self,
        report: EvaluationReport,
        registry: &mut TraderRegistry,
        bus: &mut EventBus,
    ) -> &EvaluationReport {
        let id = report.trader_id;
        registry.resolve(id);

        match &self.reference_currency {
            None => {
                debug!(currency = %report.currency, "reference currency set");
                self.reference_currency = Some(report.currency.clone());
            }
            Some(reference) if *reference != report.currency => {
                warn!(
                    trader_id = %id,
                    currency = %report.currency,
                    reference = %reference,
                    "evaluation report in non-reference currency"
                );
            }
            Some(_) => {}
        }

        self.reports.insert(id, report.clone());
        bus.publish(BusEvent::ReportUpdated(report));

        &self.reports[&id]
    }

    pub fn get(&self, id: TraderId) -> Option<&EvaluationReport> {
        self.reports.get(&id)
    }

    /// Reports in the order their traders were first reported.
    pub fn iter(&self) -> impl Iterator<Item = &EvaluationReport> {
        self.reports.values()
    }

    pub fn reference_currency(&self) -> Option<&Currency> {
        self.reference_currency.as_ref()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use smol_str::SmolStr;
    use std::{cell::RefCell, collections::BTreeMap, rc::Rc};
    use tokio::sync::mpsc;

    fn report(id: u64, currency: &str, total_returns: f64) -> EvaluationReport {
        EvaluationReport {
            trader_id: TraderId(id),
            currency: SmolStr::new(currency),
            metrics: BTreeMap::from([("totalReturns".to_string(), total_returns)]),
        }
    }

    #[test]
    fn test_latest_report_per_trader() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut store = EvaluationReportStore::new();

        store.ingest(report(1, "USD", 0.1), &mut registry, &mut bus);
        store.ingest(report(2, "USD", -0.2), &mut registry, &mut bus);
        store.ingest(report(1, "USD", 0.3), &mut registry, &mut bus);

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(TraderId(1)).and_then(|r| r.total_returns()), Some(0.3));
        let order: Vec<_> = store.iter().map(|r| r.trader_id).collect();
        assert_eq!(order, vec![TraderId(1), TraderId(2)]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reference_currency_from_first_report() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut store = EvaluationReportStore::new();
        assert_eq!(store.reference_currency(), None);

        store.ingest(report(1, "CHF", 0.0), &mut registry, &mut bus);
        store.ingest(report(2, "USD", 0.0), &mut registry, &mut bus);

        assert_eq!(store.reference_currency().map(|c| c.as_str()), Some("CHF"));
    }

    #[test]
    fn test_ingest_publishes_report_updated() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut store = EvaluationReportStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            bus.subscribe(Topic::ReportUpdated, move |event| {
                if let BusEvent::ReportUpdated(report) = event {
                    seen.borrow_mut().push(report.trader_id);
                }
            });
        }

        store.ingest(report(4, "USD", 1.0), &mut registry, &mut bus);
        assert_eq!(*seen.borrow(), vec![TraderId(4)]);
    }
}
