use crate::{
    alerts::AlertLog,
    bus::{BusEvent, EventBus, SubscriptionId, Topic},
    config::DashboardConfig,
    flags::TransactionFlagOverlay,
    ledger::TransactionLedger,
    registry::TraderRegistry,
    reports::EvaluationReportStore,
    quotes::QuoteSeriesStore,
    series::OhlcSeriesStore,
};
use marketsim_feed::{
    CommandTx, EvaluationReportMessage, FeedEvent, FeedTopic, OhlcMessage, QuoteMessage,
    TraderId, TraderParameters, TransactionMessage,
};
use serde::Serialize;
use std::{
    cell::{Ref, RefCell},
    collections::BTreeMap,
    rc::Rc,
};
use tracing::{debug, info, warn};

/// Per topic connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub connected: bool,
    /// Sessions that completed the handshake.
    pub sessions: u64,
    pub messages: u64,
    pub decode_failures: u64,
}

/// Owns every store and routes feed events into them.
///
/// All mutation happens through `&mut self`, one event at a time, so each event is fully
/// applied (including every bus subscriber) before the next one is looked at.
#[derive(Debug)]
pub struct Dashboard {
    bus: EventBus,
    registry: TraderRegistry,
    ledger: TransactionLedger,
    series: OhlcSeriesStore,
    quotes: QuoteSeriesStore,
    overlay: Rc<RefCell<TransactionFlagOverlay>>,
    reports: EvaluationReportStore,
    alerts: AlertLog,
    stats: BTreeMap<FeedTopic, FeedStats>,
}

impl Dashboard {
    /// `commands` reaches the trader-parameters feed.
    pub fn new(config: &DashboardConfig, commands: CommandTx) -> Self {
        let mut bus = EventBus::new();
        let overlay = Rc::new(RefCell::new(TransactionFlagOverlay::new()));

        let appended = Rc::clone(&overlay);
        bus.subscribe(Topic::TransactionAppended, move |event| {
            if let BusEvent::TransactionAppended(transaction) = event {
                appended.borrow_mut().on_transaction_appended(transaction);
            }
        });

        let updated = Rc::clone(&overlay);
        bus.subscribe(Topic::TraderUpdated, move |event| {
            if let BusEvent::TraderUpdated(trader) = event {
                updated.borrow_mut().on_trader_updated(trader);
            }
        });

        Self {
            bus,
            registry: TraderRegistry::new(commands),
            ledger: TransactionLedger::new(),
            series: OhlcSeriesStore::new(config.track_volume),
            quotes: QuoteSeriesStore::default(),
            overlay,
            reports: EvaluationReportStore::new(),
            alerts: AlertLog::new(config.alert_capacity),
            stats: FeedTopic::ALL
                .into_iter()
                .map(|topic| (topic, FeedStats::default()))
                .collect(),
        }
    }

    pub fn apply_parameters(&mut self, event: FeedEvent<TraderParameters>) {
        if let Some(record) = self.lifecycle(FeedTopic::TraderParameters, event) {
            self.registry.ingest_parameters(record, &mut self.bus);
        }
    }

    pub fn apply_transaction(&mut self, event: FeedEvent<TransactionMessage>) {
        if let Some(message) = self.lifecycle(FeedTopic::Transactions, event) {
            self.ledger
                .ingest(message, &mut self.registry, &mut self.bus);
        }
    }

    pub fn apply_ohlc(&mut self, event: FeedEvent<OhlcMessage>) {
        if let Some(message) = self.lifecycle(FeedTopic::Ohlc, event) {
            if self.series.ingest(&message.pair, message.bar) {
                self.overlay
                    .borrow_mut()
                    .on_series_created(&message.pair.id());
            }
        }
    }

    pub fn apply_quote(&mut self, event: FeedEvent<QuoteMessage>) {
        if let Some(quote) = self.lifecycle(FeedTopic::Quotes, event) {
            self.quotes.ingest(&quote);
        }
    }

    pub fn apply_report(&mut self, event: FeedEvent<EvaluationReportMessage>) {
        if let Some(report) = self.lifecycle(FeedTopic::EvaluationReports, event) {
            self.reports
                .ingest(report, &mut self.registry, &mut self.bus);
        }
    }

    /// Select `id` for the flag overlay, returning the number of flags now shown.
    ///
    /// Unknown ids are resolved through the registry like any other reference.
    pub fn watch_trader(&mut self, id: TraderId) -> usize {
        let trader = self.registry.resolve(id).clone();
        let mut overlay = self.overlay.borrow_mut();
        let series = overlay.watch_trader(trader, &self.ledger, &self.series);
        info!(trader_id = %id, flags = series.data.len(), "trader selected");
        series.data.len()
    }

    /// Register an additional bus subscriber, eg/ a view that re-renders on updates.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: FnMut(&BusEvent) + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn registry(&self) -> &TraderRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    pub fn series(&self) -> &OhlcSeriesStore {
        &self.series
    }

    pub fn quotes(&self) -> &QuoteSeriesStore {
        &self.quotes
    }

    pub fn flags(&self) -> Ref<'_, TransactionFlagOverlay> {
        self.overlay.borrow()
    }

    pub fn reports(&self) -> &EvaluationReportStore {
        &self.reports
    }

    pub fn alerts(&self) -> &AlertLog {
        &self.alerts
    }

    pub fn stats(&self, topic: FeedTopic) -> FeedStats {
        self.stats.get(&topic).copied().unwrap_or_default()
    }

    fn lifecycle<T>(&mut self, topic: FeedTopic, event: FeedEvent<T>) -> Option<T> {
        let stats = self.stats.entry(topic).or_default();

        match event {
            FeedEvent::Message(message) => {
                stats.messages += 1;
                Some(message)
            }
            FeedEvent::Opened => {
                stats.connected = true;
                stats.sessions += 1;
                info!(%topic, sessions = stats.sessions, "feed opened");

                // Refresh requests may have been lost with the previous session
                if topic == FeedTopic::TraderParameters
                    && stats.sessions > 1
                    && self.registry.stub_count() > 0
                {
                    debug!(stubs = self.registry.stub_count(), "re-requesting trader parameters");
                    self.registry.request_refresh();
                }
                None
            }
            FeedEvent::DecodeFailed(error) => {
                stats.decode_failures += 1;
                warn!(%topic, %error, "dropped malformed frame");
                None
            }
            FeedEvent::Error(error) if error.is_terminal() => {
                stats.connected = false;
                self.alerts.connection_lost(topic, &error);
                None
            }
            FeedEvent::Error(error) => {
                warn!(%topic, %error, "feed error");
                None
            }
            FeedEvent::Closed => {
                stats.connected = false;
                self.alerts.connection_closed(topic);
                None
            }
        }
    }
}
