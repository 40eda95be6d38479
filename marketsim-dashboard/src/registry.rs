use crate::bus::{BusEvent, EventBus};
use indexmap::{map::Entry, IndexMap};
use marketsim_feed::{CommandTx, FeedCommand, TraderId, TraderParameters};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Display name used for traders that are only known by id.
pub const UNKNOWN: &str = "unknown";

/// Trader known to the dashboard.
///
/// A stub is created the first time an id is referenced by any feed and enriched in place
/// once its parameters arrive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trader {
    pub id: TraderId,
    pub name: Option<String>,
    pub strategy: Option<String>,
    pub parameters: BTreeMap<String, f64>,
}

impl Trader {
    pub fn stub(id: TraderId) -> Self {
        Self {
            id,
            name: None,
            strategy: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn is_stub(&self) -> bool {
        self.name.is_none() && self.strategy.is_none()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn display_strategy(&self) -> &str {
        self.strategy.as_deref().unwrap_or(UNKNOWN)
    }

    fn enrich(&mut self, record: TraderParameters) {
        self.name = Some(record.name);
        self.strategy = Some(record.strategy);
        self.parameters = record.parameters;
    }
}

impl From<TraderParameters> for Trader {
    fn from(record: TraderParameters) -> Self {
        let mut trader = Trader::stub(record.id);
        trader.enrich(record);
        trader
    }
}

/// Single source of truth for trader identity, one entry per id.
#[derive(Debug)]
pub struct TraderRegistry {
    traders: IndexMap<TraderId, Trader>,
    commands: CommandTx,
}

impl TraderRegistry {
    /// `commands` reaches the trader-parameters feed and is used to request a full refresh
    /// whenever an unknown id is referenced.
    pub fn new(commands: CommandTx) -> Self {
        Self {
            traders: IndexMap::new(),
            commands,
        }
    }

    /// Return the canonical entry for `id`, creating a stub if the id was never seen.
    pub fn resolve(&mut self, id: TraderId) -> &Trader {
        match self.traders.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(trader_id = %id, "unknown trader referenced, creating stub");
                send_refresh(&self.commands);
                entry.insert(Trader::stub(id))
            }
        }
    }

    /// Upsert a full trader record and announce it on [`Topic::TraderUpdated`].
    ///
    /// An existing entry (stub or not) is updated in place, keeping its position.
    ///
    /// [`Topic::TraderUpdated`]: crate::bus::Topic::TraderUpdated
    pub fn ingest_parameters(&mut self, record: TraderParameters, bus: &mut EventBus) -> &Trader {
        let id = record.id;
        let trader = self
            .traders
            .entry(id)
            .or_insert_with(|| Trader::stub(id));
        trader.enrich(record);

        debug!(trader_id = %id, name = trader.display_name(), "trader parameters updated");
        bus.publish(BusEvent::TraderUpdated(trader.clone()));

        &self.traders[&id]
    }

    /// Ask the parameters feed to republish every trader.
    pub fn request_refresh(&self) {
        send_refresh(&self.commands);
    }

    pub fn get(&self, id: TraderId) -> Option<&Trader> {
        self.traders.get(&id)
    }

    pub fn contains(&self, id: TraderId) -> bool {
        self.traders.contains_key(&id)
    }

    /// Every known trader, in first-seen order.
    pub fn all(&self) -> Vec<Trader> {
        self.traders.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trader> {
        self.traders.values()
    }

    pub fn stub_count(&self) -> usize {
        self.traders.values().filter(|trader| trader.is_stub()).count()
    }

    pub fn len(&self) -> usize {
        self.traders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traders.is_empty()
    }
}

fn send_refresh(commands: &CommandTx) {
    if let Err(e) = commands.send(FeedCommand::GetAllTraderParameters) {
        warn!(error = %e, "parameters feed gone, refresh request dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Topic;
    use marketsim_feed::CommandRx;
    use std::{cell::RefCell, rc::Rc};
    use tokio::sync::mpsc;

    fn registry() -> (TraderRegistry, CommandRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TraderRegistry::new(tx), rx)
    }

    fn parameters(id: u64, name: &str) -> TraderParameters {
        TraderParameters {
            id: TraderId(id),
            name: name.to_string(),
            strategy: "random".to_string(),
            parameters: BTreeMap::from([("initMoney".to_string(), 100.0)]),
        }
    }

    fn drain(rx: &mut CommandRx) -> Vec<FeedCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[test]
    fn test_resolve_creates_single_stub_and_requests_refresh_once() {
        let (mut registry, mut rx) = registry();

        let trader = registry.resolve(TraderId(5)).clone();
        assert!(trader.is_stub());
        assert_eq!(trader.display_name(), UNKNOWN);

        assert_eq!(registry.resolve(TraderId(5)), &trader);
        assert_eq!(registry.len(), 1);
        assert_eq!(drain(&mut rx), vec![FeedCommand::GetAllTraderParameters]);
    }

    #[test]
    fn test_ingest_enriches_stub_in_place() {
        let (mut registry, mut rx) = registry();
        let mut bus = EventBus::new();

        registry.resolve(TraderId(2));
        registry.resolve(TraderId(1));
        registry.ingest_parameters(parameters(2, "bob"), &mut bus);

        let all = registry.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, TraderId(2));
        assert_eq!(all[0].display_name(), "bob");
        assert_eq!(all[0].parameters.get("initMoney"), Some(&100.0));
        assert!(all[1].is_stub());

        // Resolving an enriched trader never re-requests
        drain(&mut rx);
        registry.resolve(TraderId(2));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_ingest_publishes_trader_updated() {
        let (mut registry, _rx) = registry();
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            bus.subscribe(Topic::TraderUpdated, move |event| {
                if let BusEvent::TraderUpdated(trader) = event {
                    seen.borrow_mut().push(trader.display_name().to_string());
                }
            });
        }

        registry.ingest_parameters(parameters(1, "alice"), &mut bus);
        registry.ingest_parameters(parameters(1, "alice v2"), &mut bus);

        assert_eq!(*seen.borrow(), vec!["alice", "alice v2"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_one_entry_per_id_regardless_of_order() {
        let (mut registry, _rx) = registry();
        let mut bus = EventBus::new();

        registry.ingest_parameters(parameters(3, "carol"), &mut bus);
        registry.resolve(TraderId(3));
        registry.resolve(TraderId(4));
        registry.ingest_parameters(parameters(4, "dave"), &mut bus);
        registry.ingest_parameters(parameters(3, "carol"), &mut bus);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.stub_count(), 0);
    }

    #[test]
    fn test_resolve_with_closed_command_channel() {
        let (mut registry, rx) = registry();
        drop(rx);

        assert!(registry.resolve(TraderId(9)).is_stub());
        assert!(registry.contains(TraderId(9)));
        registry.request_refresh();
    }

    #[test]
    fn test_request_refresh_sends_every_time() {
        let (registry, mut rx) = registry();

        registry.request_refresh();
        registry.request_refresh();

        assert_eq!(rx.try_recv(), Ok(FeedCommand::GetAllTraderParameters));
        assert_eq!(rx.try_recv(), Ok(FeedCommand::GetAllTraderParameters));
        assert!(rx.try_recv().is_err());
    }
}
