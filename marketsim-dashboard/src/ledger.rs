use crate::{
    bus::{BusEvent, EventBus},
    registry::TraderRegistry,
};
use marketsim_feed::{TraderId, TransactionMessage};
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::{debug, warn};

/// One side of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counterparty {
    Trader(TraderId),
    /// Liquidity outside the simulation, published with a negative id.
    External,
}

impl Counterparty {
    pub fn from_raw(raw: i64) -> Self {
        u64::try_from(raw)
            .map(|id| Counterparty::Trader(TraderId(id)))
            .unwrap_or(Counterparty::External)
    }

    pub fn trader_id(&self) -> Option<TraderId> {
        match self {
            Counterparty::Trader(id) => Some(*id),
            Counterparty::External => None,
        }
    }

    pub fn is(&self, id: TraderId) -> bool {
        self.trader_id() == Some(id)
    }
}

impl fmt::Display for Counterparty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counterparty::Trader(id) => write!(f, "{id}"),
            Counterparty::External => f.write_str("external"),
        }
    }
}

impl Serialize for Counterparty {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Counterparty::Trader(id) => serializer.serialize_u64(id.0),
            Counterparty::External => serializer.serialize_str("external"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transaction {
    pub buyer: Counterparty,
    pub seller: Counterparty,
    pub price: f64,
    pub amount: f64,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl Transaction {
    pub fn involves(&self, id: TraderId) -> bool {
        self.buyer.is(id) || self.seller.is(id)
    }
}

/// Append-only log of every transaction received, in arrival order.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    transactions: Vec<Transaction>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalise counterparties, resolve both sides, append and announce on
    /// [`Topic::TransactionAppended`](crate::bus::Topic::TransactionAppended).
    pub fn ingest(
        &mut self,
        message: TransactionMessage,
        registry: &mut TraderRegistry,
        bus: &mut EventBus,
    ) -> &Transaction {
        let transaction = Transaction {
            buyer: Counterparty::from_raw(message.buyer_id),
            seller: Counterparty::from_raw(message.seller_id),
            price: message.price,
            amount: message.amount,
            timestamp: message.timestamp,
        };

        for id in [transaction.buyer, transaction.seller]
            .iter()
            .filter_map(Counterparty::trader_id)
        {
            registry.resolve(id);
        }

        if transaction.buyer == Counterparty::External
            && transaction.seller == Counterparty::External
        {
            warn!(
                timestamp = transaction.timestamp,
                "transaction between two external parties"
            );
        }

        debug!(
            buyer = %transaction.buyer,
            seller = %transaction.seller,
            price = transaction.price,
            amount = transaction.amount,
            "transaction appended"
        );

        let index = self.transactions.len();
        self.transactions.push(transaction);
        bus.publish(BusEvent::TransactionAppended(transaction));

        &self.transactions[index]
    }

    pub fn all(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Transactions where `id` is buyer or seller, in arrival order.
    pub fn involving(&self, id: TraderId) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |transaction| transaction.involves(id))
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketsim_feed::FeedCommand;
    use tokio::sync::mpsc;

    fn message(buyer_id: i64, seller_id: i64, timestamp: i64) -> TransactionMessage {
        TransactionMessage {
            buyer_id,
            seller_id,
            price: 1.1,
            amount: 10.0,
            timestamp,
        }
    }

    #[test]
    fn test_counterparty_from_raw() {
        assert_eq!(Counterparty::from_raw(0), Counterparty::Trader(TraderId(0)));
        assert_eq!(Counterparty::from_raw(12), Counterparty::Trader(TraderId(12)));
        assert_eq!(Counterparty::from_raw(-1), Counterparty::External);
        assert_eq!(Counterparty::from_raw(i64::MIN), Counterparty::External);
    }

    #[test]
    fn test_counterparty_serialization() {
        let transaction = Transaction {
            buyer: Counterparty::Trader(TraderId(3)),
            seller: Counterparty::External,
            price: 2.0,
            amount: 1.0,
            timestamp: 10,
        };
        let json = serde_json::to_value(transaction).unwrap();
        assert_eq!(json["buyer"], 3);
        assert_eq!(json["seller"], "external");
        assert_eq!(Counterparty::External.to_string(), "external");
    }

    #[test]
    fn test_ingest_resolves_both_sides_and_keeps_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut ledger = TransactionLedger::new();

        ledger.ingest(message(1, -1, 300), &mut registry, &mut bus);
        ledger.ingest(message(2, 1, 100), &mut registry, &mut bus);
        let last = *ledger.ingest(message(-5, 2, 200), &mut registry, &mut bus);

        assert_eq!(last.buyer, Counterparty::External);
        assert_eq!(last.seller, Counterparty::Trader(TraderId(2)));

        let timestamps: Vec<_> = ledger.all().iter().map(|t| t.timestamp).collect();
        assert_eq!(timestamps, vec![300, 100, 200]);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(TraderId(1)));
        assert!(registry.contains(TraderId(2)));

        // One refresh per newly seen id
        assert_eq!(rx.try_recv(), Ok(FeedCommand::GetAllTraderParameters));
        assert_eq!(rx.try_recv(), Ok(FeedCommand::GetAllTraderParameters));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fully_external_transaction_is_kept() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut ledger = TransactionLedger::new();

        ledger.ingest(message(-1, -1, 1), &mut registry, &mut bus);

        assert_eq!(ledger.len(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_involving() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut registry = TraderRegistry::new(tx);
        let mut bus = EventBus::new();
        let mut ledger = TransactionLedger::new();

        ledger.ingest(message(1, 2, 1), &mut registry, &mut bus);
        ledger.ingest(message(3, -1, 2), &mut registry, &mut bus);
        ledger.ingest(message(-1, 1, 3), &mut registry, &mut bus);

        let timestamps: Vec<_> = ledger.involving(TraderId(1)).map(|t| t.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3]);
    }
}
