//! In-process publish/subscribe between the stores and the views derived from them.
//!
//! Delivery is synchronous: [`EventBus::publish`] runs every current subscriber of the
//! event's topic, in subscription order, before it returns.

use crate::{ledger::Transaction, registry::Trader, reports::EvaluationReport};
use std::fmt;
use tracing::trace;

/// Typed topics carried by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    TraderUpdated,
    TransactionAppended,
    ReportUpdated,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::TraderUpdated => "trader-updated",
            Topic::TransactionAppended => "transaction-appended",
            Topic::ReportUpdated => "report-updated",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    TraderUpdated(Trader),
    TransactionAppended(Transaction),
    ReportUpdated(EvaluationReport),
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            BusEvent::TraderUpdated(_) => Topic::TraderUpdated,
            BusEvent::TransactionAppended(_) => Topic::TransactionAppended,
            BusEvent::ReportUpdated(_) => Topic::ReportUpdated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&BusEvent)>;

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionId
    where
        F: FnMut(&BusEvent) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            topic,
            handler: Box::new(handler),
        });
        id
    }

    /// Returns false if the subscription was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|subscriber| subscriber.id != id);
        self.subscribers.len() != before
    }

    /// Deliver to every subscriber of the event's topic and return how many were reached.
    pub fn publish(&mut self, event: BusEvent) -> usize {
        let topic = event.topic();
        let mut delivered = 0;
        for subscriber in self
            .subscribers
            .iter_mut()
            .filter(|subscriber| subscriber.topic == topic)
        {
            (subscriber.handler)(&event);
            delivered += 1;
        }
        trace!(%topic, delivered, "published");
        delivered
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .iter()
            .filter(|subscriber| subscriber.topic == topic)
            .count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("next_id", &self.next_id)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
