use chrono::{DateTime, Utc};
use marketsim_feed::{FeedError, FeedTopic};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{info, warn};

pub const CONNECTION_CLOSED: &str = "Closed connection to the backend";
pub const CONNECTION_LOST: &str = "Lost connection to the backend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub level: AlertLevel,
    pub topic: FeedTopic,
    pub message: String,
    pub detail: Option<String>,
    pub time: DateTime<Utc>,
}

/// Bounded log of user facing connection alerts, oldest dropped first.
#[derive(Debug)]
pub struct AlertLog {
    alerts: VecDeque<Alert>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            alerts: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn connection_closed(&mut self, topic: FeedTopic) -> &Alert {
        info!(%topic, "feed connection closed");
        self.push(AlertLevel::Info, topic, CONNECTION_CLOSED, None)
    }

    pub fn connection_lost(&mut self, topic: FeedTopic, error: &FeedError) -> &Alert {
        warn!(%topic, %error, "feed connection lost");
        self.push(AlertLevel::Danger, topic, CONNECTION_LOST, Some(error.to_string()))
    }

    fn push(
        &mut self,
        level: AlertLevel,
        topic: FeedTopic,
        message: &str,
        detail: Option<String>,
    ) -> &Alert {
        if self.alerts.len() == self.capacity {
            self.alerts.pop_front();
        }
        self.alerts.push_back(Alert {
            level,
            topic,
            message: message.to_string(),
            detail,
            time: Utc::now(),
        });
        &self.alerts[self.alerts.len() - 1]
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.alerts.back()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}
