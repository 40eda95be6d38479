use serde::{Deserialize, Serialize};
use std::fmt;

/// Independently sequenced push streams published by the simulation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum FeedTopic {
    TraderParameters,
    Transactions,
    Ohlc,
    EvaluationReports,
    Quotes,
}

impl FeedTopic {
    pub const ALL: [FeedTopic; 5] = [
        FeedTopic::TraderParameters,
        FeedTopic::Transactions,
        FeedTopic::Ohlc,
        FeedTopic::EvaluationReports,
        FeedTopic::Quotes,
    ];

    /// Endpoint path of this topic on the backend.
    pub fn path(&self) -> &'static str {
        match self {
            FeedTopic::TraderParameters => "/trader/parameters",
            FeedTopic::Transactions => "/market/transaction",
            FeedTopic::Ohlc => "/market/ohlc",
            FeedTopic::EvaluationReports => "/trader/evaluation-report",
            FeedTopic::Quotes => "/fetchers/quote",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedTopic::TraderParameters => "trader-parameters",
            FeedTopic::Transactions => "transactions",
            FeedTopic::Ohlc => "ohlc",
            FeedTopic::EvaluationReports => "evaluation-reports",
            FeedTopic::Quotes => "quotes",
        }
    }

    /// Full endpoint url for this topic given a base such as `ws://localhost:9000`.
    pub fn url(&self, base: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), self.path())
    }
}

impl fmt::Display for FeedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
