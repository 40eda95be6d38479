//! # Marketsim Feed
//! Typed WebSocket feeds published by the market simulation backend.
//!
//! Every topic (trader parameters, transactions, OHLC bars, evaluation reports, quotes) is
//! consumed
//! through a [`FeedConnection`](connection::FeedConnection) which:
//! * Decodes frames into validated, strongly-typed messages ([`message`]).
//! * Reports malformed frames as [`DecodeError`](error::DecodeError) without tearing the
//!   connection down.
//! * Surfaces lifecycle changes (opened, closed, errored) as
//!   [`FeedEvent`](connection::FeedEvent)s.
//! * Forwards fire-and-forget control commands back to the server.
//!
//! Reconnection policy is left to the caller.

/// Feed connection sessions, lifecycle events and control commands.
pub mod connection;

/// All errors generated in `marketsim-feed`.
pub mod error;

/// Typed messages for each feed topic and their validation.
pub mod message;

/// Idle read timeout stream wrapper.
pub mod timeout;

/// Feed topics and their endpoint paths.
pub mod topic;

pub use connection::{
    run_session, spawn_session, CommandRx, CommandTx, FeedCommand, FeedConfig, FeedConnection,
    FeedEvent, FeedHandle, SessionOutcome, MIN_PING_INTERVAL,
};
pub use error::{DecodeError, FeedError};
pub use message::{
    Currency, Decode, EvaluationReportMessage, OhlcBar, OhlcMessage, QuoteMessage, SymbolId,
    SymbolPair, TraderId, TraderParameters, TransactionMessage,
};
pub use topic::FeedTopic;
