//! WebSocket connection to one feed topic of the simulation backend
//!
//! A session is a single connection attempt: it decodes text frames into typed messages,
//! reports lifecycle changes and forwards control commands to the server. Sessions never
//! reconnect on their own; callers observe [`FeedEvent::Closed`] and decide what to do.

use crate::{
    error::{DecodeError, FeedError},
    message::Decode,
    timeout::{TimeoutStream, DEFAULT_READ_TIMEOUT},
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

pub type CommandTx = mpsc::UnboundedSender<FeedCommand>;
pub type CommandRx = mpsc::UnboundedReceiver<FeedCommand>;

/// Shortest accepted ping interval.
pub const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Feed connection configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// WebSocket endpoint URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
    /// End the session if nothing is received for this long
    pub read_timeout: Option<Duration>,
    /// Maximum channel buffer size for events
    pub channel_buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9000/market/transaction".to_string(),
            ping_interval: Duration::from_secs(30),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            channel_buffer_size: 1000,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set ping interval, clamped to at least [`MIN_PING_INTERVAL`]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(MIN_PING_INTERVAL);
        self
    }

    /// Set idle read timeout (`None` disables it)
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set channel buffer size, at least 1
    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size.max(1);
        self
    }
}

/// Control command sent back to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    /// Ask the parameters feed to republish every known trader.
    GetAllTraderParameters,
    Text(String),
}

impl FeedCommand {
    pub fn as_text(&self) -> &str {
        match self {
            FeedCommand::GetAllTraderParameters => "getAllTraderParameters",
            FeedCommand::Text(text) => text,
        }
    }
}

/// Everything a session delivers, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent<T> {
    Opened,
    Message(T),
    /// Frame was dropped, the session continues.
    DecodeFailed(DecodeError),
    Error(FeedError),
    /// Always the last event of a session that got past the connect stage.
    Closed,
}

/// How a session ended.
#[derive(Debug)]
pub struct SessionOutcome {
    /// Whether the WebSocket handshake succeeded.
    pub opened: bool,
    /// Command receiver handed back so queued commands survive into the next session.
    pub commands: CommandRx,
}

/// Single-session feed connection for messages of type `T`
pub struct FeedConnection<T> {
    config: FeedConfig,
    event_tx: mpsc::Sender<FeedEvent<T>>,
    event_rx: mpsc::Receiver<FeedEvent<T>>,
    command_tx: CommandTx,
    command_rx: CommandRx,
}

impl<T> FeedConnection<T>
where
    T: Decode + Send + 'static,
{
    pub fn new(config: FeedConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.channel_buffer_size.max(1));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        Self {
            config,
            event_tx,
            event_rx,
            command_tx,
            command_rx,
        }
    }

    /// Start the session in a background task
    pub fn open(self) -> FeedHandle<T> {
        let task = spawn_session(self.config, self.event_tx, self.command_rx);

        FeedHandle {
            events: self.event_rx,
            commands: self.command_tx,
            task,
        }
    }
}

/// Handle to a running session
#[derive(Debug)]
pub struct FeedHandle<T> {
    events: mpsc::Receiver<FeedEvent<T>>,
    commands: CommandTx,
    task: JoinHandle<SessionOutcome>,
}

impl<T> FeedHandle<T> {
    /// Next event, `None` once the session task has finished and the channel drained.
    pub async fn recv(&mut self) -> Option<FeedEvent<T>> {
        self.events.recv().await
    }

    /// Fire-and-forget; only fails once the session has ended.
    pub fn send(&self, command: FeedCommand) -> Result<(), FeedError> {
        self.commands.send(command).map_err(|error| FeedError::Command {
            command: error.0.as_text().to_string(),
            reason: "session ended".to_string(),
        })
    }

    pub fn command_sender(&self) -> CommandTx {
        self.commands.clone()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait for the session to end.
    pub async fn join(self) -> Option<SessionOutcome> {
        self.task.await.ok()
    }
}

/// Spawn one session writing into caller owned channels.
///
/// Used by supervisors that keep the same event and command channels across reconnects.
pub fn spawn_session<T>(
    config: FeedConfig,
    events: mpsc::Sender<FeedEvent<T>>,
    commands: CommandRx,
) -> JoinHandle<SessionOutcome>
where
    T: Decode + Send + 'static,
{
    tokio::spawn(run_session(config, events, commands))
}

/// Run one session to completion on the current task.
///
/// Emits [`FeedEvent::Opened`] once the handshake succeeds, then messages in arrival order,
/// then [`FeedEvent::Closed`]. A failed handshake yields a single [`FeedEvent::Error`].
pub async fn run_session<T>(
    config: FeedConfig,
    events: mpsc::Sender<FeedEvent<T>>,
    mut commands: CommandRx,
) -> SessionOutcome
where
    T: Decode + Send + 'static,
{
    info!(url = %config.url, "connecting feed");

    let ws_stream = match connect_async(config.url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!(url = %config.url, error = %e, "failed to connect feed");
            let _ = events
                .send(FeedEvent::Error(FeedError::Connect {
                    url: config.url.clone(),
                    reason: e.to_string(),
                }))
                .await;
            return SessionOutcome {
                opened: false,
                commands,
            };
        }
    };

    info!(url = %config.url, "feed connected");
    if events.send(FeedEvent::Opened).await.is_err() {
        return SessionOutcome {
            opened: true,
            commands,
        };
    }

    let (mut write, read) = ws_stream.split();
    let mut read = TimeoutStream::new(read, config.read_timeout);
    let ping_interval = config.ping_interval.max(MIN_PING_INTERVAL);
    let mut ping = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);

    let failure = loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = match T::decode(&text) {
                        Ok(message) => FeedEvent::Message(message),
                        Err(e) => {
                            warn!(url = %config.url, error = %e, "dropping undecodable frame");
                            debug!(raw = &*text, "undecodable frame");
                            FeedEvent::DecodeFailed(e)
                        }
                    };
                    if events.send(event).await.is_err() {
                        warn!(url = %config.url, "event receiver dropped, ending session");
                        break None;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!(url = %config.url, "server closed feed");
                    break None;
                }
                Some(Ok(_)) => {
                    // Binary and heartbeat frames carry nothing for us
                }
                Some(Err(e)) => {
                    error!(url = %config.url, error = %e, "feed socket error");
                    break Some(FeedError::from(e));
                }
                None if read.timed_out() => {
                    break Some(FeedError::ReadTimeout(read.timeout().unwrap_or_default()));
                }
                None => break None,
            },
            Some(command) = commands.recv() => {
                debug!(url = %config.url, command = command.as_text(), "sending feed command");
                let frame = Message::Text(command.as_text().to_string().into());
                if let Err(e) = write.send(frame).await {
                    warn!(url = %config.url, error = %e, "failed to send feed command");
                    let error = FeedError::Command {
                        command: command.as_text().to_string(),
                        reason: e.to_string(),
                    };
                    if events.send(FeedEvent::Error(error)).await.is_err() {
                        break None;
                    }
                }
            }
            _ = ping.tick() => {
                if write.send(Message::Ping(Vec::new().into())).await.is_err() {
                    debug!(url = %config.url, "failed to send ping, connection likely dead");
                }
            }
        }
    };

    if let Some(error) = failure {
        let _ = events.send(FeedEvent::Error(error)).await;
    }
    let _ = events.send(FeedEvent::Closed).await;
    info!(url = %config.url, "feed session ended");

    SessionOutcome {
        opened: true,
        commands,
    }
}
