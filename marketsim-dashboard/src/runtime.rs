//! Supervised feed connections and the single loop applying their events to a [`Dashboard`].

use crate::{config::DashboardConfig, dashboard::Dashboard};
use marketsim_feed::{
    run_session, CommandRx, Decode, EvaluationReportMessage, FeedConfig, FeedEvent, FeedTopic,
    OhlcMessage, QuoteMessage, TraderParameters, TransactionMessage,
};
use rand::Rng;
use std::{future::Future, time::Duration};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant},
};
use tracing::{debug, error, info, warn};

/// Exponential reconnect backoff with random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to every attempt.
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(32000),
            jitter: Duration::from_millis(500),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (0 based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(1 << attempt.min(16))
            .min(self.max_delay)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }
}

/// Keep a feed connected, reconnecting with `policy` after every session ends.
///
/// The same event and command channels are used for every session, so commands queued
/// while disconnected are sent once the next session opens. The backoff resets after a
/// session that completed its handshake. Stops when the event receiver is dropped.
pub fn supervise<T>(
    config: FeedConfig,
    policy: ReconnectPolicy,
    events: mpsc::Sender<FeedEvent<T>>,
    mut commands: CommandRx,
) -> JoinHandle<()>
where
    T: Decode + Send + 'static,
{
    tokio::spawn(async move {
        let mut attempt = 0u32;
        loop {
            let outcome = run_session(config.clone(), events.clone(), commands).await;
            commands = outcome.commands;

            if events.is_closed() {
                debug!(url = %config.url, "event receiver dropped, feed supervisor stopping");
                return;
            }
            if outcome.opened {
                attempt = 0;
            }

            let delay = policy.delay(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                url = %config.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "feed disconnected, reconnecting"
            );
            tokio::time::sleep(delay).await;
        }
    })
}

struct Feeds {
    parameters: mpsc::Receiver<FeedEvent<TraderParameters>>,
    transactions: mpsc::Receiver<FeedEvent<TransactionMessage>>,
    ohlc: mpsc::Receiver<FeedEvent<OhlcMessage>>,
    reports: mpsc::Receiver<FeedEvent<EvaluationReportMessage>>,
    quotes: mpsc::Receiver<FeedEvent<QuoteMessage>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Feeds {
    /// `parameter_commands` is the receiving end of the registry's command channel.
    fn start(config: &DashboardConfig, parameter_commands: CommandRx) -> Self {
        let mut tasks = Vec::with_capacity(FeedTopic::ALL.len());
        Self {
            parameters: start_feed(
                config,
                FeedTopic::TraderParameters,
                parameter_commands,
                &mut tasks,
            ),
            transactions: start_feed(config, FeedTopic::Transactions, idle_commands(), &mut tasks),
            ohlc: start_feed(config, FeedTopic::Ohlc, idle_commands(), &mut tasks),
            reports: start_feed(config, FeedTopic::EvaluationReports, idle_commands(), &mut tasks),
            quotes: start_feed(config, FeedTopic::Quotes, idle_commands(), &mut tasks),
            tasks,
        }
    }
}

impl Drop for Feeds {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

fn start_feed<T>(
    config: &DashboardConfig,
    topic: FeedTopic,
    commands: CommandRx,
    tasks: &mut Vec<JoinHandle<()>>,
) -> mpsc::Receiver<FeedEvent<T>>
where
    T: Decode + Send + 'static,
{
    let feed = config.feed_config(topic);
    let (tx, rx) = mpsc::channel(feed.channel_buffer_size.max(1));
    info!(%topic, url = %feed.url, "starting feed");
    tasks.push(supervise(feed, config.reconnect, tx, commands));
    rx
}

// Topics nobody sends commands to
fn idle_commands() -> CommandRx {
    mpsc::unbounded_channel().1
}

/// Run until Ctrl-C.
pub async fn run(config: DashboardConfig) -> Dashboard {
    run_until(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Connect every feed and apply their events until `shutdown` completes, then return the
/// final state.
pub async fn run_until<F>(config: DashboardConfig, shutdown: F) -> Dashboard
where
    F: Future<Output = ()>,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let mut dashboard = Dashboard::new(&config, command_tx);
    if let Some(id) = config.watch_trader {
        dashboard.watch_trader(id);
    }

    let mut feeds = Feeds::start(&config, command_rx);
    let mut heartbeat = interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = feeds.parameters.recv() => dashboard.apply_parameters(event),
            Some(event) = feeds.transactions.recv() => dashboard.apply_transaction(event),
            Some(event) = feeds.ohlc.recv() => dashboard.apply_ohlc(event),
            Some(event) = feeds.reports.recv() => dashboard.apply_report(event),
            Some(event) = feeds.quotes.recv() => dashboard.apply_quote(event),
            _ = heartbeat.tick() => log_heartbeat(&dashboard),
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    dashboard
}

fn log_heartbeat(dashboard: &Dashboard) {
    let connected = FeedTopic::ALL
        .iter()
        .filter(|topic| dashboard.stats(**topic).connected)
        .count();
    let flags = dashboard.flags();

    info!(
        connected,
        traders = dashboard.registry().len(),
        stubs = dashboard.registry().stub_count(),
        transactions = dashboard.ledger().len(),
        series = dashboard.series().len(),
        loading = dashboard.series().is_loading(),
        quotes = dashboard.quotes().len(),
        reports = dashboard.reports().len(),
        alerts = dashboard.alerts().len(),
        selected = ?flags.selected().map(|trader| trader.id),
        flags = flags.points().len(),
        "heartbeat"
    );
}
