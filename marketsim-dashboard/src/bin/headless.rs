use marketsim_dashboard::{runtime, DashboardConfig};
use tracing::info;

#[tokio::main]
async fn main() {
    init_logging();

    let config = DashboardConfig::from_env();
    info!(
        base_url = %config.base_url,
        track_volume = config.track_volume,
        watch_trader = ?config.watch_trader,
        "starting marketsim dashboard"
    );

    let dashboard = runtime::run(config).await;
    info!(
        traders = dashboard.registry().len(),
        transactions = dashboard.ledger().len(),
        series = dashboard.series().len(),
        "marketsim dashboard stopped"
    );
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
