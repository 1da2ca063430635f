//! IDS Guard - Main Entry Point

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use ids_guard::constants::{APP_NAME, APP_VERSION};
use ids_guard::logic::alerting::{AlertController, LogMailer, Mailer, WebhookMailer};
use ids_guard::logic::config::AppConfig;
use ids_guard::logic::events::{EventBus, LiveSink};
use ids_guard::logic::monitoring::TrafficMonitor;
use ids_guard::logic::prevention::{CommandFirewall, Firewall, NullFirewall, PreventionController};
use ids_guard::logic::simulate::Simulator;
use ids_guard::logic::store::SnapshotStore;
use ids_guard::logic::{clock, status};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    let config = AppConfig::from_env();
    log::info!("Data directory: {:?}", config.data_dir);

    let store = SnapshotStore::new(&config.data_dir);
    let bus = Arc::new(EventBus::new());
    let sink: Arc<dyn LiveSink> = bus.clone();

    let firewall: Arc<dyn Firewall> = if config.firewall_enforce {
        Arc::new(CommandFirewall)
    } else {
        Arc::new(NullFirewall)
    };
    log::info!("Firewall enforcement: {}", firewall.name());

    let mailer: Arc<dyn Mailer> = match &config.mail_gateway_url {
        Some(url) => Arc::new(WebhookMailer::new(url.clone())),
        None => Arc::new(LogMailer),
    };

    let prevention = Arc::new(PreventionController::with_parts(
        config.prevention.clone(),
        store.clone(),
        firewall,
        clock::system(),
    ));
    let alerts = Arc::new(
        AlertController::new(config.alerting.clone(), store.clone())
            .with_sink(sink.clone())
            .with_mailer(mailer),
    );
    let monitor = Arc::new(TrafficMonitor::new(store).with_sink(sink));

    let started_at = Utc::now();
    prevention.start();
    alerts.start();
    monitor.start();

    let simulator = config.simulate.then(|| {
        let sim = Arc::new(Simulator::new(
            Arc::clone(&prevention),
            Arc::clone(&alerts),
            Arc::clone(&monitor),
        ));
        sim.start();
        sim
    });

    log::info!("{} running, press Ctrl-C to stop", APP_NAME);

    let mut ticker = tokio::time::interval(STATUS_LOG_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    log::error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
            _ = ticker.tick() => {
                let s =
                    status::collect(Some(started_at), Utc::now(), &prevention, &alerts, &monitor);
                log::info!(
                    "Status: uptime {}s, threats {}, blocked {} ({} active), alerts {}, samples {}, live subscribers {}",
                    s.uptime_secs,
                    s.detected_threats,
                    s.blocked_attacks,
                    s.active_blocks,
                    s.total_alerts,
                    s.samples_ingested,
                    bus.subscriber_count()
                );
            }
        }
    }

    log::info!("Shutting down...");
    if let Some(sim) = simulator {
        sim.stop().await;
    }
    monitor.stop().await;
    alerts.stop().await;
    prevention.stop().await;
    log::info!("{} stopped", APP_NAME);
}
