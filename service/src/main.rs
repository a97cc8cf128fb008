//! Frontdesk queue-routing HTTP server.
//!
//! Wires the Redis-backed stores, the assignment-log consumer and the HTTP
//! surface together, then serves until SIGINT/SIGTERM.

use frontdesk::config::Config;
use frontdesk::consumer::{AssignmentConsumer, ConsumerOptions, TicketEventHandler};
use frontdesk::counters::CounterAdmin;
use frontdesk::directory::{Directory, DirectorySeed, StaticDirectory};
use frontdesk::effects::EffectQueue;
use frontdesk::issuer::TicketIssuer;
use frontdesk::notifier::Notifier;
use frontdesk::priority::PriorityRules;
use frontdesk::projector::QueueProjector;
use frontdesk::queue::QueueService;
use frontdesk::selector::{CounterSelector, RandomTieBreak};
use frontdesk::server::{build_router, AppState};
use frontdesk::types::assignment_log_key;
use frontdesk_core::clock::SystemClock;
use frontdesk_core::log_store::LogStore;
use frontdesk_core::presence::Presence;
use frontdesk_core::runtime_queue::RuntimeQueue;
use frontdesk_core::stream::{ConsumerName, GroupName};
use frontdesk_redis::{connection_manager, RedisLogStore, RedisPresence, RedisRuntimeQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frontdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Frontdesk queue-routing server");

    let config = Config::from_env();
    info!(
        redis_url = %config.redis.url,
        consumer_group = %config.consumer.group,
        "Configuration loaded"
    );

    // One multiplexed Redis connection shared by all three stores.
    let conn = connection_manager(&config.redis.url).await?;
    let store: Arc<dyn LogStore> = Arc::new(RedisLogStore::new(conn.clone()));
    let runtime_queue: Arc<dyn RuntimeQueue> = Arc::new(RedisRuntimeQueue::new(conn.clone()));
    let presence: Arc<dyn Presence> = Arc::new(RedisPresence::new(conn));
    info!("Log store connected");

    // Directory: seeded from a JSON export of the upstream systems.
    let directory: Arc<dyn Directory> = Arc::new(load_directory());

    let clock = Arc::new(SystemClock);
    let notifier = Arc::new(Notifier::new(clock.clone(), 256));
    let (effects, effects_handle) = EffectQueue::new(config.queue.effect_queue_capacity);

    let selector = Arc::new(CounterSelector::new(
        directory.clone(),
        presence.clone(),
        runtime_queue.clone(),
        Arc::new(RandomTieBreak),
        config.queue.max_queue_length,
        config.queue.average_service_minutes,
        config.queue.lookup_timeout(),
    ));

    let projector = Arc::new(QueueProjector::new(
        store.clone(),
        clock.clone(),
        config.queue.average_service_minutes,
    ));

    let queue = Arc::new(QueueService::new(
        store.clone(),
        projector,
        notifier.clone(),
        directory.clone(),
        clock.clone(),
        PriorityRules::default(),
        config.queue.lookup_timeout(),
    ));

    let issuer = Arc::new(TicketIssuer::new(
        directory,
        selector.clone(),
        store.clone(),
        runtime_queue.clone(),
        notifier.clone(),
        effects,
        clock.clone(),
        PriorityRules::default(),
        config.queue.lookup_timeout(),
        config.queue.on_time_tolerance_minutes,
    ));

    let counters = Arc::new(CounterAdmin::new(
        store.clone(),
        runtime_queue,
        presence,
        notifier.clone(),
        clock,
        config.queue.presence_ttl(),
    ));

    // One consumer worker per replica; the shared group name splits the
    // assignment log across replicas.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = AssignmentConsumer::new(
        store,
        Arc::new(TicketEventHandler::new(notifier.clone())),
        ConsumerOptions {
            key: assignment_log_key(),
            group: GroupName::new(config.consumer.group.clone()),
            consumer: ConsumerName::new(config.consumer.consumer_name.clone()),
            batch_size: config.consumer.batch_size,
            block: Duration::from_millis(config.consumer.block_ms),
            retry_delay: Duration::from_millis(config.consumer.retry_delay_ms),
        },
        shutdown_rx,
    );
    let consumer_handle = consumer.spawn();
    info!("Assignment consumer started");

    let state = AppState {
        issuer,
        queue,
        selector,
        counters,
        notifier,
    };
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the consumer; in-flight acknowledgments finish before it exits.
    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_handle.await {
        warn!(error = %e, "Consumer task did not shut down cleanly");
    }
    let _ = effects_handle.await;

    info!("Server stopped");
    Ok(())
}

/// Load the directory seed from `DIRECTORY_FILE` (default
/// `directory.json`). A missing file yields an empty directory — ticket
/// issuance then runs entirely on caller-supplied identities.
fn load_directory() -> StaticDirectory {
    let path =
        std::env::var("DIRECTORY_FILE").unwrap_or_else(|_| "directory.json".to_string());
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str::<DirectorySeed>(&raw) {
            Ok(seed) => {
                info!(path = %path, counters = seed.counters.len(), "Directory seed loaded");
                StaticDirectory::from_seed(seed)
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Directory seed unparsable, starting empty");
                StaticDirectory::new()
            }
        },
        Err(e) => {
            warn!(path = %path, error = %e, "Directory seed unreadable, starting empty");
            StaticDirectory::new()
        }
    }
}

/// Graceful shutdown signal handler.
///
/// Waits for Ctrl+C (SIGINT) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
