//! HTTP server state and routing.

use crate::api;
use crate::counters::CounterAdmin;
use crate::issuer::TicketIssuer;
use crate::notifier::Notifier;
use crate::queue::QueueService;
use crate::selector::CounterSelector;
use crate::ws;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Ticket issuance path.
    pub issuer: Arc<TicketIssuer>,
    /// Queue lifecycle operations.
    pub queue: Arc<QueueService>,
    /// Counter scoring and selection.
    pub selector: Arc<CounterSelector>,
    /// Counter admin operations.
    pub counters: Arc<CounterAdmin>,
    /// Real-time fan-out hub.
    pub notifier: Arc<Notifier>,
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/api/tickets", post(api::issue_ticket))
        .route("/api/assignments", post(api::assign_to_counter))
        .route("/api/queues/:counter_id", get(api::list_queue))
        .route("/api/queues/:counter_id/stats", get(api::queue_stats))
        .route("/api/queues/:counter_id/items", post(api::add_to_queue))
        .route(
            "/api/queues/:counter_id/items/:composite_key/status",
            put(api::update_status),
        )
        .route(
            "/api/queues/:counter_id/items/:composite_key",
            axum::routing::delete(api::remove_from_queue),
        )
        .route("/api/counters", get(api::list_counters))
        .route("/api/counters/:counter_id/online", post(api::counter_online))
        .route(
            "/api/counters/:counter_id/offline",
            post(api::counter_offline),
        )
        .route(
            "/api/counters/:counter_id/clear",
            post(api::clear_counter_queue),
        )
        .route(
            "/api/counters/:counter_id/call-next",
            post(api::call_next),
        )
        .route(
            "/api/counters/:counter_id/tickets/:ticket_id/status",
            put(api::update_ticket_status),
        )
        .route("/api/ws/counters/:counter_id", get(ws::counter_updates))
        .route("/api/ws/doctors/:doctor_id", get(ws::doctor_updates))
        .route(
            "/api/ws/technicians/:technician_id",
            get(ws::technician_updates),
        )
        .route("/api/ws/broadcast", get(ws::broadcast_updates))
        .with_state(state)
}
