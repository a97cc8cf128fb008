//! HTTP handlers for the queue-routing operations.
//!
//! Thin adapters: parse the request, call the service, map the error
//! taxonomy onto status codes (see [`crate::error`]).

use crate::error::{Error, Result};
use crate::issuer::IssueRequest;
use crate::queue::IntakeFlags;
use crate::server::AppState;
use crate::types::{
    CompositeKey, CounterId, CounterStatus, QueueItem, QueueStats, QueueStatus, Sex, Ticket,
    TicketId, TicketStatus,
};
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// Tickets
// ============================================================================

/// Issue-ticket request body.
#[derive(Debug, Deserialize)]
pub struct IssueTicketBody {
    /// Explicit profile code.
    #[serde(default)]
    pub profile_code: Option<String>,
    /// Explicit appointment code.
    #[serde(default)]
    pub appointment_code: Option<String>,
    /// Raw scanned code.
    #[serde(default)]
    pub scanned_code: Option<String>,
    /// Fallback subject name.
    #[serde(default)]
    pub subject_name: Option<String>,
    /// Fallback subject age.
    #[serde(default)]
    pub subject_age: Option<u32>,
    /// Subject sex.
    #[serde(default)]
    pub subject_sex: Option<Sex>,
    /// Reported pregnancy.
    #[serde(default)]
    pub is_pregnant: bool,
    /// Reported pregnancy weeks.
    #[serde(default)]
    pub pregnancy_weeks: Option<u32>,
    /// Reported disability.
    #[serde(default)]
    pub is_disabled: bool,
}

/// `POST /api/tickets`
///
/// # Errors
///
/// `400` for unusable identity, `503` when no counter is available.
pub async fn issue_ticket(
    State(state): State<AppState>,
    Json(body): Json<IssueTicketBody>,
) -> Result<Json<Ticket>> {
    let request = IssueRequest {
        profile_code: body.profile_code,
        appointment_code: body.appointment_code,
        scanned_code: body.scanned_code,
        subject_name: body.subject_name,
        subject_age: body.subject_age,
        subject_sex: body.subject_sex,
        flags: IntakeFlags {
            is_pregnant: body.is_pregnant,
            pregnancy_weeks: body.pregnancy_weeks,
            is_disabled: body.is_disabled,
        },
    };
    let ticket = state.issuer.issue(request).await?;
    Ok(Json(ticket))
}

// ============================================================================
// Queues
// ============================================================================

/// Add-to-queue request body.
#[derive(Debug, Deserialize)]
pub struct AddToQueueBody {
    /// Composite service-assignment key, `<assignment>-<service>`.
    pub composite_key: String,
    /// Initial status; defaults to `WAITING`.
    #[serde(default)]
    pub status: Option<String>,
    /// Reported pregnancy.
    #[serde(default)]
    pub is_pregnant: bool,
    /// Reported pregnancy weeks.
    #[serde(default)]
    pub pregnancy_weeks: Option<u32>,
    /// Reported disability.
    #[serde(default)]
    pub is_disabled: bool,
}

fn parse_composite(raw: &str) -> Result<CompositeKey> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("malformed composite key: {raw}")))
}

fn parse_queue_status(raw: &str) -> Result<QueueStatus> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("unknown queue status: {raw}")))
}

/// `POST /api/queues/:counter_id/items`
///
/// # Errors
///
/// `400` for malformed keys/statuses, `404` for unknown assignments.
pub async fn add_to_queue(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
    Json(body): Json<AddToQueueBody>,
) -> Result<Json<QueueItem>> {
    let key = parse_composite(&body.composite_key)?;
    let status = match body.status.as_deref() {
        Some(raw) => parse_queue_status(raw)?,
        None => QueueStatus::Waiting,
    };
    let item = state
        .queue
        .add_to_queue(
            &key,
            &CounterId::from(counter_id),
            status,
            IntakeFlags {
                is_pregnant: body.is_pregnant,
                pregnancy_weeks: body.pregnancy_weeks,
                is_disabled: body.is_disabled,
            },
        )
        .await?;
    Ok(Json(item))
}

/// Status-change request body.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusBody {
    /// New status.
    pub status: String,
}

/// `PUT /api/queues/:counter_id/items/:composite_key/status`
///
/// # Errors
///
/// `400` for malformed input, `404` when the item is not in the queue.
pub async fn update_status(
    State(state): State<AppState>,
    Path((counter_id, composite_key)): Path<(String, String)>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<QueueItem>> {
    let key = parse_composite(&composite_key)?;
    let status = parse_queue_status(&body.status)?;
    let item = state
        .queue
        .update_status(&CounterId::from(counter_id), &key, status)
        .await?;
    Ok(Json(item))
}

/// `DELETE /api/queues/:counter_id/items/:composite_key`
///
/// # Errors
///
/// `404` when the item is not in the queue.
pub async fn remove_from_queue(
    State(state): State<AppState>,
    Path((counter_id, composite_key)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let key = parse_composite(&composite_key)?;
    state
        .queue
        .remove_from_queue(&CounterId::from(counter_id), &key)
        .await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

/// `GET /api/queues/:counter_id`
///
/// # Errors
///
/// `500` on store failures.
pub async fn list_queue(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<Vec<QueueItem>>> {
    let items = state.queue.list_queue(&CounterId::from(counter_id)).await?;
    Ok(Json(items))
}

/// `GET /api/queues/:counter_id/stats`
///
/// # Errors
///
/// `500` on store failures.
pub async fn queue_stats(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<QueueStats>> {
    let stats = state.queue.queue_stats(&CounterId::from(counter_id)).await?;
    Ok(Json(stats))
}

/// Assign-to-counter request body.
#[derive(Debug, Deserialize)]
pub struct AssignBody {
    /// Composite service-assignment key.
    pub composite_key: String,
    /// Reported pregnancy.
    #[serde(default)]
    pub is_pregnant: bool,
    /// Reported pregnancy weeks.
    #[serde(default)]
    pub pregnancy_weeks: Option<u32>,
    /// Reported disability.
    #[serde(default)]
    pub is_disabled: bool,
}

/// Assignment response: the chosen counter and the queued item.
#[derive(Debug, Serialize)]
pub struct AssignResponse {
    /// Counter the item landed on.
    pub counter: CounterStatus,
    /// The queued item with its initial position.
    pub item: QueueItem,
}

/// `POST /api/assignments` — pick the best counter and queue the item on
/// it in one step.
///
/// # Errors
///
/// `400` for malformed keys, `404` for unknown assignments, `503` when no
/// counter is available.
pub async fn assign_to_counter(
    State(state): State<AppState>,
    Json(body): Json<AssignBody>,
) -> Result<Json<AssignResponse>> {
    let key = parse_composite(&body.composite_key)?;
    let counter = state.selector.select().await?;
    let item = state
        .queue
        .add_to_queue(
            &key,
            &counter.counter_id,
            QueueStatus::Waiting,
            IntakeFlags {
                is_pregnant: body.is_pregnant,
                pregnancy_weeks: body.pregnancy_weeks,
                is_disabled: body.is_disabled,
            },
        )
        .await?;
    Ok(Json(AssignResponse { counter, item }))
}

// ============================================================================
// Counters
// ============================================================================

/// `GET /api/counters`
///
/// # Errors
///
/// `503` when the counter directory is unreadable.
pub async fn list_counters(
    State(state): State<AppState>,
) -> Result<Json<Vec<CounterStatus>>> {
    let statuses = state.selector.statuses().await?;
    Ok(Json(statuses))
}

/// Acknowledgment body shared by the admin operations.
#[derive(Debug, Serialize)]
pub struct Ack {
    /// Always `true` on success.
    pub ok: bool,
}

/// `POST /api/counters/:counter_id/online`
///
/// # Errors
///
/// `500` on presence backend failure.
pub async fn counter_online(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<Ack>> {
    state.counters.set_online(&CounterId::from(counter_id)).await?;
    Ok(Json(Ack { ok: true }))
}

/// `POST /api/counters/:counter_id/offline`
///
/// # Errors
///
/// `500` on presence backend failure.
pub async fn counter_offline(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<Ack>> {
    state
        .counters
        .set_offline(&CounterId::from(counter_id))
        .await?;
    Ok(Json(Ack { ok: true }))
}

/// `POST /api/counters/:counter_id/clear`
///
/// # Errors
///
/// `500` on store failure.
pub async fn clear_counter_queue(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<Ack>> {
    state
        .counters
        .clear_queue(&CounterId::from(counter_id))
        .await?;
    Ok(Json(Ack { ok: true }))
}

/// `POST /api/counters/:counter_id/call-next`
///
/// # Errors
///
/// `500` on store failure.
pub async fn call_next(
    State(state): State<AppState>,
    Path(counter_id): Path<String>,
) -> Result<Json<Option<Ticket>>> {
    let ticket = state
        .counters
        .call_next(&CounterId::from(counter_id))
        .await?;
    Ok(Json(ticket))
}

/// Ticket status-change body.
#[derive(Debug, Deserialize)]
pub struct TicketStatusBody {
    /// New ticket status.
    pub status: String,
}

/// `PUT /api/counters/:counter_id/tickets/:ticket_id/status`
///
/// # Errors
///
/// `400` for malformed ids/statuses, `500` on store failure.
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path((counter_id, ticket_id)): Path<(String, String)>,
    Json(body): Json<TicketStatusBody>,
) -> Result<Json<Ack>> {
    let ticket_id: TicketId = ticket_id
        .parse()
        .map_err(|_| Error::InvalidInput(format!("malformed ticket id: {ticket_id}")))?;
    let status: TicketStatus = body
        .status
        .parse()
        .map_err(|_| Error::InvalidInput(format!("unknown ticket status: {}", body.status)))?;
    state
        .counters
        .update_ticket_status(&CounterId::from(counter_id), ticket_id, status)
        .await?;
    Ok(Json(Ack { ok: true }))
}
