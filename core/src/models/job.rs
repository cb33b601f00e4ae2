use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The single command the engine registers with the dispatcher.
pub const EXPIRY_COMMAND: &str = "inventory.reservation.expiry";

/// Wire format for both the sorted-set member and the companion
/// `scheduled_job:{jobId}` key. Field names are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJobEnvelope {
    pub job_id: Uuid,
    pub command: String,
    pub payload: serde_json::Value,
    pub user_id: String,
    pub seller_id: String,
    pub correlation_id: String,
}

/// Payload carried by a bulk expiry job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryPayload {
    pub reservation_ids: Vec<Uuid>,
    pub reference_id: i64,
    pub is_bulk: bool,
}
