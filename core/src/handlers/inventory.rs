use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use inv_shared::types::{PageRequest, PageResponse};
use inv_shared::{Error, Result};

use crate::models::context::RequestContext;
use crate::models::{Direction, ReservationStatus, Transaction, TransactionFilter, TransactionType};
use crate::services::manager::{InventoryManager, MutationRequest};
use crate::services::ports::VariantDirectory;
use crate::services::reservation_engine::{CreateItem, CreateRequest, ReservationEngine};

#[derive(Clone)]
pub struct AppState {
    pub manager: InventoryManager,
    pub reservations: ReservationEngine,
    pub pool: sqlx::PgPool,
    pub directory: Arc<dyn VariantDirectory>,
}

fn header(headers: &HeaderMap, name: &str) -> Result<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| Error::Validation(format!("missing required header {name}")))
}

/// Every reservation endpoint requires a seller context and a correlation
/// id; both are populated upstream by the gateway that verifies the
/// caller's signed token and forwards the result as trusted headers.
fn context_from_headers(headers: &HeaderMap) -> Result<RequestContext> {
    Ok(RequestContext::new(
        header(headers, "x-user-id")?,
        header(headers, "x-seller-id")?,
        headers
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
    ))
}

// ---------------------------------------------------------------------
// POST /api/inventory/reservation
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateReservationItem {
    pub variant_id: i64,
    pub reserved_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub reference_id: i64,
    pub expires_in_minutes: i64,
    pub items: Vec<CreateReservationItem>,
}

#[derive(Debug, Serialize)]
pub struct ReservationView {
    pub id: Uuid,
    pub variant_id: i64,
    pub location_id: i64,
    pub quantity: i64,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub status: ReservationStatus,
    pub total_available_after_reserve: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateReservationResponse {
    pub reference_id: i64,
    pub reservations: Vec<ReservationView>,
}

pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReservationRequest>,
) -> Result<Json<inv_shared::types::ApiResponse<CreateReservationResponse>>> {
    let ctx = context_from_headers(&headers)?;
    let outcome = state
        .reservations
        .create(
            &ctx,
            CreateRequest {
                reference_id: body.reference_id,
                expires_in_minutes: body.expires_in_minutes,
                items: body
                    .items
                    .into_iter()
                    .map(|i| CreateItem { variant_id: i.variant_id, quantity: i.reserved_quantity })
                    .collect(),
            },
        )
        .await?;

    let reservations = outcome
        .reservations
        .into_iter()
        .map(|a| ReservationView {
            id: a.reservation.id,
            variant_id: a.reservation.variant_id,
            location_id: a.reservation.location_id,
            quantity: a.reservation.quantity,
            expires_at: a.reservation.expires_at,
            status: a.reservation.status,
            total_available_after_reserve: a.total_available_after_reserve,
        })
        .collect();

    Ok(Json(inv_shared::types::ApiResponse::success(CreateReservationResponse {
        reference_id: body.reference_id,
        reservations,
    })))
}

// ---------------------------------------------------------------------
// PUT /api/inventory/reservation/status
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatusUpdate {
    Cancelled,
    Completed,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReservationStatusRequest {
    pub reference_id: i64,
    pub status: ReservationStatusUpdate,
}

pub async fn update_reservation_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateReservationStatusRequest>,
) -> Result<Json<inv_shared::types::ApiResponse<()>>> {
    let ctx = context_from_headers(&headers)?;
    let target = match body.status {
        ReservationStatusUpdate::Cancelled => ReservationStatus::Cancelled,
        ReservationStatusUpdate::Completed => ReservationStatus::Confirmed,
    };
    state.reservations.update_by_reference(&ctx, body.reference_id, target).await?;
    Ok(Json(inv_shared::types::ApiResponse::success(())))
}

// ---------------------------------------------------------------------
// POST /api/inventory/manage, /api/inventory/manage/bulk
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ManageItemRequest {
    pub variant_id: i64,
    pub location_id: i64,
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub direction: Option<Direction>,
    pub threshold: Option<i64>,
    pub reference: Option<String>,
    pub reason: String,
    pub note: Option<String>,
}

impl ManageItemRequest {
    fn into_mutation(self, ctx: &RequestContext) -> MutationRequest {
        MutationRequest {
            variant_id: self.variant_id,
            location_id: self.location_id,
            quantity: self.quantity,
            transaction_type: self.transaction_type,
            direction: self.direction,
            threshold: self.threshold,
            reference: self.reference,
            reference_type: "manual".to_string(),
            reason: self.reason,
            note: self.note,
            performed_by: ctx.user_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ManageItemResponse {
    pub variant_id: i64,
    pub location_id: i64,
    pub before_quantity: i64,
    pub after_quantity: i64,
    pub reserved_quantity: i64,
}

pub async fn manage_one(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ManageItemRequest>,
) -> Result<Json<inv_shared::types::ApiResponse<ManageItemResponse>>> {
    let ctx = context_from_headers(&headers)?;
    let mut tx = state.pool.begin().await.map_err(Error::Database)?;
    let outcome = state.manager.apply_one(&mut tx, body.into_mutation(&ctx)).await?;
    tx.commit().await.map_err(Error::Database)?;

    Ok(Json(inv_shared::types::ApiResponse::success(ManageItemResponse {
        variant_id: outcome.variant_id,
        location_id: outcome.location_id,
        before_quantity: outcome.before_quantity,
        after_quantity: outcome.after_quantity,
        reserved_quantity: outcome.reserved_quantity,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ManageBulkRequest {
    pub items: Vec<ManageItemRequest>,
}

pub async fn manage_bulk(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ManageBulkRequest>,
) -> Result<Json<inv_shared::types::ApiResponse<Vec<ManageItemResponse>>>> {
    if body.items.is_empty() {
        return Err(Error::Validation("items must not be empty".to_string()));
    }
    if body.items.len() > 100 {
        return Err(Error::Validation("items must not exceed 100 per batch".to_string()));
    }

    let ctx = context_from_headers(&headers)?;
    let requests = body.items.into_iter().map(|i| i.into_mutation(&ctx)).collect();

    let mut tx = state.pool.begin().await.map_err(Error::Database)?;
    let outcomes = state.manager.apply_batch(&mut tx, requests).await?;
    tx.commit().await.map_err(Error::Database)?;

    let response = outcomes
        .into_iter()
        .map(|o| ManageItemResponse {
            variant_id: o.variant_id,
            location_id: o.location_id,
            before_quantity: o.before_quantity,
            after_quantity: o.after_quantity,
            reserved_quantity: o.reserved_quantity,
        })
        .collect();

    Ok(Json(inv_shared::types::ApiResponse::success(response)))
}

// ---------------------------------------------------------------------
// GET /api/inventory/transactions
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    pub inventory_id: Option<Uuid>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub performed_by: Option<String>,
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<inv_shared::types::ApiResponse<PageResponse<Transaction>>>> {
    let ctx = context_from_headers(&headers)?;
    let seller_id = ctx.seller_id_i64()?;
    let locations = state.directory.active_locations_by_priority(seller_id).await?;
    let location_ids: Vec<i64> = locations.iter().map(|l| l.location_id).collect();

    let page_request = PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(50));

    let filter = TransactionFilter {
        inventory_id: query.inventory_id,
        reference_id: query.reference_id,
        reference_type: query.reference_type,
        transaction_type: query.transaction_type,
        performed_by: query.performed_by,
        location_ids: Some(location_ids),
        page: page_request.page,
        per_page: page_request.per_page,
    };

    let (data, total) = state.manager.journal().find_by_filter(&state.pool, &filter).await?;
    Ok(Json(inv_shared::types::ApiResponse::success(PageResponse::new(
        data,
        total,
        page_request.page,
        page_request.per_page,
    ))))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/inventory/reservation", post(create_reservation))
        .route("/api/inventory/reservation/status", put(update_reservation_status))
        .route("/api/inventory/manage", post(manage_one))
        .route("/api/inventory/manage/bulk", post(manage_bulk))
        .route("/api/inventory/transactions", get(list_transactions))
}
