//! Handlers for `/lots/{lot_id}/capacity`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/lots/{lot_id}/capacity` | Spot count per segment |
//! | `PUT`  | `/lots/{lot_id}/capacity` | Body: `{"car":40,"motorcycle":10}`; omitted segments are left alone |
//!
//! A shrink that would delete an occupied spot answers 409 with the
//! blocking numbers in `blocking_spot_numbers`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use parkade_core::{
  LotId,
  reconcile::{CapacityReport, CapacitySummary, CapacityTargets, capacity_summary, sync_capacity},
  store::ParkingStore,
};

use crate::error::ApiError;

/// `GET /lots/{lot_id}/capacity`
pub async fn summary<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
) -> Result<Json<CapacitySummary>, ApiError>
where
  S: ParkingStore,
{
  let summary = capacity_summary(store.as_ref(), LotId(lot_id)).await?;
  Ok(Json(summary))
}

/// `PUT /lots/{lot_id}/capacity`
pub async fn sync<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
  Json(targets): Json<CapacityTargets>,
) -> Result<Json<CapacityReport>, ApiError>
where
  S: ParkingStore,
{
  if targets.is_empty() {
    return Err(ApiError::BadRequest("no segment targets given".into()));
  }
  let report = sync_capacity(store.as_ref(), LotId(lot_id), &targets).await?;
  Ok(Json(report))
}
