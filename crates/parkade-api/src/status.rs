//! Handlers for the expiry sweep and the status view.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/lots/{lot_id}/sweep` | Optional `?at=<RFC 3339>`; per-item failures are in the report |
//! | `GET`  | `/lots/{lot_id}/status` | Optional `?at=<RFC 3339>`; sweeps first |
//!
//! `at` defaults to the current time.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use parkade_core::{
  LotId,
  projection::{LotStatus, project_status},
  store::{ParkingStore, require_lot},
  sweep::{SweepReport, sweep_expired},
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AtParams {
  pub at: Option<DateTime<Utc>>,
}

/// `POST /lots/{lot_id}/sweep[?at=<time>]`
pub async fn sweep<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
  Query(params): Query<AtParams>,
) -> Result<Json<SweepReport>, ApiError>
where
  S: ParkingStore,
{
  let lot_id = LotId(lot_id);
  require_lot(store.as_ref(), lot_id).await?;
  let now = params.at.unwrap_or_else(Utc::now);
  let report = sweep_expired(store.as_ref(), lot_id, now).await?;
  Ok(Json(report))
}

/// `GET /lots/{lot_id}/status[?at=<time>]`
pub async fn project<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
  Query(params): Query<AtParams>,
) -> Result<Json<LotStatus>, ApiError>
where
  S: ParkingStore,
{
  let now = params.at.unwrap_or_else(Utc::now);
  let status = project_status(store.as_ref(), LotId(lot_id), now).await?;
  Ok(Json(status))
}
