//! Handlers for `/lots` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/lots` | |
//! | `POST` | `/lots` | Body: `{"name":"Centro"}` |
//! | `GET`  | `/lots/{lot_id}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use parkade_core::{
  Error, LotId,
  lot::Lot,
  operator::register_lot,
  store::{LotStore, ParkingStore, require_lot},
};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /lots`
pub async fn list<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<Lot>>, ApiError>
where
  S: ParkingStore,
{
  let lots = store.list_lots().await.map_err(Error::storage)?;
  Ok(Json(lots))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name: String,
}

/// `POST /lots` with body `{"name":"Centro"}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ParkingStore,
{
  let lot = register_lot(store.as_ref(), body.name).await?;
  Ok((StatusCode::CREATED, Json(lot)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /lots/{lot_id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
) -> Result<Json<Lot>, ApiError>
where
  S: ParkingStore,
{
  let lot = require_lot(store.as_ref(), LotId(lot_id)).await?;
  Ok(Json(lot))
}
