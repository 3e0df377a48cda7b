//! Handlers for `/lots/{lot_id}/zones`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/lots/{lot_id}/zones` | Ordered by name |
//! | `POST` | `/lots/{lot_id}/zones` | Body: [`ZoneRequest`]; 409 on a duplicate name |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use parkade_core::{
  LotId,
  operator::list_zones,
  provision::{ZoneRequest, create_zone},
  store::ParkingStore,
  zone::Zone,
};

use crate::error::ApiError;

/// `GET /lots/{lot_id}/zones`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
) -> Result<Json<Vec<Zone>>, ApiError>
where
  S: ParkingStore,
{
  let zones = list_zones(store.as_ref(), LotId(lot_id)).await?;
  Ok(Json(zones))
}

/// `POST /lots/{lot_id}/zones`, e.g.
/// `{"name":"Norte","sizing":{"kind":"grid","rows":2,"columns":5}}`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(lot_id): Path<i64>,
  Json(request): Json<ZoneRequest>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ParkingStore,
{
  let created = create_zone(store.as_ref(), LotId(lot_id), request).await?;
  Ok((StatusCode::CREATED, Json(created)))
}
