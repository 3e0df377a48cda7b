//! `PUT /lots/{lot_id}/spots/{number}/state`
//!
//! Body: `{"state":"maintenance"}`. Only `free`, `reserved` and
//! `maintenance` are accepted; `occupied` and `subscribed` are derived and
//! answer 400.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use parkade_core::{
  LotId,
  operator::set_spot_state,
  spot::SpotState,
  store::ParkingStore,
};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StateBody {
  pub state: SpotState,
}

pub async fn set_state<S>(
  State(store): State<Arc<S>>,
  Path((lot_id, number)): Path<(i64, u32)>,
  Json(body): Json<StateBody>,
) -> Result<StatusCode, ApiError>
where
  S: ParkingStore,
{
  set_spot_state(store.as_ref(), LotId(lot_id), number, body.state).await?;
  Ok(StatusCode::NO_CONTENT)
}
