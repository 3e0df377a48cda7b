//! Operator actions that sit next to the inventory operations: registering
//! lots, listing zones, and setting a spot's manual state.

use tracing::info;

use crate::{
  Error, Result,
  lot::{Lot, LotId},
  spot::SpotState,
  store::{LotStore, SpotStore, ZoneStore, require_lot},
  zone::Zone,
};

pub async fn register_lot<S>(store: &S, name: String) -> Result<Lot>
where
  S: LotStore,
{
  let name = name.trim().to_owned();
  if name.is_empty() {
    return Err(Error::BlankLotName);
  }
  let lot = store.register_lot(name).await.map_err(Error::storage)?;
  info!(lot_id = %lot.lot_id, name = %lot.name, "lot registered");
  Ok(lot)
}

/// Zones of the lot, ordered by name.
pub async fn list_zones<S>(store: &S, lot_id: LotId) -> Result<Vec<Zone>>
where
  S: LotStore + ZoneStore,
{
  require_lot(store, lot_id).await?;
  let mut zones = store.list_zones(lot_id).await.map_err(Error::storage)?;
  zones.sort_by(|a, b| a.name.cmp(&b.name));
  Ok(zones)
}

/// Mark a spot `Free`, `Reserved` or `Maintenance`.
///
/// `Occupied` and `Subscribed` are derived at projection time and are
/// rejected.
pub async fn set_spot_state<S>(
  store: &S,
  lot_id: LotId,
  number: u32,
  state: SpotState,
) -> Result<()>
where
  S: LotStore + SpotStore,
{
  if !state.is_operator_settable() {
    return Err(Error::InvalidStateChange(state));
  }
  require_lot(store, lot_id).await?;

  let found = store
    .set_spot_state(lot_id, number, state)
    .await
    .map_err(Error::storage)?;
  if !found {
    return Err(Error::SpotNotFound { lot_id, number });
  }
  info!(lot_id = %lot_id, number, state = %state, "spot state set");
  Ok(())
}
