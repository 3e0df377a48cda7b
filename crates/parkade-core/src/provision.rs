//! Zone provisioning: create a named zone together with its spots.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  lot::LotId,
  spot::{NewSpot, Segment, SpotState, first_fit, block_from, next_after_max},
  store::{LotStore, SpotStore, ZoneStore, require_lot},
  zone::{NumberingMode, Zone, ZoneSizing},
};

/// Input to [`create_zone`].
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneRequest {
  pub name:      String,
  pub sizing:    ZoneSizing,
  #[serde(default)]
  pub numbering: NumberingMode,
}

/// A zone and the spots created with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionedZone {
  pub zone:         Zone,
  /// Every number created, ascending.
  pub spot_numbers: Vec<u32>,
  /// Lowest and highest number created.
  pub range:        (u32, u32),
}

/// Create zone `request.name` in `lot_id` and allocate its spots.
///
/// All spots are `Car` and `Free`. If the spot insert fails the zone row is
/// deleted again and the storage error is returned.
pub async fn create_zone<S>(
  store: &S,
  lot_id: LotId,
  request: ZoneRequest,
) -> Result<ProvisionedZone>
where
  S: LotStore + SpotStore + ZoneStore,
{
  let ZoneRequest { name, sizing, numbering } = request;
  if name.trim().is_empty() {
    return Err(Error::BlankZoneName);
  }
  let count = sizing.spot_count()?;

  let lot = require_lot(store, lot_id).await?;

  let existing = store
    .zone_by_name(lot_id, name.clone())
    .await
    .map_err(Error::storage)?;
  if existing.is_some() {
    return Err(Error::DuplicateZoneName { lot_id, name });
  }

  let in_use: BTreeSet<u32> = store
    .spots(lot_id)
    .await
    .map_err(Error::storage)?
    .into_iter()
    .map(|s| s.number)
    .collect();
  let spot_numbers = allocate(&in_use, lot.highest_number, count as usize, numbering)
    .ok_or(Error::SpotNumbersExhausted { lot_id })?;

  let zone = Zone {
    zone_id:    Uuid::new_v4(),
    lot_id,
    name:       name.clone(),
    capacity:   count,
    created_at: Utc::now(),
  };
  // A concurrent request may have taken the name since the lookup above.
  let inserted = store
    .insert_zone(zone.clone())
    .await
    .map_err(Error::storage)?;
  if !inserted {
    return Err(Error::DuplicateZoneName { lot_id, name });
  }

  let rows = spot_numbers
    .iter()
    .map(|&number| NewSpot {
      number,
      segment: Segment::Car,
      state: SpotState::Free,
      zone: Some(name.clone()),
    })
    .collect();

  if let Err(e) = store.insert_spots(lot_id, rows).await {
    if let Err(rollback) = store.delete_zone(zone.zone_id).await {
      error!(
        lot_id = %lot_id,
        zone_id = %zone.zone_id,
        error = %rollback,
        "failed to remove zone after spot insert failure"
      );
    }
    return Err(Error::storage(e));
  }

  // `count` is positive, so there is at least one number.
  let range = (spot_numbers[0], spot_numbers[spot_numbers.len() - 1]);
  info!(
    lot_id = %lot_id,
    zone = %zone.name,
    spots = count,
    first = range.0,
    last = range.1,
    "zone created"
  );

  Ok(ProvisionedZone { zone, spot_numbers, range })
}

/// Numbers for a new zone, or `None` if the lot has run out.
///
/// First-fit fills gaps, including numbers retired by a shrink. After-max
/// starts above the high-water mark like capacity growth does.
fn allocate(
  in_use: &BTreeSet<u32>,
  highest_number: u32,
  count: usize,
  mode: NumberingMode,
) -> Option<Vec<u32>> {
  match mode {
    NumberingMode::FirstFit => first_fit(in_use, count),
    NumberingMode::AfterMax => {
      block_from(next_after_max(in_use.iter().copied(), highest_number)?, count)
    }
  }
}
