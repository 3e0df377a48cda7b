//! Status projection, the per-spot read model shown to operators.
//!
//! A spot's displayed state is derived, never stored:
//!
//! 1. an open occupation on the spot → `Occupied`, whatever the stored state;
//! 2. otherwise an in-force subscription on the spot → `Subscribed`;
//! 3. otherwise the stored state.
//!
//! The output has two shapes. If no spot belongs to a zone the lot is shown
//! flat ([`LotStatus::Simple`]); as soon as one does, spots are grouped per
//! zone ([`LotStatus::Zoned`]).

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
  Error, Result,
  lot::LotId,
  occupation::Occupation,
  spot::{Segment, Spot, SpotState},
  store::{LotStore, OccupationStore, SpotStore, SubscriptionStore, require_lot},
  subscription::{Subscription, SubscriptionQuery},
  sweep::sweep_expired,
};

// ─── Output types ────────────────────────────────────────────────────────────

/// Counts of spots by displayed state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotStats {
  pub total:       u32,
  pub free:        u32,
  pub occupied:    u32,
  pub subscribed:  u32,
  pub reserved:    u32,
  pub maintenance: u32,
}

impl SpotStats {
  fn record(&mut self, state: SpotState) {
    self.total += 1;
    match state {
      SpotState::Free => self.free += 1,
      SpotState::Occupied => self.occupied += 1,
      SpotState::Subscribed => self.subscribed += 1,
      SpotState::Reserved => self.reserved += 1,
      SpotState::Maintenance => self.maintenance += 1,
    }
  }
}

/// Totals for a group of spots, plus the same breakdown per segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
  #[serde(flatten)]
  pub totals:      SpotStats,
  pub per_segment: BTreeMap<Segment, SpotStats>,
}

impl GroupStats {
  fn record(&mut self, segment: Segment, state: SpotState) {
    self.totals.record(state);
    self.per_segment.entry(segment).or_default().record(state);
  }

  fn of<'a>(spots: impl IntoIterator<Item = &'a SpotStatus>) -> Self {
    let mut stats = Self::default();
    for spot in spots {
      stats.record(spot.segment, spot.state);
    }
    stats
  }
}

/// The subscription shown on a spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionHold {
  pub subscription_number: i64,
  pub holder:              String,
  pub validity_end:        DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotStatus {
  pub number:       u32,
  pub segment:      Segment,
  pub zone:         Option<String>,
  /// The state as displayed.
  pub state:        SpotState,
  /// The state as stored on the spot row.
  pub stored_state: SpotState,
  /// Plate of the vehicle parked here, if any.
  pub plate:        Option<String>,
  pub subscription: Option<SubscriptionHold>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStatus {
  /// `None` groups the spots that belong to no zone.
  pub name:  Option<String>,
  pub stats: GroupStats,
  pub spots: Vec<SpotStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LotStatus {
  Simple {
    lot_id: LotId,
    as_of:  DateTime<Utc>,
    stats:  GroupStats,
    spots:  Vec<SpotStatus>,
  },
  Zoned {
    lot_id: LotId,
    as_of:  DateTime<Utc>,
    stats:  GroupStats,
    zones:  Vec<ZoneStatus>,
  },
}

impl LotStatus {
  pub fn stats(&self) -> &GroupStats {
    match self {
      Self::Simple { stats, .. } | Self::Zoned { stats, .. } => stats,
    }
  }

  /// Every spot, whichever shape the status has.
  pub fn spots(&self) -> Vec<&SpotStatus> {
    match self {
      Self::Simple { spots, .. } => spots.iter().collect(),
      Self::Zoned { zones, .. } => {
        zones.iter().flat_map(|z| z.spots.iter()).collect()
      }
    }
  }
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

/// Pick one in-force subscription per spot.
///
/// Under clean data there is at most one; otherwise the latest
/// `validity_end` wins, then the highest `subscription_number`.
pub fn resolve_subscriptions(
  subscriptions: &[Subscription],
  now: DateTime<Utc>,
) -> HashMap<u32, &Subscription> {
  let mut by_spot: HashMap<u32, &Subscription> = HashMap::new();
  for sub in subscriptions.iter().filter(|s| s.is_in_force(now)) {
    let Some(number) = sub.spot_number else { continue };
    by_spot
      .entry(number)
      .and_modify(|held| {
        if (sub.validity_end, sub.subscription_number)
          > (held.validity_end, held.subscription_number)
        {
          *held = sub;
        }
      })
      .or_insert(sub);
  }
  by_spot
}

/// Latest open occupation per spot.
fn resolve_occupations(occupations: &[Occupation]) -> HashMap<u32, &Occupation> {
  let mut by_spot: HashMap<u32, &Occupation> = HashMap::new();
  for occ in occupations.iter().filter(|o| o.is_open()) {
    let Some(number) = occ.spot_number else { continue };
    by_spot
      .entry(number)
      .and_modify(|held| {
        if occ.entry_time > held.entry_time {
          *held = occ;
        }
      })
      .or_insert(occ);
  }
  by_spot
}

/// Build the status view from already-loaded rows. Pure.
pub fn project(
  lot_id: LotId,
  now: DateTime<Utc>,
  mut spots: Vec<Spot>,
  occupations: &[Occupation],
  subscriptions: &[Subscription],
) -> LotStatus {
  spots.sort_by_key(|s| s.number);
  let occupied = resolve_occupations(occupations);
  let subscribed = resolve_subscriptions(subscriptions, now);

  let statuses: Vec<SpotStatus> = spots
    .into_iter()
    .map(|spot| {
      let occupation = occupied.get(&spot.number);
      let subscription = subscribed.get(&spot.number);
      let state = if occupation.is_some() {
        SpotState::Occupied
      } else if subscription.is_some() {
        SpotState::Subscribed
      } else {
        spot.state
      };
      SpotStatus {
        number: spot.number,
        segment: spot.segment,
        zone: spot.zone.filter(|z| !z.is_empty()),
        state,
        stored_state: spot.state,
        plate: occupation.map(|o| o.plate.clone()),
        subscription: subscription.map(|s| SubscriptionHold {
          subscription_number: s.subscription_number,
          holder:              s.holder.clone(),
          validity_end:        s.validity_end,
        }),
      }
    })
    .collect();

  let stats = GroupStats::of(&statuses);

  if statuses.iter().all(|s| s.zone.is_none()) {
    return LotStatus::Simple { lot_id, as_of: now, stats, spots: statuses };
  }

  let mut grouped: BTreeMap<Option<String>, Vec<SpotStatus>> = BTreeMap::new();
  for status in statuses {
    grouped.entry(status.zone.clone()).or_default().push(status);
  }

  // `None` sorts first in the map; list the unzoned group last.
  let unzoned = grouped.remove(&None);
  let zones = grouped
    .into_iter()
    .chain(unzoned.map(|spots| (None, spots)))
    .map(|(name, spots)| ZoneStatus {
      name,
      stats: GroupStats::of(&spots),
      spots,
    })
    .collect();

  LotStatus::Zoned { lot_id, as_of: now, stats, zones }
}

// ─── Operation ───────────────────────────────────────────────────────────────

/// Project the lot's current status.
///
/// An expiry sweep runs first. Its failures are logged and never returned:
/// a slightly stale view is preferred over a failed read.
pub async fn project_status<S>(
  store: &S,
  lot_id: LotId,
  now: DateTime<Utc>,
) -> Result<LotStatus>
where
  S: LotStore + SpotStore + OccupationStore + SubscriptionStore,
{
  require_lot(store, lot_id).await?;

  match sweep_expired(store, lot_id, now).await {
    Ok(report) if !report.failures.is_empty() => {
      warn!(
        lot_id = %lot_id,
        failed = report.failures.len(),
        "expiry sweep left subscriptions active"
      );
    }
    Ok(_) => {}
    Err(e) => {
      warn!(lot_id = %lot_id, error = %e, "expiry sweep failed");
    }
  }

  let spots = store.spots(lot_id).await.map_err(Error::storage)?;
  let occupations = store
    .open_occupations(lot_id)
    .await
    .map_err(Error::storage)?;
  let subscriptions = store
    .subscriptions(lot_id, SubscriptionQuery::in_force_with_spot(now))
    .await
    .map_err(Error::storage)?;

  Ok(project(lot_id, now, spots, &occupations, &subscriptions))
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use uuid::Uuid;

  use super::*;
  use crate::subscription::SubscriptionState;

  fn spot(number: u32, segment: Segment, zone: Option<&str>) -> Spot {
    Spot {
      lot_id: LotId(1),
      number,
      segment,
      state: SpotState::Free,
      zone: zone.map(str::to_owned),
    }
  }

  fn open_on(number: u32, plate: &str, now: DateTime<Utc>) -> Occupation {
    Occupation {
      occupation_id: Uuid::new_v4(),
      lot_id:        LotId(1),
      plate:         plate.into(),
      spot_number:   Some(number),
      entry_time:    now - Duration::hours(1),
      exit_time:     None,
    }
  }

  fn sub_on(
    number: u32,
    subscription_number: i64,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Subscription {
    Subscription {
      lot_id: LotId(1),
      subscription_number,
      holder: format!("holder-{subscription_number}"),
      spot_number: Some(number),
      validity_start: now - Duration::days(30),
      validity_end: end,
      state: SubscriptionState::Active,
      allowed_vehicles: vec![],
    }
  }

  #[test]
  fn occupation_beats_subscription_beats_stored_state() {
    let now = Utc::now();
    let mut maintenance = spot(3, Segment::Car, None);
    maintenance.state = SpotState::Maintenance;
    let spots = vec![
      spot(1, Segment::Car, None),
      spot(2, Segment::Car, None),
      maintenance,
    ];
    let occupations = vec![open_on(1, "AA111AA", now)];
    let subs = vec![
      sub_on(1, 10, now + Duration::days(1), now),
      sub_on(2, 11, now + Duration::days(1), now),
    ];

    let status = project(LotId(1), now, spots, &occupations, &subs);
    let spots = status.spots();
    assert_eq!(spots[0].state, SpotState::Occupied);
    assert_eq!(spots[0].plate.as_deref(), Some("AA111AA"));
    assert_eq!(spots[1].state, SpotState::Subscribed);
    assert_eq!(spots[2].state, SpotState::Maintenance);

    let stats = status.stats();
    assert_eq!(stats.totals.total, 3);
    assert_eq!(stats.totals.occupied, 1);
    assert_eq!(stats.totals.subscribed, 1);
    assert_eq!(stats.totals.maintenance, 1);
    assert_eq!(stats.totals.free, 0);
  }

  #[test]
  fn latest_validity_end_wins_the_tie_break() {
    let now = Utc::now();
    let early = sub_on(5, 20, now + Duration::days(1), now);
    let late = sub_on(5, 19, now + Duration::days(2), now);
    for subs in [vec![early.clone(), late.clone()], vec![late.clone(), early.clone()]] {
      let resolved = resolve_subscriptions(&subs, now);
      assert_eq!(resolved[&5].subscription_number, 19);
    }
  }

  #[test]
  fn equal_ends_fall_back_to_highest_number() {
    let now = Utc::now();
    let end = now + Duration::days(1);
    let subs = vec![sub_on(5, 40, end, now), sub_on(5, 41, end, now)];
    assert_eq!(resolve_subscriptions(&subs, now)[&5].subscription_number, 41);
  }

  #[test]
  fn no_zones_gives_simple_mode() {
    let now = Utc::now();
    let spots = vec![spot(1, Segment::Car, None), spot(2, Segment::Motorcycle, Some(""))];
    let status = project(LotId(1), now, spots, &[], &[]);
    match status {
      LotStatus::Simple { spots, stats, .. } => {
        assert_eq!(spots.len(), 2);
        assert_eq!(stats.per_segment[&Segment::Motorcycle].free, 1);
      }
      other => panic!("expected simple mode, got {other:?}"),
    }
  }

  #[test]
  fn any_zone_switches_to_zoned_mode_with_unzoned_last() {
    let now = Utc::now();
    let spots = vec![
      spot(1, Segment::Car, None),
      spot(2, Segment::Car, Some("Sur")),
      spot(3, Segment::Car, Some("Norte")),
      spot(4, Segment::LightTruck, Some("Norte")),
    ];
    let occupations = vec![open_on(4, "TRK001", now)];
    let status = project(LotId(1), now, spots, &occupations, &[]);
    let LotStatus::Zoned { zones, stats, .. } = status else {
      panic!("expected zoned mode");
    };
    let names: Vec<Option<&str>> = zones.iter().map(|z| z.name.as_deref()).collect();
    assert_eq!(names, vec![Some("Norte"), Some("Sur"), None]);
    assert_eq!(zones[0].stats.totals.total, 2);
    assert_eq!(zones[0].stats.per_segment[&Segment::LightTruck].occupied, 1);
    assert_eq!(stats.totals.total, 4);
  }

  #[test]
  fn status_serializes_with_mode_tag() {
    let now = Utc::now();
    let status = project(LotId(1), now, vec![spot(1, Segment::Car, None)], &[], &[]);
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["mode"], "simple");
    assert_eq!(json["stats"]["total"], 1);
    assert_eq!(json["stats"]["per_segment"]["car"]["free"], 1);
  }
}
