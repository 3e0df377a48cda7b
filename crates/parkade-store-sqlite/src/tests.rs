//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use parkade_core::{
  Error as CoreError, LotId,
  projection::{LotStatus, project_status},
  provision::{ZoneRequest, create_zone},
  reconcile::{CapacityTargets, plan_capacity, sync_capacity},
  spot::{NewSpot, Segment, SpotState},
  store::{
    CapacityWriter, LotStore, OccupationStore, SpotStore, SubscriptionStore,
    ZoneStore,
  },
  subscription::{Subscription, SubscriptionQuery, SubscriptionState},
  sweep::sweep_expired,
  zone::{NumberingMode, Zone, ZoneSizing},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn store_with_lot() -> (SqliteStore, LotId) {
  let s = store().await;
  let lot = s.register_lot("Centro".into()).await.unwrap();
  (s, lot.lot_id)
}

async fn seed(s: &SqliteStore, lot: LotId, segment: Segment, numbers: impl IntoIterator<Item = u32>) {
  let rows = numbers
    .into_iter()
    .map(|n| NewSpot::free(n, segment))
    .collect();
  s.insert_spots(lot, rows).await.unwrap();
}

fn targets(pairs: &[(Segment, i64)]) -> CapacityTargets {
  pairs.iter().copied().collect()
}

fn subscription(lot_id: LotId, number: i64, spot: Option<u32>, end_in: Duration) -> Subscription {
  let now = Utc::now();
  Subscription {
    lot_id,
    subscription_number: number,
    holder: "Marta".into(),
    spot_number: spot,
    validity_start: now - Duration::days(30),
    validity_end: now + end_in,
    state: SubscriptionState::Active,
    allowed_vehicles: vec!["AB123CD".into(), "XY987ZW".into()],
  }
}

// ─── Lots ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_get_lot() {
  let s = store().await;
  let lot = s.register_lot("Centro".into()).await.unwrap();

  let fetched = s.get_lot(lot.lot_id).await.unwrap().unwrap();
  assert_eq!(fetched.name, "Centro");
  assert_eq!(fetched.created_at, lot.created_at);

  assert!(s.get_lot(LotId(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn lot_ids_are_distinct() {
  let s = store().await;
  let a = s.register_lot("A".into()).await.unwrap();
  let b = s.register_lot("B".into()).await.unwrap();
  assert_ne!(a.lot_id, b.lot_id);
  assert_eq!(s.list_lots().await.unwrap().len(), 2);
}

async fn highest_number(s: &SqliteStore, lot: LotId) -> u32 {
  s.get_lot(lot).await.unwrap().unwrap().highest_number
}

// ─── Spots ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn high_water_mark_only_moves_up() {
  let (s, lot) = store_with_lot().await;
  assert_eq!(highest_number(&s, lot).await, 0);

  seed(&s, lot, Segment::Motorcycle, [9, 2]).await;
  assert_eq!(highest_number(&s, lot).await, 9);

  assert_eq!(s.delete_spots(lot, vec![9]).await.unwrap(), 1);
  seed(&s, lot, Segment::Car, [4]).await;
  assert_eq!(highest_number(&s, lot).await, 9);
}

#[tokio::test]
async fn spots_come_back_ascending() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Motorcycle, [9, 2]).await;
  seed(&s, lot, Segment::Car, [5, 1]).await;

  let numbers: Vec<u32> = s.spots(lot).await.unwrap().iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![1, 2, 5, 9]);
}

#[tokio::test]
async fn duplicate_number_inserts_nothing() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [3]).await;

  let err = s
    .insert_spots(lot, vec![NewSpot::free(4, Segment::Car), NewSpot::free(3, Segment::Car)])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Database(_)));

  let numbers: Vec<u32> = s.spots(lot).await.unwrap().iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![3]);
  assert_eq!(highest_number(&s, lot).await, 3);
}

#[tokio::test]
async fn set_spot_state_reports_missing_spots() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [1]).await;

  assert!(s.set_spot_state(lot, 1, SpotState::Reserved).await.unwrap());
  assert!(!s.set_spot_state(lot, 2, SpotState::Reserved).await.unwrap());
  assert_eq!(s.spots(lot).await.unwrap()[0].state, SpotState::Reserved);
}

// ─── Occupations ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn exit_closes_the_occupation() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [1]).await;

  let occ = s
    .record_entry(lot, "AB123CD".into(), Some(1), Utc::now())
    .await
    .unwrap();
  assert!(s.has_open_occupation(lot, 1).await.unwrap());
  assert_eq!(s.open_occupations(lot).await.unwrap().len(), 1);

  assert!(s.record_exit(occ.occupation_id, Utc::now()).await.unwrap());
  assert!(!s.record_exit(occ.occupation_id, Utc::now()).await.unwrap());
  assert!(!s.has_open_occupation(lot, 1).await.unwrap());
  assert!(s.open_occupations(lot).await.unwrap().is_empty());
}

#[tokio::test]
async fn detach_leaves_open_occupations_alone() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [1, 2]).await;

  let closed = s
    .record_entry(lot, "OLD001".into(), Some(1), Utc::now() - Duration::hours(3))
    .await
    .unwrap();
  s.record_exit(closed.occupation_id, Utc::now()).await.unwrap();
  s.record_entry(lot, "NEW001".into(), Some(2), Utc::now())
    .await
    .unwrap();

  let changed = s.detach_spot_references(lot, vec![1, 2]).await.unwrap();
  assert_eq!(changed, 1);
  assert!(s.has_open_occupation(lot, 2).await.unwrap());
}

#[tokio::test]
async fn occupied_spot_row_cannot_be_deleted() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [1]).await;
  s.record_entry(lot, "AB123CD".into(), Some(1), Utc::now())
    .await
    .unwrap();

  assert!(s.delete_spots(lot, vec![1]).await.is_err());
  assert_eq!(s.spots(lot).await.unwrap().len(), 1);
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

#[tokio::test]
async fn subscription_queries_filter_on_window_and_state() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [1, 2]).await;
  s.insert_subscription(subscription(lot, 1, Some(1), -Duration::days(1)))
    .await
    .unwrap();
  s.insert_subscription(subscription(lot, 2, Some(2), Duration::days(1)))
    .await
    .unwrap();
  s.insert_subscription(subscription(lot, 3, None, Duration::days(1)))
    .await
    .unwrap();

  let now = Utc::now();
  let overdue = s
    .subscriptions(lot, SubscriptionQuery::overdue(now))
    .await
    .unwrap();
  assert_eq!(
    overdue.iter().map(|s| s.subscription_number).collect::<Vec<_>>(),
    vec![1]
  );

  let in_force = s
    .subscriptions(lot, SubscriptionQuery::in_force_with_spot(now))
    .await
    .unwrap();
  assert_eq!(in_force.len(), 1);
  assert_eq!(in_force[0].subscription_number, 2);
  assert_eq!(in_force[0].allowed_vehicles, vec!["AB123CD", "XY987ZW"]);

  let all = s
    .subscriptions(lot, SubscriptionQuery::default())
    .await
    .unwrap();
  assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn transition_only_moves_rows_in_the_expected_state() {
  let (s, lot) = store_with_lot().await;
  s.insert_subscription(subscription(lot, 1, None, -Duration::days(1)))
    .await
    .unwrap();

  let moved = s
    .transition_subscription(lot, 1, SubscriptionState::Active, SubscriptionState::Expired)
    .await
    .unwrap();
  assert!(moved);

  let again = s
    .transition_subscription(lot, 1, SubscriptionState::Active, SubscriptionState::Expired)
    .await
    .unwrap();
  assert!(!again);
}

// ─── Zones ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zone_lookup_is_case_sensitive() {
  let (s, lot) = store_with_lot().await;
  let request = ZoneRequest {
    name:      "Norte".into(),
    sizing:    ZoneSizing::Count { count: 3 },
    numbering: NumberingMode::FirstFit,
  };
  let created = create_zone(&s, lot, request).await.unwrap();

  let found = s.zone_by_name(lot, "Norte".into()).await.unwrap().unwrap();
  assert_eq!(found.zone_id, created.zone.zone_id);
  assert_eq!(found.capacity, 3);
  assert!(s.zone_by_name(lot, "norte".into()).await.unwrap().is_none());

  assert!(s.delete_zone(found.zone_id).await.unwrap());
  assert!(s.list_zones(lot).await.unwrap().is_empty());
}

#[tokio::test]
async fn zone_insert_with_a_taken_name_writes_nothing() {
  let (s, lot) = store_with_lot().await;
  let zone = |name: &str| Zone {
    zone_id:    uuid::Uuid::new_v4(),
    lot_id:     lot,
    name:       name.into(),
    capacity:   4,
    created_at: Utc::now(),
  };

  assert!(s.insert_zone(zone("Norte")).await.unwrap());
  assert!(!s.insert_zone(zone("Norte")).await.unwrap());
  assert!(s.insert_zone(zone("norte")).await.unwrap());
  assert_eq!(s.list_zones(lot).await.unwrap().len(), 2);
}

// ─── Capacity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_grows_and_shrinks_in_one_transaction() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, 1..=5).await;
  s.record_entry(lot, "AB123CD".into(), Some(3), Utc::now())
    .await
    .unwrap();

  let report = sync_capacity(
    &s,
    lot,
    &targets(&[(Segment::Car, 3), (Segment::LightTruck, 2)]),
  )
  .await
  .unwrap();
  assert_eq!(report.removed[&Segment::Car], vec![5, 4]);
  assert_eq!(report.created[&Segment::LightTruck], vec![6, 7]);

  let spots = s.spots(lot).await.unwrap();
  let numbers: Vec<u32> = spots.iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![1, 2, 3, 6, 7]);

  let err = sync_capacity(&s, lot, &targets(&[(Segment::Car, 2)]))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    CoreError::CapacityBlockedByOccupancy { ref blocking_numbers, .. } if blocking_numbers == &[3]
  ));
}

#[tokio::test]
async fn vehicle_arriving_after_planning_rolls_back_every_segment() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, 1..=3).await;

  // Plan as if nothing were parked, then park on a number the plan deletes.
  let spots = s.spots(lot).await.unwrap();
  let plan = plan_capacity(
    lot,
    highest_number(&s, lot).await,
    &spots,
    &HashSet::new(),
    &targets(&[(Segment::Motorcycle, 2), (Segment::Car, 2)]),
  )
  .unwrap();
  s.record_entry(lot, "LATE001".into(), Some(3), Utc::now())
    .await
    .unwrap();

  let err = s.apply_capacity_plan(plan).await.unwrap_err();
  assert!(matches!(
    err,
    CoreError::CapacityBlockedByOccupancy { segment: Segment::Car, .. }
  ));

  let numbers: Vec<u32> = s.spots(lot).await.unwrap().iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn shrink_then_grow_skips_retired_numbers() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, 1..=5).await;

  sync_capacity(&s, lot, &targets(&[(Segment::Car, 3)]))
    .await
    .unwrap();
  let report = sync_capacity(&s, lot, &targets(&[(Segment::Car, 5)]))
    .await
    .unwrap();
  assert_eq!(report.created[&Segment::Car], vec![6, 7]);

  let numbers: Vec<u32> = s.spots(lot).await.unwrap().iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![1, 2, 3, 6, 7]);
  assert_eq!(highest_number(&s, lot).await, 7);
}

#[tokio::test]
async fn plan_overtaken_by_another_growth_is_refused() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, 1..=2).await;

  let spots = s.spots(lot).await.unwrap();
  let plan = plan_capacity(
    lot,
    highest_number(&s, lot).await,
    &spots,
    &HashSet::new(),
    &targets(&[(Segment::Motorcycle, 2)]),
  )
  .unwrap();

  // Another sync grows and shrinks back, retiring 3 and 4.
  sync_capacity(&s, lot, &targets(&[(Segment::LightTruck, 2)]))
    .await
    .unwrap();
  sync_capacity(&s, lot, &targets(&[(Segment::LightTruck, 0)]))
    .await
    .unwrap();

  let err = s.apply_capacity_plan(plan).await.unwrap_err();
  assert!(matches!(err, CoreError::StaleCapacityPlan { lot_id } if lot_id == lot));

  let numbers: Vec<u32> = s.spots(lot).await.unwrap().iter().map(|s| s.number).collect();
  assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn shrink_detaches_closed_history_before_deleting() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, 1..=2).await;
  let gone = s
    .record_entry(lot, "OLD001".into(), Some(2), Utc::now() - Duration::hours(1))
    .await
    .unwrap();
  s.record_exit(gone.occupation_id, Utc::now()).await.unwrap();

  sync_capacity(&s, lot, &targets(&[(Segment::Car, 1)]))
    .await
    .unwrap();
  assert_eq!(s.spots(lot).await.unwrap().len(), 1);
}

// ─── Sweep and projection ────────────────────────────────────────────────────

#[tokio::test]
async fn sweep_then_project_end_to_end() {
  let (s, lot) = store_with_lot().await;
  seed(&s, lot, Segment::Car, [11, 12, 13]).await;
  s.set_spot_state(lot, 12, SpotState::Subscribed).await.unwrap();
  s.insert_subscription(subscription(lot, 7, Some(12), -Duration::days(1)))
    .await
    .unwrap();
  s.insert_subscription(subscription(lot, 8, Some(13), Duration::days(10)))
    .await
    .unwrap();
  s.record_entry(lot, "AB123CD".into(), Some(11), Utc::now())
    .await
    .unwrap();

  let status = project_status(&s, lot, Utc::now()).await.unwrap();
  assert!(matches!(status, LotStatus::Simple { .. }));
  let states: Vec<SpotState> = status.spots().iter().map(|s| s.state).collect();
  assert_eq!(
    states,
    vec![SpotState::Occupied, SpotState::Free, SpotState::Subscribed]
  );

  let expired = s
    .subscriptions(lot, SubscriptionQuery {
      state: Some(SubscriptionState::Expired),
      ..SubscriptionQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(expired.len(), 1);

  let second = sweep_expired(&s, lot, Utc::now()).await.unwrap();
  assert_eq!(second.processed, 0);
}
