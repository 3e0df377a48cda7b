//! Store traits the inventory operations are written against.
//!
//! Each record family has its own trait so that every operation names exactly
//! the stores it touches. All traits share [`StoreBackend`], which carries the
//! backend error type; a bound such as `S: SpotStore + OccupationStore` sees a
//! single `S::Error`.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  Error,
  lot::{Lot, LotId},
  occupation::Occupation,
  reconcile::{CapacityPlan, apply_stepwise},
  spot::{NewSpot, Spot, SpotState},
  subscription::{Subscription, SubscriptionQuery, SubscriptionState},
  zone::Zone,
};

// ─── Backend ─────────────────────────────────────────────────────────────────

pub trait StoreBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Lots ────────────────────────────────────────────────────────────────────

pub trait LotStore: StoreBackend {
  /// Create and persist a new lot. The id is assigned by the store.
  fn register_lot(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Lot, Self::Error>> + Send + '_;

  fn get_lot(
    &self,
    lot_id: LotId,
  ) -> impl Future<Output = Result<Option<Lot>, Self::Error>> + Send + '_;

  fn list_lots(
    &self,
  ) -> impl Future<Output = Result<Vec<Lot>, Self::Error>> + Send + '_;
}

// ─── Spots ───────────────────────────────────────────────────────────────────

pub trait SpotStore: StoreBackend {
  /// Every spot in the lot, ascending by number.
  fn spots(
    &self,
    lot_id: LotId,
  ) -> impl Future<Output = Result<Vec<Spot>, Self::Error>> + Send + '_;

  /// Insert all of `spots` or none of them, raising the lot's
  /// [`Lot::highest_number`] to cover the new numbers in the same write.
  fn insert_spots(
    &self,
    lot_id: LotId,
    spots: Vec<NewSpot>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete the given spot rows; returns how many existed.
  fn delete_spots(
    &self,
    lot_id: LotId,
    numbers: Vec<u32>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Overwrite a spot's stored state. Returns `false` if the spot does not
  /// exist.
  fn set_spot_state(
    &self,
    lot_id: LotId,
    number: u32,
    state: SpotState,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Occupations ─────────────────────────────────────────────────────────────

pub trait OccupationStore: StoreBackend {
  /// Occupations in the lot with no exit recorded.
  fn open_occupations(
    &self,
    lot_id: LotId,
  ) -> impl Future<Output = Result<Vec<Occupation>, Self::Error>> + Send + '_;

  /// Whether an open occupation references spot `number`.
  fn has_open_occupation(
    &self,
    lot_id: LotId,
    number: u32,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Null the spot reference of closed occupations pointing at `numbers`.
  /// Open occupations are never touched. Returns the number of rows changed.
  fn detach_spot_references(
    &self,
    lot_id: LotId,
    numbers: Vec<u32>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

pub trait SubscriptionStore: StoreBackend {
  fn subscriptions(
    &self,
    lot_id: LotId,
    query: SubscriptionQuery,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + '_;

  /// Move a subscription from `from` to `to` only if it is still in `from`.
  /// Returns `false` if the row was missing or already moved.
  fn transition_subscription(
    &self,
    lot_id: LotId,
    subscription_number: i64,
    from: SubscriptionState,
    to: SubscriptionState,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Zones ───────────────────────────────────────────────────────────────────

pub trait ZoneStore: StoreBackend {
  /// Exact, case-sensitive lookup.
  fn zone_by_name(
    &self,
    lot_id: LotId,
    name: String,
  ) -> impl Future<Output = Result<Option<Zone>, Self::Error>> + Send + '_;

  /// Insert `zone` unless its lot already has a zone of that name. Returns
  /// `false`, writing nothing, on a name clash.
  fn insert_zone(
    &self,
    zone: Zone,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if the zone did not exist.
  fn delete_zone(
    &self,
    zone_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn list_zones(
    &self,
    lot_id: LotId,
  ) -> impl Future<Output = Result<Vec<Zone>, Self::Error>> + Send + '_;
}

// ─── Capacity writes ─────────────────────────────────────────────────────────

/// Applies a validated [`CapacityPlan`].
///
/// The default writes segment by segment through the row-level methods,
/// growth before shrinkage, and reports which segments committed if it fails
/// part-way. Backends with transactions should override it to apply the whole
/// plan atomically.
pub trait CapacityWriter: SpotStore + OccupationStore {
  fn apply_capacity_plan(
    &self,
    plan: CapacityPlan,
  ) -> impl Future<Output = Result<(), Error>> + Send + '_ {
    async move { apply_stepwise(self, &plan).await }
  }
}

/// Everything the HTTP layer needs from a backend.
pub trait ParkingStore:
  LotStore + SpotStore + OccupationStore + SubscriptionStore + ZoneStore + CapacityWriter
{
}

impl<T> ParkingStore for T where
  T: LotStore
    + SpotStore
    + OccupationStore
    + SubscriptionStore
    + ZoneStore
    + CapacityWriter
{
}

/// Load the lot or fail with [`Error::InvalidLot`].
pub async fn require_lot<S>(store: &S, lot_id: LotId) -> Result<Lot, Error>
where
  S: LotStore + ?Sized,
{
  store
    .get_lot(lot_id)
    .await
    .map_err(Error::storage)?
    .ok_or(Error::InvalidLot(lot_id))
}
