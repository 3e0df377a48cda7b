//! [`SqliteStore`], the SQLite implementation of the Parkade store traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use parkade_core::{
  LotId,
  lot::Lot,
  occupation::Occupation,
  reconcile::{CapacityPlan, SpotChange},
  spot::{NewSpot, Spot, SpotState},
  store::{
    CapacityWriter, LotStore, OccupationStore, SpotStore, StoreBackend,
    SubscriptionStore, ZoneStore,
  },
  subscription::{Subscription, SubscriptionQuery, SubscriptionState},
  zone::Zone,
};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    RawLot, RawOccupation, RawSpot, RawSubscription, RawZone, decode_dt,
    encode_dt, encode_plates, encode_uuid,
  },
  error::Error,
  schema,
};

const SPOT_COLUMNS: &str = "lot_id, number, segment, state, zone";
const OCCUPATION_COLUMNS: &str =
  "occupation_id, lot_id, plate, spot_number, entry_time, exit_time";
const SUBSCRIPTION_COLUMNS: &str = "lot_id, subscription_number, holder, \
                                    spot_number, validity_start, validity_end, \
                                    state, allowed_vehicles";
const ZONE_COLUMNS: &str = "zone_id, lot_id, name, capacity, created_at";
const LOT_COLUMNS: &str = "lot_id, name, created_at, highest_number";

fn lot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLot> {
  Ok(RawLot {
    lot_id:         row.get(0)?,
    name:           row.get(1)?,
    created_at:     row.get(2)?,
    highest_number: row.get(3)?,
  })
}

fn spot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSpot> {
  Ok(RawSpot {
    lot_id:  row.get(0)?,
    number:  row.get(1)?,
    segment: row.get(2)?,
    state:   row.get(3)?,
    zone:    row.get(4)?,
  })
}

fn occupation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawOccupation> {
  Ok(RawOccupation {
    occupation_id: row.get(0)?,
    lot_id:        row.get(1)?,
    plate:         row.get(2)?,
    spot_number:   row.get(3)?,
    entry_time:    row.get(4)?,
    exit_time:     row.get(5)?,
  })
}

fn subscription_row(
  row: &rusqlite::Row<'_>,
) -> rusqlite::Result<RawSubscription> {
  Ok(RawSubscription {
    lot_id:              row.get(0)?,
    subscription_number: row.get(1)?,
    holder:              row.get(2)?,
    spot_number:         row.get(3)?,
    validity_start:      row.get(4)?,
    validity_end:        row.get(5)?,
    state:               row.get(6)?,
    allowed_vehicles:    row.get(7)?,
  })
}

fn zone_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawZone> {
  Ok(RawZone {
    zone_id:    row.get(0)?,
    lot_id:     row.get(1)?,
    name:       row.get(2)?,
    capacity:   row.get(3)?,
    created_at: row.get(4)?,
  })
}

// ─── Row-level statements shared by the trait methods and transactions ───────

/// Insert `spots` and raise the lot's high-water mark over them. Callers run
/// this inside a transaction.
fn insert_spot_rows(
  conn: &rusqlite::Connection,
  lot_id: i64,
  spots: &[NewSpot],
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "INSERT INTO spots (lot_id, number, segment, state, zone)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for spot in spots {
    stmt.execute(rusqlite::params![
      lot_id,
      spot.number,
      spot.segment.as_str(),
      spot.state.as_str(),
      spot.zone,
    ])?;
  }
  if let Some(top) = spots.iter().map(|s| s.number).max() {
    conn.execute(
      "UPDATE lots SET highest_number = MAX(highest_number, ?2) WHERE lot_id = ?1",
      rusqlite::params![lot_id, top],
    )?;
  }
  Ok(())
}

fn highest_number(conn: &rusqlite::Connection, lot_id: i64) -> rusqlite::Result<u32> {
  conn.query_row(
    "SELECT highest_number FROM lots WHERE lot_id = ?1",
    rusqlite::params![lot_id],
    |r| r.get(0),
  )
}

/// Numbers among `numbers` that an open occupation points at, ascending.
fn occupied_among(
  conn: &rusqlite::Connection,
  lot_id: i64,
  numbers: &[u32],
) -> rusqlite::Result<Vec<u32>> {
  let mut stmt = conn.prepare_cached(
    "SELECT EXISTS (
       SELECT 1 FROM occupations
       WHERE lot_id = ?1 AND spot_number = ?2 AND exit_time IS NULL
     )",
  )?;
  let mut occupied = Vec::new();
  for &number in numbers {
    let open: bool =
      stmt.query_row(rusqlite::params![lot_id, number], |r| r.get(0))?;
    if open {
      occupied.push(number);
    }
  }
  occupied.sort_unstable();
  Ok(occupied)
}

fn detach_closed(
  conn: &rusqlite::Connection,
  lot_id: i64,
  numbers: &[u32],
) -> rusqlite::Result<u64> {
  let mut stmt = conn.prepare_cached(
    "UPDATE occupations SET spot_number = NULL
     WHERE lot_id = ?1 AND spot_number = ?2 AND exit_time IS NOT NULL",
  )?;
  let mut changed = 0;
  for &number in numbers {
    changed += stmt.execute(rusqlite::params![lot_id, number])? as u64;
  }
  Ok(changed)
}

fn delete_spot_rows(
  conn: &rusqlite::Connection,
  lot_id: i64,
  numbers: &[u32],
) -> rusqlite::Result<u64> {
  let mut stmt = conn
    .prepare_cached("DELETE FROM spots WHERE lot_id = ?1 AND number = ?2")?;
  let mut deleted = 0;
  for &number in numbers {
    deleted += stmt.execute(rusqlite::params![lot_id, number])? as u64;
  }
  Ok(deleted)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parkade inventory store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| Ok(schema::init(conn)?))
      .await?;
    Ok(())
  }

  // ── Upstream records ──────────────────────────────────────────────────────
  //
  // Entry/exit registration and subscription sales own these rows; the
  // inventory operations only read them. These writers exist for those
  // collaborators and for seeding.

  /// Record a vehicle entering, optionally on a spot.
  pub async fn record_entry(
    &self,
    lot_id: LotId,
    plate: String,
    spot_number: Option<u32>,
    entry_time: DateTime<Utc>,
  ) -> Result<Occupation> {
    let occupation = Occupation {
      occupation_id: Uuid::new_v4(),
      lot_id,
      plate,
      spot_number,
      entry_time,
      exit_time: None,
    };

    let id_str = encode_uuid(occupation.occupation_id);
    let plate = occupation.plate.clone();
    let at_str = encode_dt(entry_time);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO occupations (occupation_id, lot_id, plate, spot_number, entry_time)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, lot_id.0, plate, spot_number, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(occupation)
  }

  /// Close an open occupation. Returns `false` if it was missing or already
  /// closed.
  pub async fn record_exit(
    &self,
    occupation_id: Uuid,
    exit_time: DateTime<Utc>,
  ) -> Result<bool> {
    let id_str = encode_uuid(occupation_id);
    let at_str = encode_dt(exit_time);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE occupations SET exit_time = ?2
           WHERE occupation_id = ?1 AND exit_time IS NULL",
          rusqlite::params![id_str, at_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  pub async fn insert_subscription(&self, sub: Subscription) -> Result<()> {
    let start = encode_dt(sub.validity_start);
    let end = encode_dt(sub.validity_end);
    let plates = encode_plates(&sub.allowed_vehicles)?;
    let state = sub.state.as_str();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subscriptions (
             lot_id, subscription_number, holder, spot_number,
             validity_start, validity_end, state, allowed_vehicles
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            sub.lot_id.0,
            sub.subscription_number,
            sub.holder,
            sub.spot_number,
            start,
            end,
            state,
            plates,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl StoreBackend for SqliteStore {
  type Error = Error;
}

// ─── Lots ────────────────────────────────────────────────────────────────────

impl LotStore for SqliteStore {
  async fn register_lot(&self, name: String) -> Result<Lot> {
    let at_str = encode_dt(Utc::now());
    // Report the stored precision, not the clock's.
    let created_at = decode_dt(&at_str)?;
    let row_name = name.clone();

    let lot_id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO lots (name, created_at) VALUES (?1, ?2)",
          rusqlite::params![row_name, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(Lot { lot_id: LotId(lot_id), name, created_at, highest_number: 0 })
  }

  async fn get_lot(&self, lot_id: LotId) -> Result<Option<Lot>> {
    let raw: Option<RawLot> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {LOT_COLUMNS} FROM lots WHERE lot_id = ?1"),
              rusqlite::params![lot_id.0],
              lot_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawLot::into_lot).transpose()
  }

  async fn list_lots(&self) -> Result<Vec<Lot>> {
    let raws: Vec<RawLot> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {LOT_COLUMNS} FROM lots ORDER BY lot_id"))?;
        let rows = stmt
          .query_map([], lot_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawLot::into_lot).collect()
  }
}

// ─── Spots ───────────────────────────────────────────────────────────────────

impl SpotStore for SqliteStore {
  async fn spots(&self, lot_id: LotId) -> Result<Vec<Spot>> {
    let raws: Vec<RawSpot> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SPOT_COLUMNS} FROM spots WHERE lot_id = ?1 ORDER BY number"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![lot_id.0], spot_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSpot::into_spot).collect()
  }

  async fn insert_spots(&self, lot_id: LotId, spots: Vec<NewSpot>) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        insert_spot_rows(&tx, lot_id.0, &spots)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_spots(&self, lot_id: LotId, numbers: Vec<u32>) -> Result<u64> {
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let deleted = delete_spot_rows(&tx, lot_id.0, &numbers)?;
        tx.commit()?;
        Ok(deleted)
      })
      .await?;
    Ok(deleted)
  }

  async fn set_spot_state(
    &self,
    lot_id: LotId,
    number: u32,
    state: SpotState,
  ) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE spots SET state = ?3 WHERE lot_id = ?1 AND number = ?2",
          rusqlite::params![lot_id.0, number, state.as_str()],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }
}

// ─── Occupations ─────────────────────────────────────────────────────────────

impl OccupationStore for SqliteStore {
  async fn open_occupations(&self, lot_id: LotId) -> Result<Vec<Occupation>> {
    let raws: Vec<RawOccupation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {OCCUPATION_COLUMNS} FROM occupations
           WHERE lot_id = ?1 AND exit_time IS NULL
           ORDER BY entry_time"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![lot_id.0], occupation_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawOccupation::into_occupation).collect()
  }

  async fn has_open_occupation(&self, lot_id: LotId, number: u32) -> Result<bool> {
    let occupied = self
      .conn
      .call(move |conn| Ok(occupied_among(conn, lot_id.0, &[number])?))
      .await?;
    Ok(!occupied.is_empty())
  }

  async fn detach_spot_references(
    &self,
    lot_id: LotId,
    numbers: Vec<u32>,
  ) -> Result<u64> {
    let changed = self
      .conn
      .call(move |conn| Ok(detach_closed(conn, lot_id.0, &numbers)?))
      .await?;
    Ok(changed)
  }
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

impl SubscriptionStore for SqliteStore {
  async fn subscriptions(
    &self,
    lot_id: LotId,
    query: SubscriptionQuery,
  ) -> Result<Vec<Subscription>> {
    let state = query.state.map(SubscriptionState::as_str);
    let ended_before = query.ended_before.map(encode_dt);
    let in_force_at = query.in_force_at.map(encode_dt);
    let with_spot_only = query.with_spot_only;

    let raws: Vec<RawSubscription> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions
           WHERE lot_id = ?1
             AND (?2 IS NULL OR state = ?2)
             AND (?3 IS NULL OR validity_end < ?3)
             AND (?4 IS NULL OR (validity_start <= ?4 AND validity_end >= ?4))
             AND (?5 = 0 OR spot_number IS NOT NULL)
           ORDER BY subscription_number"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![lot_id.0, state, ended_before, in_force_at, with_spot_only],
            subscription_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawSubscription::into_subscription)
      .collect()
  }

  async fn transition_subscription(
    &self,
    lot_id: LotId,
    subscription_number: i64,
    from: SubscriptionState,
    to: SubscriptionState,
  ) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscriptions SET state = ?4
           WHERE lot_id = ?1 AND subscription_number = ?2 AND state = ?3",
          rusqlite::params![lot_id.0, subscription_number, from.as_str(), to.as_str()],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }
}

// ─── Zones ───────────────────────────────────────────────────────────────────

impl ZoneStore for SqliteStore {
  async fn zone_by_name(&self, lot_id: LotId, name: String) -> Result<Option<Zone>> {
    let raw: Option<RawZone> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ZONE_COLUMNS} FROM zones WHERE lot_id = ?1 AND name = ?2"
              ),
              rusqlite::params![lot_id.0, name],
              zone_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawZone::into_zone).transpose()
  }

  async fn insert_zone(&self, zone: Zone) -> Result<bool> {
    let id_str = encode_uuid(zone.zone_id);
    let at_str = encode_dt(zone.created_at);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO zones (zone_id, lot_id, name, capacity, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (lot_id, name) DO NOTHING",
          rusqlite::params![id_str, zone.lot_id.0, zone.name, zone.capacity, at_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn delete_zone(&self, zone_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(zone_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM zones WHERE zone_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn list_zones(&self, lot_id: LotId) -> Result<Vec<Zone>> {
    let raws: Vec<RawZone> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ZONE_COLUMNS} FROM zones WHERE lot_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![lot_id.0], zone_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawZone::into_zone).collect()
  }
}

// ─── Capacity writes ─────────────────────────────────────────────────────────

impl CapacityWriter for SqliteStore {
  /// Apply the whole plan in one `IMMEDIATE` transaction.
  ///
  /// The write lock is taken before the occupancy re-check, so no entry can
  /// land on a planned number between the check and the delete. Growth
  /// numbers at or below the lot's high-water mark mean another writer
  /// allocated since planning; the plan is refused as stale. Any failure
  /// rolls back every segment.
  async fn apply_capacity_plan(&self, plan: CapacityPlan) -> parkade_core::Result<()> {
    let lot_id = plan.lot_id;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mark = highest_number(&tx, lot_id.0)?;
        let lowest_grow = plan
          .segments
          .iter()
          .filter_map(|s| match &s.change {
            SpotChange::Grow(numbers) => numbers.first().copied(),
            _ => None,
          })
          .min();
        if lowest_grow.is_some_and(|n| n <= mark) {
          return Ok(Err(parkade_core::Error::StaleCapacityPlan { lot_id }));
        }
        for step in plan.write_order() {
          match &step.change {
            SpotChange::Grow(numbers) => {
              let rows: Vec<NewSpot> = numbers
                .iter()
                .map(|&n| NewSpot::free(n, step.segment))
                .collect();
              insert_spot_rows(&tx, lot_id.0, &rows)?;
            }
            SpotChange::Shrink(numbers) => {
              let arrived = occupied_among(&tx, lot_id.0, numbers)?;
              if !arrived.is_empty() {
                // Dropping `tx` rolls back.
                return Ok(Err(parkade_core::Error::CapacityBlockedByOccupancy {
                  segment:          step.segment,
                  blocking_numbers: arrived,
                }));
              }
              detach_closed(&tx, lot_id.0, numbers)?;
              delete_spot_rows(&tx, lot_id.0, numbers)?;
            }
            SpotChange::Unchanged => {}
          }
        }
        tx.commit()?;
        Ok(Ok(()))
      })
      .await
      .map_err(|e| parkade_core::Error::storage(Error::Database(e)))?;

    if outcome.is_ok() {
      debug!(lot_id = %lot_id, "capacity plan committed");
    }
    outcome
  }
}
