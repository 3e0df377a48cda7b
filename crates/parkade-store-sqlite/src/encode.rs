//! Encoding and decoding helpers between Parkade domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! microsecond precision, so that text order equals time order. Enums use
//! their snake_case names. Allowed plates are a compact JSON array.

use chrono::{DateTime, SecondsFormat, Utc};
use parkade_core::{
  LotId,
  lot::Lot,
  occupation::Occupation,
  spot::{Segment, Spot, SpotState},
  subscription::{Subscription, SubscriptionState},
  zone::Zone,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_segment(s: &str) -> Result<Segment> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown segment: {s:?}")))
}

pub fn decode_spot_state(s: &str) -> Result<SpotState> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown spot state: {s:?}")))
}

pub fn decode_subscription_state(s: &str) -> Result<SubscriptionState> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown subscription state: {s:?}")))
}

// ─── Plates ──────────────────────────────────────────────────────────────────

pub fn encode_plates(plates: &[String]) -> Result<String> {
  Ok(serde_json::to_string(plates)?)
}

pub fn decode_plates(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub struct RawLot {
  pub lot_id:         i64,
  pub name:           String,
  pub created_at:     String,
  pub highest_number: u32,
}

impl RawLot {
  pub fn into_lot(self) -> Result<Lot> {
    Ok(Lot {
      lot_id:         LotId(self.lot_id),
      name:           self.name,
      created_at:     decode_dt(&self.created_at)?,
      highest_number: self.highest_number,
    })
  }
}

pub struct RawSpot {
  pub lot_id:  i64,
  pub number:  u32,
  pub segment: String,
  pub state:   String,
  pub zone:    Option<String>,
}

impl RawSpot {
  pub fn into_spot(self) -> Result<Spot> {
    Ok(Spot {
      lot_id:  LotId(self.lot_id),
      number:  self.number,
      segment: decode_segment(&self.segment)?,
      state:   decode_spot_state(&self.state)?,
      zone:    self.zone,
    })
  }
}

pub struct RawOccupation {
  pub occupation_id: String,
  pub lot_id:        i64,
  pub plate:         String,
  pub spot_number:   Option<u32>,
  pub entry_time:    String,
  pub exit_time:     Option<String>,
}

impl RawOccupation {
  pub fn into_occupation(self) -> Result<Occupation> {
    Ok(Occupation {
      occupation_id: decode_uuid(&self.occupation_id)?,
      lot_id:        LotId(self.lot_id),
      plate:         self.plate,
      spot_number:   self.spot_number,
      entry_time:    decode_dt(&self.entry_time)?,
      exit_time:     self.exit_time.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawSubscription {
  pub lot_id:              i64,
  pub subscription_number: i64,
  pub holder:              String,
  pub spot_number:         Option<u32>,
  pub validity_start:      String,
  pub validity_end:        String,
  pub state:               String,
  pub allowed_vehicles:    String,
}

impl RawSubscription {
  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      lot_id:              LotId(self.lot_id),
      subscription_number: self.subscription_number,
      holder:              self.holder,
      spot_number:         self.spot_number,
      validity_start:      decode_dt(&self.validity_start)?,
      validity_end:        decode_dt(&self.validity_end)?,
      state:               decode_subscription_state(&self.state)?,
      allowed_vehicles:    decode_plates(&self.allowed_vehicles)?,
    })
  }
}

pub struct RawZone {
  pub zone_id:    String,
  pub lot_id:     i64,
  pub name:       String,
  pub capacity:   u32,
  pub created_at: String,
}

impl RawZone {
  pub fn into_zone(self) -> Result<Zone> {
    Ok(Zone {
      zone_id:    decode_uuid(&self.zone_id)?,
      lot_id:     LotId(self.lot_id),
      name:       self.name,
      capacity:   self.capacity,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
