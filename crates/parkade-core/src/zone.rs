//! Zones: operator-defined named groups of spots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, lot::LotId, spot::MAX_LOT_SPOTS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
  pub zone_id:    Uuid,
  pub lot_id:     LotId,
  /// Unique within the lot; compared case-sensitively.
  pub name:       String,
  /// Number of spots created with the zone. Informational only.
  pub capacity:   u32,
  pub created_at: DateTime<Utc>,
}

/// How many spots a new zone receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ZoneSizing {
  Count { count: i64 },
  Grid { rows: i64, columns: i64 },
}

impl ZoneSizing {
  /// Resolve to a spot count in `1..=MAX_LOT_SPOTS`.
  pub fn spot_count(self) -> Result<u32> {
    let count = match self {
      Self::Count { count } => {
        if count <= 0 {
          return Err(Error::InvalidSizing(format!(
            "count must be positive, got {count}"
          )));
        }
        count
      }
      Self::Grid { rows, columns } => {
        if rows <= 0 || columns <= 0 {
          return Err(Error::InvalidSizing(format!(
            "rows and columns must be positive, got {rows}x{columns}"
          )));
        }
        rows.checked_mul(columns).ok_or_else(|| {
          Error::InvalidSizing(format!("grid {rows}x{columns} is too large"))
        })?
      }
    };
    match u32::try_from(count) {
      Ok(count) if count <= MAX_LOT_SPOTS => Ok(count),
      _ => Err(Error::InvalidSizing(format!(
        "{count} spots is more than the limit of {MAX_LOT_SPOTS}"
      ))),
    }
  }
}

/// Where the numbers of a new zone's spots come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingMode {
  /// Lowest unused numbers in the lot, scanning up from 1.
  #[default]
  FirstFit,
  /// A contiguous block after the highest number in use.
  AfterMax,
}
