//! Lots: the parking facility every other record is scoped to.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a parking lot.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LotId(pub i64);

impl fmt::Display for LotId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

impl From<i64> for LotId {
  fn from(id: i64) -> Self { Self(id) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
  pub lot_id:         LotId,
  pub name:           String,
  pub created_at:     DateTime<Utc>,
  /// Highest spot number ever inserted into the lot, 0 if none. Raised by
  /// every spot insert and never lowered, so it survives shrinks.
  pub highest_number: u32,
}
