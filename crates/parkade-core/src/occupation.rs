//! Occupations: a vehicle parked, or formerly parked, in a lot.
//!
//! Occupations are created and closed by entry/exit registration, which lives
//! outside this crate. The only write issued from here is detaching the spot
//! reference of closed rows before a spot is deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lot::LotId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupation {
  pub occupation_id: Uuid,
  pub lot_id:        LotId,
  pub plate:         String,
  pub spot_number:   Option<u32>,
  pub entry_time:    DateTime<Utc>,
  /// `None` while the vehicle is still inside.
  pub exit_time:     Option<DateTime<Utc>>,
}

impl Occupation {
  pub fn is_open(&self) -> bool { self.exit_time.is_none() }
}
