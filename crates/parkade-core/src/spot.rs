//! Spots and spot-number allocation.
//!
//! Numbers are unique per lot across every segment and zone. Growth numbering
//! starts above both the numbers currently stored and the lot's persisted
//! high-water mark ([`Lot::highest_number`](crate::lot::Lot::highest_number)).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::lot::LotId;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// The vehicle category a spot is sized for.
///
/// The declaration order is the processing order used by capacity
/// reconciliation, so growth numbering is reproducible.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Segment {
  Car,
  Motorcycle,
  LightTruck,
}

impl Segment {
  pub const ALL: [Segment; 3] =
    [Segment::Car, Segment::Motorcycle, Segment::LightTruck];

  pub fn as_str(self) -> &'static str { self.into() }
}

/// Stored state of a spot.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpotState {
  Free,
  Occupied,
  Reserved,
  Maintenance,
  Subscribed,
}

impl SpotState {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Whether an operator may set this state by hand. `Occupied` and
  /// `Subscribed` follow from occupation and subscription records.
  pub fn is_operator_settable(self) -> bool {
    match self {
      Self::Free | Self::Reserved | Self::Maintenance => true,
      Self::Occupied | Self::Subscribed => false,
    }
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
  pub lot_id:  LotId,
  pub number:  u32,
  pub segment: Segment,
  pub state:   SpotState,
  /// Name of the zone the spot was provisioned into, if any.
  pub zone:    Option<String>,
}

/// Input row for a bulk spot insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSpot {
  pub number:  u32,
  pub segment: Segment,
  pub state:   SpotState,
  pub zone:    Option<String>,
}

impl NewSpot {
  /// A free spot of `segment`, outside any zone.
  pub fn free(number: u32, segment: Segment) -> Self {
    Self { number, segment, state: SpotState::Free, zone: None }
  }
}

// ─── Numbering ───────────────────────────────────────────────────────────────

/// Most spots a single zone or segment target may ask for. Larger requests
/// are rejected as validation errors before any number is allocated.
pub const MAX_LOT_SPOTS: u32 = 100_000;

/// One past the highest of `existing` and `floor`, or `None` past `u32::MAX`.
///
/// `floor` is the lot's highest number ever used, so numbers freed by a
/// shrink stay retired.
pub fn next_after_max(
  existing: impl IntoIterator<Item = u32>,
  floor: u32,
) -> Option<u32> {
  existing.into_iter().fold(floor, u32::max).checked_add(1)
}

/// The `count` lowest positive numbers absent from `existing`, ascending.
/// `None` if they would run past `u32::MAX`.
pub fn first_fit(existing: &BTreeSet<u32>, count: usize) -> Option<Vec<u32>> {
  let mut numbers = Vec::with_capacity(count);
  let mut candidate = 0u32;
  while numbers.len() < count {
    candidate = candidate.checked_add(1)?;
    if !existing.contains(&candidate) {
      numbers.push(candidate);
    }
  }
  Some(numbers)
}

/// `count` consecutive numbers beginning at `start`. `None` if the block
/// would run past `u32::MAX`.
pub fn block_from(start: u32, count: usize) -> Option<Vec<u32>> {
  let Some(last_offset) = count.checked_sub(1) else {
    return Some(Vec::new());
  };
  let last = start.checked_add(u32::try_from(last_offset).ok()?)?;
  Some((start..=last).collect())
}
