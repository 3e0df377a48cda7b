//! Inventory reconciliation: grow or shrink each segment to a target count.
//!
//! Reconciliation runs in two phases. [`plan_capacity`] is pure: it reads the
//! current spots and occupied numbers and either produces a [`CapacityPlan`]
//! for every requested segment or rejects the whole request. Only a fully
//! validated plan reaches [`CapacityWriter::apply_capacity_plan`], so one
//! segment's conflict can never leave another segment half-written.
//!
//! Numbering rules:
//! - growth allocates after the highest number the lot has ever held, any
//!   segment, so numbers freed by a shrink are never handed out again; the
//!   running maximum carries over between segments;
//! - shrink candidates are the segment's spots numbered above the target,
//!   highest first; occupied candidates are skipped and, if too few free ones
//!   remain, reported back as blocking.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  Error, Result,
  error::StoreError,
  lot::LotId,
  spot::{MAX_LOT_SPOTS, NewSpot, Segment, Spot, block_from, next_after_max},
  store::{CapacityWriter, LotStore, OccupationStore, SpotStore, require_lot},
};

/// Requested spot count per segment. Segments left out are not touched.
pub type CapacityTargets = BTreeMap<Segment, i64>;

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "numbers", rename_all = "snake_case")]
pub enum SpotChange {
  /// Numbers to create, ascending.
  Grow(Vec<u32>),
  /// Numbers to delete, highest first.
  Shrink(Vec<u32>),
  Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPlan {
  pub segment: Segment,
  pub current: u32,
  pub target:  u32,
  pub change:  SpotChange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPlan {
  pub lot_id:   LotId,
  /// One entry per requested segment, in [`Segment::ALL`] order.
  pub segments: Vec<SegmentPlan>,
}

impl CapacityPlan {
  /// Segment plans in write order: every growth, then every shrink.
  pub fn write_order(&self) -> impl Iterator<Item = &SegmentPlan> {
    let grows = self
      .segments
      .iter()
      .filter(|s| matches!(s.change, SpotChange::Grow(_)));
    let shrinks = self
      .segments
      .iter()
      .filter(|s| matches!(s.change, SpotChange::Shrink(_)));
    grows.chain(shrinks)
  }

  pub fn is_noop(&self) -> bool {
    self
      .segments
      .iter()
      .all(|s| s.change == SpotChange::Unchanged)
  }
}

/// Check targets before touching storage. Each must lie in
/// `0..=MAX_LOT_SPOTS`.
pub fn validate_targets(targets: &CapacityTargets) -> Result<()> {
  for (&segment, &target) in targets {
    if target < 0 || target > i64::from(MAX_LOT_SPOTS) {
      return Err(Error::InvalidTarget { segment, target });
    }
  }
  Ok(())
}

/// Compute the writes that bring every segment in `targets` to its count.
///
/// `occupied` holds the spot numbers of open occupations. `highest_number` is
/// the lot's high-water mark; growth starts above it.
pub fn plan_capacity(
  lot_id: LotId,
  highest_number: u32,
  spots: &[Spot],
  occupied: &HashSet<u32>,
  targets: &CapacityTargets,
) -> Result<CapacityPlan> {
  validate_targets(targets)?;

  let exhausted = || Error::SpotNumbersExhausted { lot_id };
  // `None` once u32::MAX has been allocated; only a grow can then fail.
  let mut next = next_after_max(spots.iter().map(|s| s.number), highest_number);
  let mut segments = Vec::new();

  for segment in Segment::ALL {
    let Some(&target) = targets.get(&segment) else {
      continue;
    };
    let target = target as u32;
    let own: Vec<u32> = spots
      .iter()
      .filter(|s| s.segment == segment)
      .map(|s| s.number)
      .collect();
    let current = own.len() as u32;

    let change = if target > current {
      let count = target - current;
      let start = next.ok_or_else(exhausted)?;
      let numbers = block_from(start, count as usize).ok_or_else(exhausted)?;
      next = start.checked_add(count);
      SpotChange::Grow(numbers)
    } else if target < current {
      let needed = (current - target) as usize;
      SpotChange::Shrink(shrink_candidates(segment, &own, occupied, target, needed)?)
    } else {
      SpotChange::Unchanged
    };

    segments.push(SegmentPlan { segment, current, target, change });
  }

  Ok(CapacityPlan { lot_id, segments })
}

fn shrink_candidates(
  segment: Segment,
  numbers: &[u32],
  occupied: &HashSet<u32>,
  target: u32,
  needed: usize,
) -> Result<Vec<u32>> {
  let mut candidates: Vec<u32> =
    numbers.iter().copied().filter(|&n| n > target).collect();
  candidates.sort_unstable_by(|a, b| b.cmp(a));

  let (mut blocking, free): (Vec<u32>, Vec<u32>) =
    candidates.into_iter().partition(|n| occupied.contains(n));

  if free.len() < needed {
    if blocking.is_empty() {
      return Err(Error::InsufficientShrinkCandidates {
        segment,
        needed,
        available: free.len(),
      });
    }
    blocking.sort_unstable();
    return Err(Error::CapacityBlockedByOccupancy {
      segment,
      blocking_numbers: blocking,
    });
  }

  Ok(free.into_iter().take(needed).collect())
}

// ─── Stepwise application ────────────────────────────────────────────────────

/// Apply `plan` one segment at a time through row-level store calls.
///
/// Growth for every segment is written before any shrink. Each shrink
/// re-checks occupancy of its numbers immediately before deleting, detaches
/// closed occupation history from them, then deletes the rows.
pub async fn apply_stepwise<S>(store: &S, plan: &CapacityPlan) -> Result<()>
where
  S: SpotStore + OccupationStore + ?Sized,
{
  let lot_id = plan.lot_id;
  let mut committed: Vec<Segment> = Vec::new();

  for step in plan.write_order() {
    let result = match &step.change {
      SpotChange::Grow(numbers) => {
        let rows = numbers
          .iter()
          .map(|&n| NewSpot::free(n, step.segment))
          .collect();
        store
          .insert_spots(lot_id, rows)
          .await
          .map_err(|e| StepError::Storage(Box::new(e)))
      }
      SpotChange::Shrink(numbers) => {
        shrink_step(store, lot_id, step.segment, numbers).await
      }
      SpotChange::Unchanged => continue,
    };

    match result {
      Ok(()) => {
        debug!(lot_id = %lot_id, segment = %step.segment, "segment committed");
        committed.push(step.segment);
      }
      Err(StepError::Rejected(err)) if committed.is_empty() => return Err(err),
      Err(StepError::Rejected(err)) => {
        return Err(Error::PartialCapacitySync {
          committed,
          failed: step.segment,
          source: Box::new(err),
        });
      }
      Err(StepError::Storage(source)) if committed.is_empty() => {
        return Err(Error::Storage(source));
      }
      Err(StepError::Storage(source)) => {
        return Err(Error::PartialCapacitySync {
          committed,
          failed: step.segment,
          source,
        });
      }
    }
  }

  Ok(())
}

enum StepError {
  /// A vehicle arrived on a planned number after validation.
  Rejected(Error),
  Storage(StoreError),
}

async fn shrink_step<S>(
  store: &S,
  lot_id: LotId,
  segment: Segment,
  numbers: &[u32],
) -> Result<(), StepError>
where
  S: SpotStore + OccupationStore + ?Sized,
{
  let mut arrived = Vec::new();
  for &number in numbers {
    let occupied = store
      .has_open_occupation(lot_id, number)
      .await
      .map_err(|e| StepError::Storage(Box::new(e)))?;
    if occupied {
      arrived.push(number);
    }
  }
  if !arrived.is_empty() {
    arrived.sort_unstable();
    return Err(StepError::Rejected(Error::CapacityBlockedByOccupancy {
      segment,
      blocking_numbers: arrived,
    }));
  }

  store
    .detach_spot_references(lot_id, numbers.to_vec())
    .await
    .map_err(|e| StepError::Storage(Box::new(e)))?;
  store
    .delete_spots(lot_id, numbers.to_vec())
    .await
    .map_err(|e| StepError::Storage(Box::new(e)))?;
  Ok(())
}

// ─── Operation ───────────────────────────────────────────────────────────────

/// Result of a successful [`sync_capacity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityReport {
  pub lot_id:          LotId,
  pub applied_targets: BTreeMap<Segment, u32>,
  pub created:         BTreeMap<Segment, Vec<u32>>,
  pub removed:         BTreeMap<Segment, Vec<u32>>,
}

impl From<&CapacityPlan> for CapacityReport {
  fn from(plan: &CapacityPlan) -> Self {
    let mut report = CapacityReport {
      lot_id:          plan.lot_id,
      applied_targets: BTreeMap::new(),
      created:         BTreeMap::new(),
      removed:         BTreeMap::new(),
    };
    for step in &plan.segments {
      report.applied_targets.insert(step.segment, step.target);
      match &step.change {
        SpotChange::Grow(numbers) => {
          report.created.insert(step.segment, numbers.clone());
        }
        SpotChange::Shrink(numbers) => {
          report.removed.insert(step.segment, numbers.clone());
        }
        SpotChange::Unchanged => {}
      }
    }
    report
  }
}

/// Bring the lot's per-segment spot counts to `targets`.
///
/// Occupied spots are never deleted. If any requested segment is infeasible
/// nothing is written; a storage failure part-way through a backend without
/// transactions surfaces as [`Error::PartialCapacitySync`].
pub async fn sync_capacity<S>(
  store: &S,
  lot_id: LotId,
  targets: &CapacityTargets,
) -> Result<CapacityReport>
where
  S: LotStore + CapacityWriter,
{
  validate_targets(targets)?;
  let lot = require_lot(store, lot_id).await?;

  let spots = store.spots(lot_id).await.map_err(Error::storage)?;
  let occupied: HashSet<u32> = store
    .open_occupations(lot_id)
    .await
    .map_err(Error::storage)?
    .into_iter()
    .filter_map(|o| o.spot_number)
    .collect();

  let plan = plan_capacity(lot_id, lot.highest_number, &spots, &occupied, targets)?;
  let report = CapacityReport::from(&plan);

  if plan.is_noop() {
    debug!(lot_id = %lot_id, "capacity already matches targets");
    return Ok(report);
  }

  store.apply_capacity_plan(plan).await?;

  info!(
    lot_id = %lot_id,
    targets = ?report.applied_targets,
    created = report.created.values().map(Vec::len).sum::<usize>(),
    removed = report.removed.values().map(Vec::len).sum::<usize>(),
    "capacity synced"
  );
  Ok(report)
}

/// Current spot count per segment, with every segment present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySummary {
  pub lot_id:      LotId,
  pub total:       u32,
  pub per_segment: BTreeMap<Segment, u32>,
}

pub async fn capacity_summary<S>(store: &S, lot_id: LotId) -> Result<CapacitySummary>
where
  S: LotStore + SpotStore,
{
  require_lot(store, lot_id).await?;
  let spots = store.spots(lot_id).await.map_err(Error::storage)?;

  let mut per_segment: BTreeMap<Segment, u32> =
    Segment::ALL.into_iter().map(|s| (s, 0)).collect();
  for spot in &spots {
    *per_segment.entry(spot.segment).or_default() += 1;
  }

  Ok(CapacitySummary {
    lot_id,
    total: spots.len() as u32,
    per_segment,
  })
}
