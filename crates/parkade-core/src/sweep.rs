//! Subscription expiry sweep.
//!
//! Closes subscriptions whose validity window has ended but which are still
//! marked active, releasing their spot when no vehicle is parked on it. The
//! sweep runs lazily before status projections rather than on a timer.
//! Each subscription is handled on its own; one failure never stops the batch,
//! and a failed item is picked up again by the next sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  lot::LotId,
  spot::SpotState,
  store::{OccupationStore, SpotStore, SubscriptionStore},
  subscription::{Subscription, SubscriptionQuery, SubscriptionState},
};

/// What happened to one overdue subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SweepOutcome {
  Expired {
    subscription_number: i64,
    spot_number:         Option<u32>,
    /// `true` if the spot was set back to `Free`; `false` if it had no spot
    /// row or a vehicle is parked on it.
    spot_released:       bool,
  },
  /// Another sweep moved the row first.
  AlreadyClosed { subscription_number: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepFailure {
  pub subscription_number: i64,
  pub reason:              String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
  pub lot_id:    LotId,
  pub processed: usize,
  pub succeeded: usize,
  pub failures:  Vec<SweepFailure>,
  pub outcomes:  Vec<SweepOutcome>,
}

/// Expire every active subscription in `lot_id` whose window ended before
/// `now`.
///
/// Only the initial query can fail the sweep as a whole.
pub async fn sweep_expired<S>(
  store: &S,
  lot_id: LotId,
  now: DateTime<Utc>,
) -> Result<SweepReport>
where
  S: SubscriptionStore + OccupationStore + SpotStore,
{
  let overdue = store
    .subscriptions(lot_id, SubscriptionQuery::overdue(now))
    .await
    .map_err(Error::storage)?;

  let mut report = SweepReport {
    lot_id,
    processed: overdue.len(),
    succeeded: 0,
    failures: Vec::new(),
    outcomes: Vec::new(),
  };

  for sub in &overdue {
    match expire_one(store, lot_id, sub).await {
      Ok(outcome) => {
        report.succeeded += 1;
        report.outcomes.push(outcome);
      }
      Err(reason) => {
        warn!(
          lot_id = %lot_id,
          subscription = sub.subscription_number,
          %reason,
          "could not expire subscription"
        );
        report.failures.push(SweepFailure {
          subscription_number: sub.subscription_number,
          reason,
        });
      }
    }
  }

  if report.processed > 0 {
    info!(
      lot_id = %lot_id,
      processed = report.processed,
      succeeded = report.succeeded,
      failed = report.failures.len(),
      "expiry sweep finished"
    );
  }
  Ok(report)
}

async fn expire_one<S>(
  store: &S,
  lot_id: LotId,
  sub: &Subscription,
) -> Result<SweepOutcome, String>
where
  S: SubscriptionStore + OccupationStore + SpotStore,
{
  let number = sub.subscription_number;
  let next = sub
    .state
    .transition(SubscriptionState::Expired)
    .map_err(|e| e.to_string())?;

  let vehicle_present = match sub.spot_number {
    Some(spot) => store
      .has_open_occupation(lot_id, spot)
      .await
      .map_err(|e| format!("occupancy lookup for spot {spot} failed: {e}"))?,
    None => false,
  };

  let moved = store
    .transition_subscription(lot_id, number, sub.state, next)
    .await
    .map_err(|e| format!("state update failed: {e}"))?;
  if !moved {
    debug!(lot_id = %lot_id, subscription = number, "already closed");
    return Ok(SweepOutcome::AlreadyClosed { subscription_number: number });
  }

  let spot_released = match sub.spot_number {
    Some(spot) if !vehicle_present => store
      .set_spot_state(lot_id, spot, SpotState::Free)
      .await
      .map_err(|e| format!("releasing spot {spot} failed: {e}"))?,
    Some(spot) => {
      debug!(lot_id = %lot_id, spot, "vehicle present; spot left as is");
      false
    }
    None => false,
  };

  Ok(SweepOutcome::Expired {
    subscription_number: number,
    spot_number: sub.spot_number,
    spot_released,
  })
}
