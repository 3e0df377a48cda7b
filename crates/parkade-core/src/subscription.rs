//! Subscriptions ("abonos"): time-bounded rights to a spot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, lot::LotId};

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
pub enum SubscriptionState {
  Active,
  Expired,
  Cancelled,
}

impl SubscriptionState {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Validate a transition to `next`.
  ///
  /// Only active subscriptions move; expired and cancelled are terminal.
  pub fn transition(self, next: Self) -> Result<Self> {
    match (self, next) {
      (Self::Active, Self::Expired | Self::Cancelled) => Ok(next),
      (Self::Active, Self::Active)
      | (Self::Expired | Self::Cancelled, _) => {
        Err(Error::InvalidTransition { from: self, to: next })
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub lot_id:              LotId,
  pub subscription_number: i64,
  pub holder:              String,
  pub spot_number:         Option<u32>,
  pub validity_start:      DateTime<Utc>,
  pub validity_end:        DateTime<Utc>,
  pub state:               SubscriptionState,
  /// Plates allowed to park under this subscription.
  pub allowed_vehicles:    Vec<String>,
}

impl Subscription {
  /// Active and `now` falls inside the validity window (both ends inclusive).
  pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
    self.state == SubscriptionState::Active
      && self.validity_start <= now
      && now <= self.validity_end
  }

  /// Still marked active although the window has closed.
  pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
    self.state == SubscriptionState::Active && self.validity_end < now
  }
}

/// Filter for [`crate::store::SubscriptionStore::subscriptions`].
///
/// All set conditions must hold.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionQuery {
  pub state:          Option<SubscriptionState>,
  /// `validity_end < ended_before`.
  pub ended_before:   Option<DateTime<Utc>>,
  /// `validity_start <= t <= validity_end`.
  pub in_force_at:    Option<DateTime<Utc>>,
  /// Only rows with a spot assigned.
  pub with_spot_only: bool,
}

impl SubscriptionQuery {
  /// Active rows whose window closed before `now`.
  pub fn overdue(now: DateTime<Utc>) -> Self {
    Self {
      state: Some(SubscriptionState::Active),
      ended_before: Some(now),
      ..Self::default()
    }
  }

  /// Active rows in force at `now` that point at a spot.
  pub fn in_force_with_spot(now: DateTime<Utc>) -> Self {
    Self {
      state: Some(SubscriptionState::Active),
      in_force_at: Some(now),
      with_spot_only: true,
      ..Self::default()
    }
  }

  pub fn matches(&self, sub: &Subscription) -> bool {
    self.state.is_none_or(|s| sub.state == s)
      && self.ended_before.is_none_or(|t| sub.validity_end < t)
      && self
        .in_force_at
        .is_none_or(|t| sub.validity_start <= t && t <= sub.validity_end)
      && (!self.with_spot_only || sub.spot_number.is_some())
  }
}
