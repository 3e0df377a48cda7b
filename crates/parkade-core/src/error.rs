//! Error types for `parkade-core`.

use thiserror::Error;

use crate::{lot::LotId, spot::{Segment, SpotState}, subscription::SubscriptionState};

/// Boxed backend error, as produced by any store implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  // ── Validation ────────────────────────────────────────────────────────

  #[error("invalid sizing: {0}")]
  InvalidSizing(String),

  #[error("zone name must not be blank")]
  BlankZoneName,

  #[error("lot name must not be blank")]
  BlankLotName,

  #[error("invalid capacity target for {segment}: {target}")]
  InvalidTarget { segment: Segment, target: i64 },

  #[error("spot state {0} is derived and cannot be set directly")]
  InvalidStateChange(SpotState),

  #[error("subscription cannot move from {from} to {to}")]
  InvalidTransition {
    from: SubscriptionState,
    to:   SubscriptionState,
  },

  // ── Lookups ───────────────────────────────────────────────────────────

  #[error("lot not found: {0}")]
  InvalidLot(LotId),

  #[error("spot {number} not found in lot {lot_id}")]
  SpotNotFound { lot_id: LotId, number: u32 },

  // ── Conflicts ─────────────────────────────────────────────────────────

  #[error("zone {name:?} already exists in lot {lot_id}")]
  DuplicateZoneName { lot_id: LotId, name: String },

  #[error(
    "cannot shrink {segment} capacity: spots {blocking_numbers:?} are occupied"
  )]
  CapacityBlockedByOccupancy {
    segment:          Segment,
    blocking_numbers: Vec<u32>,
  },

  #[error(
    "cannot shrink {segment} capacity: {needed} spots must go but only \
     {available} are numbered above the target"
  )]
  InsufficientShrinkCandidates {
    segment:   Segment,
    needed:    usize,
    available: usize,
  },

  #[error("lot {lot_id} has no spot numbers left to allocate")]
  SpotNumbersExhausted { lot_id: LotId },

  /// Another writer allocated spot numbers between planning and applying a
  /// capacity sync. Nothing was written; the sync can be retried.
  #[error("spot numbering in lot {lot_id} changed while the sync was planned")]
  StaleCapacityPlan { lot_id: LotId },

  // ── Storage ───────────────────────────────────────────────────────────

  #[error("storage failure: {0}")]
  Storage(#[source] StoreError),

  /// A capacity sync applied without a transaction failed after some
  /// segments were already written.
  #[error(
    "capacity sync failed on {failed} after committing {committed:?}: {source}"
  )]
  PartialCapacitySync {
    committed: Vec<Segment>,
    failed:    Segment,
    #[source]
    source:    StoreError,
  },
}

impl Error {
  /// Wrap a backend error. Usable directly with `map_err`.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidSizing(_)
      | Self::BlankZoneName
      | Self::BlankLotName
      | Self::InvalidTarget { .. }
      | Self::InvalidStateChange(_)
      | Self::InvalidTransition { .. } => ErrorKind::Validation,
      Self::InvalidLot(_) | Self::SpotNotFound { .. } => ErrorKind::NotFound,
      Self::DuplicateZoneName { .. }
      | Self::CapacityBlockedByOccupancy { .. }
      | Self::InsufficientShrinkCandidates { .. }
      | Self::SpotNumbersExhausted { .. }
      | Self::StaleCapacityPlan { .. } => ErrorKind::Conflict,
      Self::Storage(_) | Self::PartialCapacitySync { .. } => ErrorKind::Storage,
    }
  }
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad input; storage was never touched.
  Validation,
  NotFound,
  /// Storage was consulted but the request cannot be applied as-is.
  Conflict,
  Storage,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
